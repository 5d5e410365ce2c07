// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Device variables sourced from flat files under the agent's configuration
//! directory: the file name is the variable name, the trimmed file content
//! is the value. Values reload when the file's modification time changes.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::SystemTime;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

/// Variable toggling the remote-access connector.
pub const REMOTE_ACCESS_ENABLED: &str = "remote-access-enabled";

#[derive(Debug, Error)]
#[error("failed to read variables directory {}: {source}", dir.display())]
pub struct VariablesError {
    dir: PathBuf,
    #[source]
    source: std::io::Error,
}

struct CachedVariable {
    value: String,
    modified: SystemTime,
}

pub struct FsVariables {
    dir: PathBuf,
    cache: Mutex<HashMap<String, CachedVariable>>,
}

impl FsVariables {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Verify the configuration directory is usable. An absent directory is
    /// fine (every variable reads as unset); anything else is fatal at
    /// initialization.
    pub fn start(&self) -> Result<(), VariablesError> {
        match std::fs::read_dir(&self.dir) {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(dir = %self.dir.display(), "variables directory absent, all variables unset");
                Ok(())
            }
            Err(source) => Err(VariablesError {
                dir: self.dir.clone(),
                source,
            }),
        }
    }

    pub fn get(&self, name: &str) -> Option<String> {
        let path = self.dir.join(name);
        let modified = std::fs::metadata(&path).ok()?.modified().ok()?;

        let mut cache = self.cache.lock();
        if let Some(cached) = cache.get(name) {
            if cached.modified == modified {
                return Some(cached.value.clone());
            }
        }

        let value = std::fs::read_to_string(&path).ok()?.trim().to_string();
        cache.insert(
            name.to_string(),
            CachedVariable {
                value: value.clone(),
                modified,
            },
        );
        Some(value)
    }

    /// Boolean variable; unset or unparsable falls back to `default`.
    pub fn get_bool(&self, name: &str, default: bool) -> bool {
        match self.get(name).as_deref() {
            Some("true") | Some("1") => true,
            Some("false") | Some("0") => false,
            _ => default,
        }
    }
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod agent;
pub mod garbage_collector;
pub mod reconciler;
pub mod runner;
pub mod supervisor;
pub mod updater;

// Re-export the composition surface for convenience
pub use agent::{Agent, AgentConfig, AgentError};
pub use runner::{run_subsystem, Subsystem};

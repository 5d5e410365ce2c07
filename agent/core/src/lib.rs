// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Runtime core of the fleetd device agent.
//!
//! A long-lived process on an edge device that establishes a durable device
//! identity with the control plane, continuously reconciles the running
//! workload against the remotely-declared bundle, and cooperates with the
//! handoff coordinator so a replacement binary can take over the device API
//! listener without dropping it.
//!
//! # Architecture
//!
//! - **Layer:** Agent Core
//! - **Purpose:** Identity bootstrap, bundle reconciliation, subsystem
//!   supervision, listener handoff integration

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;

// Copyright 2026 Portalta Contributors
// SPDX-License-Identifier: Apache-2.0

//! Portalta — resilient acquisition of personnel and remuneration records
//! from the Chilean transparency portal.
//!
//! The pipeline discovers candidate sources for a request, tries a chain
//! of lightweight extraction strategies from cheapest to most speculative,
//! normalizes whatever tabular data comes back, and escalates to a
//! pluggable heavyweight fallback only when everything else came up empty.

#![allow(
    dead_code,
    unused_imports,
    clippy::new_without_default,
    clippy::should_implement_trait
)]

pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod discover;
pub mod error;
pub mod fallback;
pub mod fetch;
pub mod model;
pub mod normalize;
pub mod orchestrator;
pub mod strategy;

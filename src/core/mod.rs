//! # Core Application Logic
//!
//! This module contains tuidoist's business logic.
//! It knows nothing about any specific UI technology.
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │         CORE            │
//!                    │  (this module)          │
//!                    │                         │
//!                    │  • State + update()     │
//!                    │  • Query translation    │
//!                    │  • Catalog cache        │
//!                    │  • Workspace (I/O seam) │
//!                    └───────────┬─────────────┘
//!                                │
//!            ┌───────────────────┴───────────────────┐
//!            ▼                                       ▼
//!     ┌────────────┐                          ┌────────────┐
//!     │    TUI     │                          │  remote::  │
//!     │  Adapter   │                          │ TaskService│
//!     │ (ratatui)  │                          │  (HTTP)    │
//!     └────────────┘                          └────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`state`]: The `App` struct, all front-end state in one place
//! - [`action`]: The `Action` enum and the `update()` reducer
//! - [`cache`]: TTL cache of projects, labels and saved filters
//! - [`query`]: Logical filters to fetch parameters
//! - [`workspace`]: Mutations with cache invalidation, filtered task loads
//! - [`quick_entry`]: `#project @label due` extraction
//! - [`config`]: `~/.tuidoist/config.toml` and overrides

pub mod action;
pub mod cache;
pub mod config;
pub mod query;
pub mod quick_entry;
pub mod state;
pub mod workspace;

//! # fedplane
//!
//! Control plane for a data federation:
//! - Operator availability overrides reconciled with a static filter list
//! - A federation server listing joining advertisements, overrides and health
//! - Quorum object availability queries over longest-prefix namespace matches
//! - An origin-side watchdog over the director's periodic test reports
//!
//! ## Architecture

#![allow(clippy::result_large_err)]
//!
//! ```text
//!  advertisement feed        static filter list
//!          │                        │
//! ┌────────▼────────────────────────▼────────┐
//! │                Director                   │
//! │  overrides ─► listing ◄─ health map       │
//! │      │                                    │
//! │      └──► stat query ── HEAD ──┐          │
//! └────────────────────────────────┼──────────┘
//!          │ director test         │
//! ┌────────▼─────┐   ┌─────────────▼┐   ┌─────────────┐
//! │  Origin 1    │   │  Origin 2    │   │  Origin 3   │
//! │  (watchdog)  │   │  (watchdog)  │   │  (watchdog) │
//! └──────────────┘   └──────────────┘   └─────────────┘
//! ```
//!
//! ## Usage
//!
//! ### Start a director
//! ```bash
//! FEDPLANE_CONFIG=./director.toml fedplane-director serve --bind 0.0.0.0:8444
//! ```
//!
//! ### Start an origin
//! ```bash
//! FEDPLANE_CONFIG=./origin.toml fedplane-origin serve --bind 0.0.0.0:8443
//! ```

pub mod common;
pub mod director;
pub mod origin;

// Re-export commonly used types
pub use common::{Config, Error, Result};
pub use director::Director;
pub use origin::OriginServer;

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build info
pub const BUILD_INFO: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("CARGO_PKG_NAME"), ")");

//! # Relman
//!
//! Release manifests, change detection and chart bumping for a platform made
//! of many independently versioned applications.
//!
//! Relman runs as three single-shot CI steps:
//!
//! - **Detect**: turn per-application version variables into the list of
//!   changed applications and shell-safe records
//! - **Manifest**: snapshot every application's version into
//!   `releases/<release>.json` and `releases/latest.json`
//! - **Chart**: write new image tags into `values.yaml` and bump `Chart.yaml`,
//!   keeping comments and quoting intact
//!
//! ## Quick Start
//!
//! ```bash
//! # Which applications changed in this run?
//! relman detect
//!
//! # Snapshot versions for release v1.4.0
//! relman manifest --release v1.4.0
//!
//! # Apply the detector's records to the chart
//! relman chart "$RECORDS" --release v1.4.0
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::map_unwrap_or)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unnecessary_map_or)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::missing_panics_doc)]

pub mod chart;
pub mod core;
pub mod detect;
pub mod manifest;

// Re-export commonly used types
pub use chart::{ChartUpdate, ChartUpdater, ChartVersion};
pub use crate::core::{ApplicationId, ApplicationRecord, Config, ReleaseError, ReleaseResult};
pub use detect::{detect_changes, ChangeSet, ReleaseValues};
pub use manifest::{diff_releases, read_manifest, ManifestWriter, ReleaseDiff, ReleaseManifest};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "relman";

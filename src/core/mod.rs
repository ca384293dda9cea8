//! Core types shared by every release stage: application identifiers,
//! configuration and errors.

mod app;
mod config;
mod error;
mod staging;

pub use app::{ApplicationId, ApplicationRecord, STANDALONE_ROOT};
pub use config::{
    expand_path, AppsConfig, ChartConfig, Config, DeployConfig, GeneralConfig, ManifestConfig,
    DEFAULT_RELEASE_ENV, DEFAULT_SENTINEL,
};
pub use error::{ReleaseError, ReleaseResult};
pub use staging::{persist_pair, StagedFile};

//! Shared library for the Marchiver background host.
//!
//! This crate provides the settings store, the archive API client and the
//! request/response types used by the host process.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod settings;

pub use api::{ApiClient, ArchiveApi, SearchQuery};
pub use config::Config;
pub use error::{Error, Result};
pub use models::{Document, DocumentUpdate, Response, ResponseData};
pub use settings::{FileSettingsStore, MemorySettingsStore, Settings, SettingsPatch, SettingsStore};

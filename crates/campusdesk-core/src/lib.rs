//! CampusDesk Core: shared errors and configuration.

pub mod config;
pub mod error;

pub use config::{CampusConfig, ChunkSettings, DataPaths, RetrievalSettings};
pub use error::{Error, Result};

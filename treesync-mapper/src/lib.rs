//! # treesync-mapper
//!
//! Mapper pipeline and the managers that drive it.
//!
//! Build a [`Pipeline::standard`], then use [`LocalManager`] to load and
//! save the project directory and [`RemoteManager`] to pull from and push
//! to the API.

pub mod diff;
pub mod error;
pub mod local;
pub mod mappers;
pub mod pipeline;
pub mod recipe;
pub mod remote;
pub mod rename;
pub mod report;

pub use error::MapperError;
pub use local::{IdSource, LocalManager, SaveOutcome, WriteResult};
pub use mappers::orchestrator::sorter::PhasesSorter;
pub use pipeline::{Mapper, Pipeline};
pub use remote::{ApiClient, ConfigWithRows, PushAction, RemoteManager};
pub use rename::RenameAction;
pub use report::Report;

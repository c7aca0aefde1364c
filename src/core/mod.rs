//! Core module - fundamental types and utilities

pub mod config;
pub mod database;
pub mod entity;
pub mod error;
pub mod events;
pub mod identity;
pub mod query_cache;
pub mod validation;
pub mod workspace;

pub use config::Config;
pub use database::Database;
pub use entity::Entity;
pub use error::StoreError;
pub use events::{ChangeEvent, ChangeFeed, ChangeKind};
pub use identity::{EntityId, EntityPrefix, IdParseError};
pub use query_cache::{QueryCache, QueryKey};
pub use validation::{Validate, ValidationErrors, Validator};
pub use workspace::{Workspace, WorkspaceError};

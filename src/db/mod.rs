//! Database abstraction layer.
//!
//! This module provides trait-based abstractions for data access,
//! allowing different storage backends to be swapped without changing
//! business logic.
//!
//! # Architecture
//!
//! - `error`: Storage-agnostic error types
//! - `models`: Domain entities (Entry, Tag, Video)
//! - `repository`: Trait definitions for data access
//! - `sqlite`: SQLx implementation publishing to the change buses

mod error;
mod models;
mod repository;
pub mod sqlite;
pub mod utils;


pub use error::{DbError, DbResult};
pub use models::*;
pub use repository::*;
pub use sqlite::SqliteDatabase;

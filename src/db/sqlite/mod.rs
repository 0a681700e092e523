//! SQLite implementation of the database traits.
//!
//! This module provides a SQLite-backed implementation of the repository
//! traits defined in the parent module.

mod connection;
mod entry;
mod helpers;
mod tag;
mod video;

#[cfg(test)]
mod connection_test;
#[cfg(test)]
mod tag_test;
#[cfg(test)]
mod video_test;

pub use connection::SqliteDatabase;
pub use entry::SqliteEntryRepository;
pub use tag::SqliteTagRepository;
pub use video::SqliteVideoRepository;

//! Path resolution for epicme directories.
//!
//! Provides XDG-compliant defaults for the database and rendered videos.

use std::env;
use std::path::PathBuf;

const APP_DIR: &str = "epicme";

fn data_dir_from(xdg_data_home: Option<String>, home: Option<String>) -> Option<PathBuf> {
    let data_home = match xdg_data_home.filter(|v| !v.is_empty()) {
        Some(dir) => PathBuf::from(dir),
        None => PathBuf::from(home.filter(|v| !v.is_empty())?).join(".local/share"),
    };
    Some(data_home.join(APP_DIR))
}

/// XDG data directory: `$XDG_DATA_HOME/epicme` or `~/.local/share/epicme`.
///
/// Returns `None` when neither `XDG_DATA_HOME` nor `HOME` is set.
pub fn data_dir() -> Option<PathBuf> {
    data_dir_from(env::var("XDG_DATA_HOME").ok(), env::var("HOME").ok())
}

/// Default database file (`<data dir>/epicme.db`).
pub fn db_path() -> Option<PathBuf> {
    data_dir().map(|dir| dir.join("epicme.db"))
}

/// Default directory for rendered videos (`<data dir>/videos`).
pub fn videos_dir() -> Option<PathBuf> {
    data_dir().map(|dir| dir.join("videos"))
}

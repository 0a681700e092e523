//! `epicme://` resource URIs.

use crate::db::Id;

pub const SCHEME: &str = "epicme://";

pub const ENTRY_TEMPLATE: &str = "epicme://entries/{id}";
pub const TAG_TEMPLATE: &str = "epicme://tags/{id}";
pub const VIDEO_TEMPLATE: &str = "epicme://videos/{name}";

pub fn entry_uri(id: Id) -> String {
    format!("{}entries/{}", SCHEME, id)
}

pub fn tag_uri(id: Id) -> String {
    format!("{}tags/{}", SCHEME, id)
}

pub fn video_uri(name: &str) -> String {
    format!("{}videos/{}", SCHEME, name)
}

/// A parsed resource URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceUri {
    Entry(Id),
    Tag(Id),
    Video(String),
}

impl ResourceUri {
    /// Capability (resource flag) that governs this URI.
    pub fn capability(&self) -> &'static str {
        match self {
            ResourceUri::Entry(_) => "entries",
            ResourceUri::Tag(_) => "tags",
            ResourceUri::Video(_) => "videos",
        }
    }
}

/// Parse an `epicme://` URI. Returns `None` for anything malformed.
pub fn parse(uri: &str) -> Option<ResourceUri> {
    let rest = uri.strip_prefix(SCHEME)?;
    let (collection, key) = rest.split_once('/')?;
    if key.is_empty() || key.contains('/') {
        return None;
    }

    match collection {
        "entries" => key.parse().ok().map(ResourceUri::Entry),
        "tags" => key.parse().ok().map(ResourceUri::Tag),
        "videos" => Some(ResourceUri::Video(key.to_string())),
        _ => None,
    }
}

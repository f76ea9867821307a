use serde::Serialize;

use crate::{
    container::{Container, EntryKind},
    error::ResultsError,
    mime,
};

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Directory,
    File,
}

/// One child in a directory listing.
///
/// Directories carry `has_children` and nothing deeper; files carry size and
/// content type.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ChildSummary {
    pub path: String,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_children: Option<bool>,
}

impl ChildSummary {
    pub fn directory(path: String, name: String, has_children: bool) -> Self {
        ChildSummary {
            path,
            name,
            node_type: NodeType::Directory,
            size_bytes: None,
            mime: None,
            has_children: Some(has_children),
        }
    }

    pub fn file(path: String, name: String, size_bytes: u64) -> Self {
        let mime = mime::lookup(&name);
        ChildSummary {
            path,
            name,
            node_type: NodeType::File,
            size_bytes: Some(size_bytes),
            mime: Some(mime),
            has_children: None,
        }
    }
}

/// Immediate visible children of `container`, sorted by name.
///
/// `base_path` is the API path of the container itself and must end in `/`.
/// Subdirectories are probed one level deep for `has_children`, never more.
pub fn list_children(
    container: &Container,
    base_path: &str,
) -> Result<Vec<ChildSummary>, ResultsError> {
    let entries = container.entries()?;

    Ok(entries
        .into_iter()
        .map(|entry| match entry.kind {
            EntryKind::Directory => {
                let has_children = container.has_visible_children(&entry.name);
                ChildSummary::directory(
                    format!("{}{}/", base_path, entry.name),
                    entry.name,
                    has_children,
                )
            }
            EntryKind::File { size_bytes } => ChildSummary::file(
                format!("{}{}", base_path, entry.name),
                entry.name,
                size_bytes,
            ),
        })
        .collect())
}

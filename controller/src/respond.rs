use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::path::PathBuf;
use tokio_util::io::ReaderStream;

use crate::{
    error::ResultsError,
    listing::{list_children, ChildSummary, NodeType},
    paging::{paginate, PageRequest, PagingBlock},
    resolver::{FileSource, ResolvedNode},
};

// -------------------------------------------
// Response shapes
// -------------------------------------------

/// Identity of the directory a request is rooted at.
#[derive(Debug, Clone)]
pub struct NodeBase {
    pub analysis_job_id: String,
    pub audio_recording_id: Option<u64>,
    /// API path of the resolution prefix, ending in `/`.
    pub path: String,
    /// Name reported when the prefix itself is requested.
    pub name: String,
}

#[derive(Debug, Serialize)]
struct Meta {
    status: u16,
    message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct DirectoryData {
    id: Option<u64>,
    analysis_job_id: String,
    audio_recording_id: Option<u64>,
    path: String,
    name: String,
    #[serde(rename = "type")]
    node_type: NodeType,
    children: Vec<ChildSummary>,
}

#[derive(Debug, Serialize)]
struct ListingEnvelope {
    meta: Meta,
    data: DirectoryData,
    paging: PagingBlock,
}

pub enum FileBody {
    Disk(PathBuf),
    Bytes(Vec<u8>),
    /// HEAD requests never read content.
    Empty,
}

pub struct FileResponse {
    pub name: String,
    pub size_bytes: u64,
    pub mime: String,
    pub body: FileBody,
}

pub enum Prepared {
    Listing {
        base: NodeBase,
        children: Vec<ChildSummary>,
    },
    File(FileResponse),
    NotFound {
        attempted_path: String,
    },
}

// -------------------------------------------
// Blocking half
// -------------------------------------------

/// Turns a resolved node into something the async half can send.
///
/// Runs on the blocking pool. The node is consumed here, so an archive it
/// holds is closed before this returns, whatever the outcome.
pub fn prepare(node: ResolvedNode, base: &NodeBase, head: bool) -> Result<Prepared, ResultsError> {
    match node {
        ResolvedNode::NotFound { attempted_path } => Ok(Prepared::NotFound { attempted_path }),
        ResolvedNode::Directory(dir) => {
            let (path, name) = if dir.canonical_path.is_empty() {
                (base.path.clone(), base.name.clone())
            } else {
                (format!("{}{}/", base.path, dir.canonical_path), dir.name)
            };
            let children = list_children(&dir.container, &path)?;

            Ok(Prepared::Listing {
                base: NodeBase {
                    path,
                    name,
                    ..base.clone()
                },
                children,
            })
        }
        ResolvedNode::File(file) => {
            let body = match file.source {
                _ if head => FileBody::Empty,
                FileSource::Disk(path) => FileBody::Disk(path),
                FileSource::Archive { mut archive, entry } => {
                    FileBody::Bytes(archive.read_entry(&entry)?)
                }
            };

            Ok(Prepared::File(FileResponse {
                name: file.name,
                size_bytes: file.size_bytes,
                mime: file.mime,
                body,
            }))
        }
    }
}

// -------------------------------------------
// Async half
// -------------------------------------------

/// JSON directory node with one level of children and a paging block.
///
/// HEAD gets the same status and headers with no body.
pub fn listing_response(
    base: NodeBase,
    children: Vec<ChildSummary>,
    request: PageRequest,
    head: bool,
) -> Result<Response, ResultsError> {
    let (children, state) = paginate(children, request);
    let paging = state.block(&base.path);

    let envelope = ListingEnvelope {
        meta: Meta {
            status: StatusCode::OK.as_u16(),
            message: "OK",
        },
        data: DirectoryData {
            id: None,
            analysis_job_id: base.analysis_job_id,
            audio_recording_id: base.audio_recording_id,
            path: base.path,
            name: base.name,
            node_type: NodeType::Directory,
            children,
        },
        paging,
    };

    let bytes = serde_json::to_vec(&envelope).map_err(std::io::Error::from)?;
    let headers = [
        (
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        ),
        (header::CONTENT_LENGTH, HeaderValue::from(bytes.len())),
    ];
    let body = if head { Body::empty() } else { Body::from(bytes) };

    Ok((StatusCode::OK, headers, body).into_response())
}

/// Raw file bytes, streamed from disk or sent from a decompressed entry.
pub async fn file_response(file: FileResponse) -> Result<Response, ResultsError> {
    let mime = if file.mime.is_empty() {
        "application/octet-stream"
    } else {
        file.mime.as_str()
    };
    let content_type = HeaderValue::from_str(mime)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    let (length, body) = match file.body {
        FileBody::Empty => (file.size_bytes, Body::empty()),
        FileBody::Bytes(bytes) => (bytes.len() as u64, Body::from(bytes)),
        FileBody::Disk(path) => {
            let handle = tokio::fs::File::open(&path).await?;
            (file.size_bytes, Body::from_stream(ReaderStream::new(handle)))
        }
    };

    let headers = [
        (header::CONTENT_TYPE, content_type),
        (header::CONTENT_LENGTH, HeaderValue::from(length)),
        (header::CONTENT_DISPOSITION, content_disposition(&file.name)),
    ];

    Ok((StatusCode::OK, headers, body).into_response())
}

/// `inline; filename="<name>"` with anything outside printable ASCII, quotes
/// and backslashes replaced.
fn content_disposition(name: &str) -> HeaderValue {
    let safe: String = name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() || c == ' ') && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();

    HeaderValue::from_str(&format!("inline; filename=\"{}\"", safe))
        .unwrap_or_else(|_| HeaderValue::from_static("inline"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    fn base() -> NodeBase {
        NodeBase {
            analysis_job_id: "12".into(),
            audio_recording_id: Some(3),
            path: "/analysis_jobs/12/results/3/Towsey.Acoustic/".into(),
            name: "Towsey.Acoustic".into(),
        }
    }

    #[test]
    fn disposition_is_sanitized() {
        assert_eq!(
            content_disposition("test-CASE.csv"),
            "inline; filename=\"test-CASE.csv\""
        );
        assert_eq!(
            content_disposition("we\"ird\\näme.txt"),
            "inline; filename=\"we_ird_n_me.txt\""
        );
    }

    #[tokio::test]
    async fn head_listing_keeps_headers_and_drops_body() {
        let get = listing_response(base(), Vec::new(), PageRequest::default(), false).unwrap();
        let head = listing_response(base(), Vec::new(), PageRequest::default(), true).unwrap();

        assert_eq!(get.status(), head.status());
        assert_eq!(
            get.headers().get(header::CONTENT_TYPE),
            head.headers().get(header::CONTENT_TYPE)
        );
        assert_eq!(
            get.headers().get(header::CONTENT_LENGTH),
            head.headers().get(header::CONTENT_LENGTH)
        );

        let body = to_bytes(head.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());

        let body = to_bytes(get.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["data"]["children"], serde_json::json!([]));
        assert_eq!(json["data"]["id"], serde_json::Value::Null);
        assert_eq!(json["paging"]["max_page"], 1);
    }

    #[tokio::test]
    async fn archive_entry_bytes_are_sent_verbatim() {
        let payload = b"\x00\x01binary\xffdata".to_vec();
        let response = file_response(FileResponse {
            name: "data.bin".into(),
            size_bytes: payload.len() as u64,
            mime: String::new(),
            body: FileBody::Bytes(payload.clone()),
        })
        .await
        .unwrap();

        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/octet-stream"
        );
        assert_eq!(
            response.headers().get(header::CONTENT_LENGTH).unwrap(),
            &payload.len().to_string()
        );
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.as_ref(), payload.as_slice());
    }
}

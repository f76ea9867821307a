use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;
use tracing::error;

// -------------------------------------------
// Error taxonomy
// -------------------------------------------

/// Everything that can stop a results request.
///
/// Resolution misses of any kind (missing prefix, case mismatch, `..`,
/// hidden names) all become `NotFound` before they reach a handler.
#[derive(Debug, Error)]
pub enum ResultsError {
    /// Carries the client-facing message, never an absolute path.
    #[error("{0}")]
    NotFound(String),

    #[error("permission denied")]
    PermissionDenied,

    #[error("authentication required")]
    Unauthenticated,

    #[error("archive {} could not be read: {source}", path.display())]
    ArchiveCorrupt {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ResultsError {
    pub fn status(&self) -> StatusCode {
        match self {
            ResultsError::NotFound(_) => StatusCode::NOT_FOUND,
            ResultsError::PermissionDenied => StatusCode::FORBIDDEN,
            ResultsError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ResultsError::ArchiveCorrupt { .. } | ResultsError::Io(_) | ResultsError::Task(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn details(&self) -> String {
        match self {
            ResultsError::NotFound(message) => message.clone(),
            ResultsError::PermissionDenied => {
                "You do not have sufficient permissions to access this page.".into()
            }
            ResultsError::Unauthenticated => {
                "You need to log in or register before continuing.".into()
            }
            _ => "An unexpected error occurred while reading analysis results.".into(),
        }
    }
}

impl IntoResponse for ResultsError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("results request failed: {}", self);
        }

        let body = json!({
            "meta": {
                "status": status.as_u16(),
                "message": status.canonical_reason().unwrap_or("Error"),
                "error": { "details": self.details() },
            }
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_hide_filesystem_paths() {
        let err = ResultsError::ArchiveCorrupt {
            path: PathBuf::from("/mnt/results/secret/output.zip"),
            source: zip::result::ZipError::InvalidArchive("bad central directory"),
        };

        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.details().contains("/mnt/results"));
    }

    #[test]
    fn gate_failures_map_to_auth_statuses() {
        assert_eq!(ResultsError::PermissionDenied.status(), StatusCode::FORBIDDEN);
        assert_eq!(ResultsError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ResultsError::NotFound("gone".into()).status(),
            StatusCode::NOT_FOUND
        );
    }
}

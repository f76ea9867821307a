use axum::http::{header::AUTHORIZATION, HeaderMap};

use crate::storage::JobId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Granted,
    Denied,
    Unauthenticated,
}

/// Read-access decision made before any path is resolved.
///
/// `recording_id` is `None` for job-level listings.
pub trait AccessGate: Send + Sync {
    fn check(&self, headers: &HeaderMap, job: &JobId, recording_id: Option<u64>) -> Access;
}

/// Grants everything. For deployments that authorize upstream.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenGate;

impl AccessGate for OpenGate {
    fn check(&self, _headers: &HeaderMap, _job: &JobId, _recording_id: Option<u64>) -> Access {
        Access::Granted
    }
}

/// Requires one shared credential, sent as `Authorization: Bearer <t>` or
/// `Authorization: Token token="<t>"`.
#[derive(Debug, Clone)]
pub struct TokenGate {
    token: String,
}

impl TokenGate {
    pub fn new(token: impl Into<String>) -> Self {
        TokenGate {
            token: token.into(),
        }
    }
}

impl AccessGate for TokenGate {
    fn check(&self, headers: &HeaderMap, _job: &JobId, _recording_id: Option<u64>) -> Access {
        let presented = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(presented_token);

        match presented {
            None => Access::Unauthenticated,
            Some(t) if t == self.token => Access::Granted,
            Some(_) => Access::Denied,
        }
    }
}

fn presented_token(header: &str) -> Option<&str> {
    if let Some(rest) = header.strip_prefix("Bearer ") {
        return Some(rest.trim()).filter(|t| !t.is_empty());
    }
    let rest = header.strip_prefix("Token ")?.trim();
    let value = rest.strip_prefix("token=")?;
    Some(value.trim_matches('"')).filter(|t| !t.is_empty())
}

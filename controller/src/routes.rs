use axum::{
    extract::{Path, Query, State},
    http::{header::ACCEPT, HeaderMap, Method},
    response::Response,
};
use serde::Deserialize;
use tracing::debug;

use crate::{
    error::ResultsError,
    gate::Access,
    listing::ChildSummary,
    paging::PageRequest,
    resolver::{resolve, Representation},
    respond::{file_response, listing_response, prepare, NodeBase, Prepared},
    storage::{JobId, ResultsLocation},
    SharedState,
};

// -------------------------------------------
// Request types
// -------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ResultsQuery {
    pub page: Option<String>,
    pub items: Option<String>,
    pub format: Option<String>,
}

/// The two URL shapes that expose results. They resolve identically and only
/// differ in path layout and not-found wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteFamily {
    /// `/analysis_jobs/{job}/results/{recording}/{script}/...`
    Results,
    /// `/analysis_jobs/{job}/audio_recordings/{recording}/...`
    Legacy,
}

impl RouteFamily {
    fn not_found(self, job: &str, recording: Option<&str>, path: &str) -> ResultsError {
        let message = match (self, recording) {
            (RouteFamily::Results, Some(recording)) => format!(
                "Could not find results directory for analysis job '{}' for recording {} at '{}'.",
                job, recording, path
            ),
            (RouteFamily::Results, None) => format!(
                "Could not find results directory for analysis job '{}' at '{}'.",
                job, path
            ),
            (RouteFamily::Legacy, recording) => format!(
                "Could not find results for job '{}' for recording {} in '{}'.",
                job,
                recording.unwrap_or("unknown"),
                path
            ),
        };
        ResultsError::NotFound(message)
    }
}

struct ResultsRequest {
    family: RouteFamily,
    job: String,
    recording: Option<String>,
    script: Option<String>,
    results_path: String,
}

impl ResultsRequest {
    /// Requested path below the recording, as shown in not-found messages.
    fn display_path(&self) -> String {
        match &self.script {
            Some(script) => format!("/{}/{}", script, self.results_path.trim_start_matches('/')),
            None => format!("/{}", self.results_path.trim_start_matches('/')),
        }
    }
}

// -------------------------------------------
// Handlers
// -------------------------------------------

/// GET|HEAD /analysis_jobs/:analysis_job_id/results[/]
pub async fn job_results(
    State(state): State<SharedState>,
    method: Method,
    headers: HeaderMap,
    Path(job): Path<String>,
    Query(query): Query<ResultsQuery>,
) -> Result<Response, ResultsError> {
    let request = ResultsRequest {
        family: RouteFamily::Results,
        job,
        recording: None,
        script: None,
        results_path: String::new(),
    };
    serve(state, method, headers, query, request).await
}

/// GET|HEAD /analysis_jobs/:analysis_job_id/results/:audio_recording_id[/]
pub async fn recording_results(
    State(state): State<SharedState>,
    method: Method,
    headers: HeaderMap,
    Path((job, recording)): Path<(String, String)>,
    Query(query): Query<ResultsQuery>,
) -> Result<Response, ResultsError> {
    let request = ResultsRequest {
        family: RouteFamily::Results,
        job,
        recording: Some(recording),
        script: None,
        results_path: String::new(),
    };
    serve(state, method, headers, query, request).await
}

/// GET|HEAD /analysis_jobs/:analysis_job_id/results/:audio_recording_id/:script_id[/]
pub async fn script_results(
    State(state): State<SharedState>,
    method: Method,
    headers: HeaderMap,
    Path((job, recording, script)): Path<(String, String, String)>,
    Query(query): Query<ResultsQuery>,
) -> Result<Response, ResultsError> {
    let request = ResultsRequest {
        family: RouteFamily::Results,
        job,
        recording: Some(recording),
        script: Some(script),
        results_path: String::new(),
    };
    serve(state, method, headers, query, request).await
}

/// GET|HEAD /analysis_jobs/:analysis_job_id/results/:audio_recording_id/:script_id/*results_path
pub async fn script_results_path(
    State(state): State<SharedState>,
    method: Method,
    headers: HeaderMap,
    Path((job, recording, script, results_path)): Path<(String, String, String, String)>,
    Query(query): Query<ResultsQuery>,
) -> Result<Response, ResultsError> {
    let request = ResultsRequest {
        family: RouteFamily::Results,
        job,
        recording: Some(recording),
        script: Some(script),
        results_path,
    };
    serve(state, method, headers, query, request).await
}

/// GET|HEAD /analysis_jobs/:analysis_job_id/audio_recordings/:audio_recording_id[/]
pub async fn legacy_results(
    State(state): State<SharedState>,
    method: Method,
    headers: HeaderMap,
    Path((job, recording)): Path<(String, String)>,
    Query(query): Query<ResultsQuery>,
) -> Result<Response, ResultsError> {
    let request = ResultsRequest {
        family: RouteFamily::Legacy,
        job,
        recording: Some(recording),
        script: None,
        results_path: String::new(),
    };
    serve(state, method, headers, query, request).await
}

/// GET|HEAD /analysis_jobs/:analysis_job_id/audio_recordings/:audio_recording_id/*results_path
pub async fn legacy_results_path(
    State(state): State<SharedState>,
    method: Method,
    headers: HeaderMap,
    Path((job, recording, results_path)): Path<(String, String, String)>,
    Query(query): Query<ResultsQuery>,
) -> Result<Response, ResultsError> {
    let request = ResultsRequest {
        family: RouteFamily::Legacy,
        job,
        recording: Some(recording),
        script: None,
        results_path,
    };
    serve(state, method, headers, query, request).await
}

// -------------------------------------------
// Shared request flow
// -------------------------------------------

async fn serve(
    state: SharedState,
    method: Method,
    headers: HeaderMap,
    query: ResultsQuery,
    request: ResultsRequest,
) -> Result<Response, ResultsError> {
    let head = method == Method::HEAD;
    let page = PageRequest::parse(query.page.as_deref(), query.items.as_deref());
    let family = request.family;
    let display_path = request.display_path();

    let job = JobId::parse(&request.job).ok_or_else(|| {
        family.not_found(&request.job, request.recording.as_deref(), &display_path)
    })?;

    let recording_id = match &request.recording {
        Some(raw) => Some(raw.parse::<u64>().map_err(|_| {
            family.not_found(&request.job, Some(raw.as_str()), &display_path)
        })?),
        None => None,
    };

    match state.gate.check(&headers, &job, recording_id) {
        Access::Granted => {}
        Access::Denied => return Err(ResultsError::PermissionDenied),
        Access::Unauthenticated => return Err(ResultsError::Unauthenticated),
    }

    let recording_id = match recording_id {
        Some(id) => id,
        None => return job_listing(&state, &job, &display_path, page, head),
    };

    let recording = state
        .catalog
        .recording_in_job(&job, recording_id)
        .ok_or_else(|| {
            family.not_found(&request.job, request.recording.as_deref(), &display_path)
        })?;

    let script = match family {
        RouteFamily::Results => request.script.clone(),
        RouteFamily::Legacy => state.legacy_script.clone(),
    };

    let mut base_path = match family {
        RouteFamily::Results => format!("/analysis_jobs/{}/results/{}/", job, recording_id),
        RouteFamily::Legacy => format!("/analysis_jobs/{}/audio_recordings/{}/", job, recording_id),
    };
    if let (RouteFamily::Results, Some(script)) = (family, &script) {
        base_path.push_str(script);
        base_path.push('/');
    }

    let base = NodeBase {
        analysis_job_id: job.to_string(),
        audio_recording_id: Some(recording_id),
        path: base_path,
        name: match (family, &script) {
            (RouteFamily::Results, Some(script)) => script.clone(),
            _ => recording_id.to_string(),
        },
    };

    let location = ResultsLocation {
        job: job.clone(),
        recording_uuid: recording.uuid.clone(),
        script,
    };
    let representation = representation(&query, &headers);
    let results_path = request.results_path.clone();

    let blocking_state = state.clone();
    let prepared = tokio::task::spawn_blocking(move || {
        let node = resolve(&blocking_state.roots, &location, &results_path, representation)?;
        prepare(node, &base, head)
    })
    .await??;

    match prepared {
        Prepared::NotFound { attempted_path } => {
            debug!(
                "job {} recording {}: nothing at {:?}",
                job, recording.uuid, attempted_path
            );
            Err(family.not_found(&request.job, Some(&recording.uuid), &display_path))
        }
        Prepared::Listing { base, children } => listing_response(base, children, page, head),
        Prepared::File(file) => file_response(file).await,
    }
}

/// Recordings of a job, as virtual directories.
fn job_listing(
    state: &SharedState,
    job: &JobId,
    display_path: &str,
    page: PageRequest,
    head: bool,
) -> Result<Response, ResultsError> {
    let recordings = state
        .catalog
        .recordings_for_job(job)
        .ok_or_else(|| RouteFamily::Results.not_found(&job.to_string(), None, display_path))?;

    let path = format!("/analysis_jobs/{}/results/", job);
    let mut children: Vec<ChildSummary> = recordings
        .iter()
        .map(|r| ChildSummary::directory(format!("{}{}/", path, r.id), r.id.to_string(), true))
        .collect();
    children.sort_by(|a, b| a.name.cmp(&b.name));

    let base = NodeBase {
        analysis_job_id: job.to_string(),
        audio_recording_id: None,
        path,
        name: "results".into(),
    };
    listing_response(base, children, page, head)
}

/// Structured data is requested with `?format=json` or a JSON `Accept`.
fn representation(query: &ResultsQuery, headers: &HeaderMap) -> Representation {
    let wants_json = query
        .format
        .as_deref()
        .map_or(false, |f| f.eq_ignore_ascii_case("json"))
        || headers
            .get(ACCEPT)
            .and_then(|v| v.to_str().ok())
            .map_or(false, |v| v.contains("application/json"));

    if wants_json {
        Representation::Listing
    } else {
        Representation::Content
    }
}

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod archive;
pub mod catalog;
pub mod config;
pub mod container;
pub mod error;
pub mod gate;
pub mod listing;
pub mod mime;
pub mod paging;
pub mod resolver;
pub mod respond;
pub mod routes;
pub mod storage;

pub use error::ResultsError;
pub use storage::{JobId, StorageRoots};

use catalog::RecordingCatalog;
use gate::AccessGate;

// -----------------------------------------------------------------------------
// Shared state
// -----------------------------------------------------------------------------

/// Read-only state shared by every request. Nothing in here changes after
/// startup, so no locking is needed.
pub struct ResultsState {
    pub roots: StorageRoots,
    pub catalog: Arc<dyn RecordingCatalog>,
    pub gate: Arc<dyn AccessGate>,
    /// Script served by the legacy route family; `None` serves the
    /// recording directory itself.
    pub legacy_script: Option<String>,
}

pub type SharedState = Arc<ResultsState>;

// -----------------------------------------------------------------------------
// Router
// -----------------------------------------------------------------------------

/// Every results route. `get` also answers HEAD.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/analysis_jobs/:analysis_job_id/results", get(routes::job_results))
        .route("/analysis_jobs/:analysis_job_id/results/", get(routes::job_results))
        .route(
            "/analysis_jobs/:analysis_job_id/results/:audio_recording_id",
            get(routes::recording_results),
        )
        .route(
            "/analysis_jobs/:analysis_job_id/results/:audio_recording_id/",
            get(routes::recording_results),
        )
        .route(
            "/analysis_jobs/:analysis_job_id/results/:audio_recording_id/:script_id",
            get(routes::script_results),
        )
        .route(
            "/analysis_jobs/:analysis_job_id/results/:audio_recording_id/:script_id/",
            get(routes::script_results),
        )
        .route(
            "/analysis_jobs/:analysis_job_id/results/:audio_recording_id/:script_id/*results_path",
            get(routes::script_results_path),
        )
        // Legacy flat form, one script per recording.
        .route(
            "/analysis_jobs/:analysis_job_id/audio_recordings/:audio_recording_id",
            get(routes::legacy_results),
        )
        .route(
            "/analysis_jobs/:analysis_job_id/audio_recordings/:audio_recording_id/",
            get(routes::legacy_results),
        )
        .route(
            "/analysis_jobs/:analysis_job_id/audio_recordings/:audio_recording_id/*results_path",
            get(routes::legacy_results_path),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

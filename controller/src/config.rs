use anyhow::{bail, Context, Result};
use std::{env, net::SocketAddr, path::PathBuf, sync::Arc};
use tracing::{info, warn};

use crate::{
    catalog::{RecordingCatalog, StaticCatalog},
    gate::{AccessGate, OpenGate, TokenGate},
    storage::StorageRoots,
    ResultsState, SharedState,
};

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_STORAGE_ROOT: &str = "./analysis_results";

/// Process configuration, read once at startup.
///
/// - `RESULTS_LISTEN_ADDR`: bind address (default `0.0.0.0:8080`)
/// - `RESULTS_STORAGE_ROOTS`: ordered, OS path-list separated roots
/// - `RESULTS_CATALOG`: JSON recording catalog; unset means empty
/// - `RESULTS_LEGACY_SCRIPT`: script served by the legacy route family
/// - `RESULTS_API_TOKEN`: require this bearer token when set
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub listen_addr: SocketAddr,
    pub storage_roots: Vec<PathBuf>,
    pub catalog_path: Option<PathBuf>,
    pub legacy_script: Option<String>,
    pub api_token: Option<String>,
}

impl ControllerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let listen_addr = non_empty("RESULTS_LISTEN_ADDR")
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let listen_addr: SocketAddr = listen_addr
            .parse()
            .with_context(|| format!("invalid RESULTS_LISTEN_ADDR {:?}", listen_addr))?;

        let storage_roots: Vec<PathBuf> = match non_empty("RESULTS_STORAGE_ROOTS") {
            Some(raw) => env::split_paths(&raw)
                .filter(|p| !p.as_os_str().is_empty())
                .collect(),
            None => vec![PathBuf::from(DEFAULT_STORAGE_ROOT)],
        };
        if storage_roots.is_empty() {
            bail!("RESULTS_STORAGE_ROOTS names no directories");
        }

        Ok(ControllerConfig {
            listen_addr,
            storage_roots,
            catalog_path: non_empty("RESULTS_CATALOG").map(PathBuf::from),
            legacy_script: non_empty("RESULTS_LEGACY_SCRIPT"),
            api_token: non_empty("RESULTS_API_TOKEN"),
        })
    }

    /// Loads the collaborators named by this config into request state.
    pub fn into_state(self) -> Result<SharedState> {
        for root in &self.storage_roots {
            if root.is_dir() {
                info!("results storage root {}", root.display());
            } else {
                warn!("results storage root {} does not exist yet", root.display());
            }
        }

        let catalog: Arc<dyn RecordingCatalog> = match &self.catalog_path {
            Some(path) => {
                info!("loading recording catalog from {}", path.display());
                Arc::new(StaticCatalog::load(path)?)
            }
            None => {
                warn!("RESULTS_CATALOG not set; no recordings will resolve");
                Arc::new(StaticCatalog::default())
            }
        };

        let gate: Arc<dyn AccessGate> = match self.api_token {
            Some(token) => Arc::new(TokenGate::new(token)),
            None => Arc::new(OpenGate),
        };

        Ok(Arc::new(ResultsState {
            roots: StorageRoots::new(self.storage_roots),
            catalog,
            gate,
            legacy_script: self.legacy_script,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<ControllerConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ControllerConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.listen_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(cfg.storage_roots, vec![PathBuf::from("./analysis_results")]);
        assert!(cfg.catalog_path.is_none());
        assert!(cfg.legacy_script.is_none());
        assert!(cfg.api_token.is_none());
    }

    #[test]
    fn storage_roots_keep_their_order() {
        let joined = env::join_paths(["/mnt/new", "/mnt/old"]).unwrap();
        let cfg = config(&[("RESULTS_STORAGE_ROOTS", joined.to_str().unwrap())]).unwrap();
        assert_eq!(
            cfg.storage_roots,
            vec![PathBuf::from("/mnt/new"), PathBuf::from("/mnt/old")]
        );
    }

    #[test]
    fn rejects_bad_listen_addr() {
        assert!(config(&[("RESULTS_LISTEN_ADDR", "not-an-addr")]).is_err());
    }

    #[test]
    fn blank_values_count_as_unset() {
        let cfg = config(&[("RESULTS_API_TOKEN", "  "), ("RESULTS_LEGACY_SCRIPT", "")]).unwrap();
        assert!(cfg.api_token.is_none());
        assert!(cfg.legacy_script.is_none());
    }
}

//! Cluster API configuration discovery.
//!
//! An explicit kubeconfig path (one file or a `KUBECONFIG`-style list) is
//! read and merged. Without one the configuration is inferred: the
//! `KUBECONFIG` environment, then the in-cluster service account, then
//! `~/.kube/config`.

use std::path::{Path, PathBuf};

use kube::config::{InferConfigError, KubeConfigOptions, Kubeconfig, KubeconfigError};
use kube::Config;
use thiserror::Error;

/// Error type for cluster configuration discovery.
#[derive(Debug, Error)]
pub enum ClusterConfigError {
    #[error("failed to read kubeconfig {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: KubeconfigError,
    },

    #[error("failed to load kubeconfig {}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: KubeconfigError,
    },

    #[error("failed to find kubeconfig: {0}")]
    NotFound(#[source] InferConfigError),
}

/// Locate and load the cluster configuration.
pub async fn load_cluster_config(path: Option<&Path>) -> Result<Config, ClusterConfigError> {
    match path.filter(|p| !p.as_os_str().is_empty()) {
        Some(path) => from_kubeconfig(path).await,
        None => Config::infer().await.map_err(ClusterConfigError::NotFound),
    }
}

async fn from_kubeconfig(path: &Path) -> Result<Config, ClusterConfigError> {
    let Some(kubeconfig) = read_merged(path)? else {
        return Config::infer().await.map_err(ClusterConfigError::NotFound);
    };
    Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .map_err(|source| ClusterConfigError::Load {
            path: path.to_path_buf(),
            source,
        })
}

/// Read every file of a path list; earlier files win on conflicts.
///
/// `None` when the list names no file at all.
fn read_merged(paths: &Path) -> Result<Option<Kubeconfig>, ClusterConfigError> {
    let mut merged: Option<Kubeconfig> = None;
    for path in std::env::split_paths(paths).filter(|p| !p.as_os_str().is_empty()) {
        let next = Kubeconfig::read_from(&path).map_err(|source| ClusterConfigError::Read {
            path: path.clone(),
            source,
        })?;
        merged = Some(match merged {
            Some(current) => current
                .merge(next)
                .map_err(|source| ClusterConfigError::Load { path, source })?,
            None => next,
        });
    }
    Ok(merged)
}

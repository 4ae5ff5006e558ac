//! Seams between the orchestrator and the subsystems it drives.

use std::sync::Arc;

use async_trait::async_trait;

use crate::cluster::load_cluster_config;
use crate::config::StartupOptions;
use crate::controller::{ControllerManager, ControllerRuntime, ReconcileContext};
use crate::error::HarvesterError;
use crate::http::server::{build_router, ApiState};
use crate::lifecycle::shutdown::ExecutionContext;
use crate::net::{DualProtocolListener, ListenerError};
use crate::observability::diagnostics::DiagnosticsEndpoint;

/// The management API serving subsystem.
#[async_trait]
pub trait ApiServer: Send + Sync {
    /// Serve until `ctx` is cancelled or a socket fails.
    ///
    /// Returns only after every socket has been closed.
    async fn serve(&self, ctx: ExecutionContext) -> Result<(), ListenerError>;
}

/// Best-effort diagnostics side channel.
pub trait Diagnostics: Send + Sync {
    /// Start in the background. Never fails and never blocks.
    fn start(&self, ctx: &ExecutionContext);
}

/// Everything the orchestrator starts once options are validated.
#[derive(Clone)]
pub struct Subsystems {
    pub diagnostics: Arc<dyn Diagnostics>,
    pub controllers: Arc<dyn ControllerRuntime>,
    pub server: Arc<dyn ApiServer>,
}

impl Subsystems {
    /// Wire the production subsystems for `options`.
    ///
    /// Loads the cluster configuration, so it fails when none can be found.
    pub async fn production(options: Arc<StartupOptions>) -> Result<Self, HarvesterError> {
        let cluster = Arc::new(load_cluster_config(options.kubeconfig.as_deref()).await?);
        tracing::info!(
            server = %cluster.cluster_url,
            namespace = %cluster.default_namespace,
            "Cluster configuration loaded"
        );

        let controllers = ControllerManager::new(ReconcileContext::new(
            cluster,
            options.namespace.clone(),
        ));
        let handler = build_router(ApiState::new(options.clone()));
        let server = DualProtocolListener::new(
            handler,
            options.listener.clone(),
            options.namespace.clone(),
            options.shutdown_grace,
        );
        let diagnostics = DiagnosticsEndpoint::new(options.diagnostics_address.clone());

        Ok(Self {
            diagnostics: Arc::new(diagnostics),
            controllers: Arc::new(controllers),
            server: Arc::new(server),
        })
    }
}

//! Dual protocol listener.
//!
//! # Responsibilities
//! - Bind the plain and TLS sockets concurrently
//! - Close whichever socket did bind when the other one fails
//! - Serve one handler tree on both sockets
//! - Stop both gracefully on cancellation or when either one fails
//!
//! # Design Decisions
//! - Sockets are bound before serving starts so bind errors surface as
//!   `BindFailed` and never leak an open socket
//! - Each protocol gets its own `axum_server::Handle`; a scoped child
//!   context drives both
//! - `serve` is the join point: it returns only after both sockets closed

use std::fmt;
use std::io;
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::ListenerOptions;
use crate::lifecycle::shutdown::ExecutionContext;
use crate::lifecycle::subsystem::ApiServer;
use crate::net::tls::load_tls_config;

/// Which of the two sockets an event concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Http,
    Https,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Http => f.write_str("http"),
            Protocol::Https => f.write_str("https"),
        }
    }
}

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// A socket could not be bound, or TLS could not be set up for it.
    #[error("failed to bind {protocol} listener on port {port}: {source}")]
    BindFailed {
        protocol: Protocol,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// A bound socket failed while serving.
    #[error("{protocol} listener failed: {source}")]
    Serve {
        protocol: Protocol,
        #[source]
        source: io::Error,
    },

    /// Serving ended although no shutdown was requested.
    #[error("management API stopped before shutdown was requested")]
    StoppedEarly,
}

/// Serves the management API on a plain and a TLS socket.
pub struct DualProtocolListener {
    handler: Router,
    options: ListenerOptions,
    namespace: String,
    grace: Duration,
}

impl DualProtocolListener {
    /// `namespace` names the self-signed certificate when no files are set.
    pub fn new(handler: Router, options: ListenerOptions, namespace: String, grace: Duration) -> Self {
        Self {
            handler,
            options,
            namespace,
            grace,
        }
    }

    /// Bind both sockets and prepare TLS.
    ///
    /// On any failure every socket that was bound is closed before returning.
    pub async fn bind(&self) -> Result<ServerHandle, ListenerError> {
        let http_addr = SocketAddr::new(self.options.bind_address, self.options.http_port);
        let https_addr = SocketAddr::new(self.options.bind_address, self.options.https_port);

        let (http, https) = tokio::join!(
            bind_socket(Protocol::Http, http_addr),
            bind_socket(Protocol::Https, https_addr),
        );

        let (http, https) = match (http, https) {
            (Ok(http), Ok(https)) => (http, https),
            (Err(e), other) | (other, Err(e)) => {
                if other.is_ok() {
                    tracing::warn!(error = %e, "Closing sibling listener after bind failure");
                }
                // Dropping `other` closes the socket that did bind.
                drop(other);
                return Err(e);
            }
        };

        let tls = load_tls_config(self.options.tls.as_ref(), &self.namespace)
            .await
            .map_err(|source| ListenerError::BindFailed {
                protocol: Protocol::Https,
                port: self.options.https_port,
                source,
            })?;

        Ok(ServerHandle {
            http,
            https,
            tls,
            handler: self.handler.clone(),
            grace: self.grace,
        })
    }
}

#[async_trait]
impl ApiServer for DualProtocolListener {
    async fn serve(&self, ctx: ExecutionContext) -> Result<(), ListenerError> {
        self.bind().await?.serve(&ctx).await
    }
}

async fn bind_socket(protocol: Protocol, addr: SocketAddr) -> Result<StdTcpListener, ListenerError> {
    let bind_failed = |source| ListenerError::BindFailed {
        protocol,
        port: addr.port(),
        source,
    };

    let listener = TcpListener::bind(addr).await.map_err(bind_failed)?;
    let local_addr = listener.local_addr().map_err(bind_failed)?;
    tracing::info!(%protocol, address = %local_addr, "Listener bound");

    // The std listener stays non-blocking, as axum-server requires.
    listener.into_std().map_err(bind_failed)
}

/// A bound pair of sockets sharing one handler.
///
/// Dropping an unserved handle closes both sockets.
pub struct ServerHandle {
    http: StdTcpListener,
    https: StdTcpListener,
    tls: RustlsConfig,
    handler: Router,
    grace: Duration,
}

impl ServerHandle {
    pub fn http_addr(&self) -> io::Result<SocketAddr> {
        self.http.local_addr()
    }

    pub fn https_addr(&self) -> io::Result<SocketAddr> {
        self.https.local_addr()
    }

    /// Serve until `ctx` is cancelled or either socket fails.
    ///
    /// In-flight requests get the grace period to finish. Returns once both
    /// sockets are closed; the first failure is reported.
    pub async fn serve(self, ctx: &ExecutionContext) -> Result<(), ListenerError> {
        let scope = ctx.child();
        let http_handle = Handle::new();
        let https_handle = Handle::new();

        let stopper = {
            let scope = scope.clone();
            let handles = [http_handle.clone(), https_handle.clone()];
            let grace = self.grace;
            tokio::spawn(async move {
                scope.cancelled().await;
                tracing::info!(grace = ?grace, "Stopping management listeners");
                for handle in handles {
                    handle.graceful_shutdown(Some(grace));
                }
            })
        };

        let http = axum_server::from_tcp(self.http)
            .handle(http_handle)
            .serve(self.handler.clone().into_make_service());
        let https = axum_server::from_tcp_rustls(self.https, self.tls)
            .handle(https_handle)
            .serve(self.handler.into_make_service());

        let (http, https) = tokio::join!(
            supervise(Protocol::Http, http, &scope),
            supervise(Protocol::Https, https, &scope),
        );

        stopper.abort();
        tracing::info!("Management listeners stopped");
        http.and(https)
    }
}

/// Run one protocol's server; cancel the sibling when it ends on its own.
async fn supervise<F>(protocol: Protocol, server: F, scope: &ExecutionContext) -> Result<(), ListenerError>
where
    F: std::future::Future<Output = io::Result<()>>,
{
    let result = server.await;
    let requested = scope.is_cancelled();
    scope.cancel();

    match result {
        Ok(()) if requested => Ok(()),
        Ok(()) => {
            tracing::error!(%protocol, "Listener stopped unexpectedly");
            Err(ListenerError::StoppedEarly)
        }
        Err(source) => {
            tracing::error!(%protocol, error = %source, "Listener failed");
            Err(ListenerError::Serve { protocol, source })
        }
    }
}

//! Shared helpers for integration tests: spy subsystems and option builders.
#![allow(dead_code)]

use std::future::{ready, Ready};
use std::net::TcpListener as StdTcpListener;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use harvester::controller::{ControllerError, ControllerRuntime};
use harvester::lifecycle::{ApiServer, Diagnostics, ExecutionContext, Subsystems};
use harvester::net::ListenerError;
use harvester::RawOptions;

/// Options that pass validation, bound to ephemeral loopback ports.
pub fn valid_options() -> RawOptions {
    RawOptions {
        namespace: Some("ns1".into()),
        image_storage_endpoint: Some("http://s3:9000".into()),
        image_storage_access_key: Some("a".into()),
        image_storage_secret_key: Some("b".into()),
        bind_address: Some("127.0.0.1".parse().unwrap()),
        http_port: Some(0),
        https_port: Some(0),
        threadiness: Some(10),
        shutdown_grace_secs: Some(2),
        ..Default::default()
    }
}

/// A port nothing listens on right now.
pub fn free_port() -> u16 {
    StdTcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// What a spy does once started.
#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    /// Run until cancelled, then take `linger` to wind down.
    UntilCancelled { linger: Duration },
    /// Fail after `after`.
    FailAfter(Duration),
    /// Return `Ok` right away.
    ReturnImmediately,
    /// Never return, even when cancelled.
    Hang,
}

impl Behavior {
    pub fn until_cancelled() -> Self {
        Behavior::UntilCancelled {
            linger: Duration::ZERO,
        }
    }
}

/// Records how the orchestrator drove a subsystem.
#[derive(Debug, Default)]
pub struct Recorder {
    pub invocations: AtomicUsize,
    pub saw_cancelled_at_start: AtomicBool,
    pub returned: AtomicBool,
    pub threadiness: AtomicUsize,
}

impl Recorder {
    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    pub fn saw_cancelled_at_start(&self) -> bool {
        self.saw_cancelled_at_start.load(Ordering::SeqCst)
    }

    pub fn returned(&self) -> bool {
        self.returned.load(Ordering::SeqCst)
    }

    fn enter(&self, ctx: &ExecutionContext) {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        self.saw_cancelled_at_start
            .store(ctx.is_cancelled(), Ordering::SeqCst);
    }
}

/// Runs `behavior`; `fail` builds the error for `FailAfter`.
async fn act<E>(behavior: Behavior, ctx: &ExecutionContext, recorder: &Recorder, fail: impl FnOnce() -> E) -> Result<(), E> {
    let result = match behavior {
        Behavior::UntilCancelled { linger } => {
            ctx.cancelled().await;
            tokio::time::sleep(linger).await;
            Ok(())
        }
        Behavior::FailAfter(after) => {
            tokio::time::sleep(after).await;
            Err(fail())
        }
        Behavior::ReturnImmediately => Ok(()),
        Behavior::Hang => std::future::pending().await,
    };
    recorder.returned.store(true, Ordering::SeqCst);
    result
}

pub struct SpyControllers {
    pub behavior: Behavior,
    pub recorder: Arc<Recorder>,
}

#[async_trait]
impl ControllerRuntime for SpyControllers {
    async fn run(&self, ctx: ExecutionContext, threadiness: NonZeroUsize) -> Result<(), ControllerError> {
        self.recorder.enter(&ctx);
        self.recorder
            .threadiness
            .store(threadiness.get(), Ordering::SeqCst);
        act(self.behavior, &ctx, &self.recorder, || ControllerError::Unrecoverable {
            controller: "spy".into(),
            key: "ns1/item".into(),
            reason: "injected".into(),
        })
        .await
    }
}

pub struct SpyServer {
    pub behavior: Behavior,
    pub recorder: Arc<Recorder>,
}

#[async_trait]
impl ApiServer for SpyServer {
    async fn serve(&self, ctx: ExecutionContext) -> Result<(), ListenerError> {
        self.recorder.enter(&ctx);
        act(self.behavior, &ctx, &self.recorder, || ListenerError::BindFailed {
            protocol: harvester::net::Protocol::Https,
            port: 8443,
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "injected"),
        })
        .await
    }
}

#[derive(Default)]
pub struct SpyDiagnostics {
    pub starts: AtomicUsize,
}

impl Diagnostics for SpyDiagnostics {
    fn start(&self, _ctx: &ExecutionContext) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }
}

/// A set of spies plus the recorders to inspect afterwards.
pub struct Spies {
    pub controllers: Arc<Recorder>,
    pub server: Arc<Recorder>,
    pub diagnostics: Arc<SpyDiagnostics>,
    pub builds: Arc<AtomicUsize>,
    subsystems: Subsystems,
}

impl Spies {
    pub fn new(controllers: Behavior, server: Behavior) -> Self {
        let controller_recorder = Arc::new(Recorder::default());
        let server_recorder = Arc::new(Recorder::default());
        let diagnostics = Arc::new(SpyDiagnostics::default());
        let subsystems = Subsystems {
            diagnostics: diagnostics.clone(),
            controllers: Arc::new(SpyControllers {
                behavior: controllers,
                recorder: controller_recorder.clone(),
            }),
            server: Arc::new(SpyServer {
                behavior: server,
                recorder: server_recorder.clone(),
            }),
        };
        Self {
            controllers: controller_recorder,
            server: server_recorder,
            diagnostics,
            builds: Arc::new(AtomicUsize::new(0)),
            subsystems,
        }
    }

    /// Factory for `ProcessOrchestrator::run` that hands out these spies.
    pub fn factory(
        &self,
    ) -> impl FnOnce(Arc<harvester::StartupOptions>) -> Ready<Result<Subsystems, harvester::HarvesterError>> {
        let subsystems = self.subsystems.clone();
        let builds = self.builds.clone();
        move |_options: Arc<harvester::StartupOptions>| {
            builds.fetch_add(1, Ordering::SeqCst);
            ready(Ok(subsystems))
        }
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

//! MicroStack server - a single-endpoint local AWS emulator.
//!
//! Hosts four services behind one HTTP endpoint, each speaking its native
//! wire dialect: Lambda (REST-JSON), CloudWatch Logs (JSON 1.1), S3
//! (REST-XML, path-style), and CloudFormation (Query/XML). State is
//! in-memory and ephemeral; function bundles are extracted to a scratch
//! tree under the data directory for the duration of each invocation.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `MICROSTACK_HOST` | `0.0.0.0` | Bind address |
//! | `MICROSTACK_PORT` | `1337` | Bind port (1-65535; invalid is fatal) |
//! | `MICROSTACK_DATA_DIR` | `/tmp/microstack` | Scratch directory root |
//! | `RUST_LOG` | `info` | Tracing filter |

mod service;
mod wiring;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use microstack_cfn::{ResourceAdapters, StackOrchestrator};
use microstack_core::MicroStackConfig;
use microstack_http::cfn::CfnService;
use microstack_http::lambda::LambdaService;
use microstack_http::logs::LogsService;
use microstack_http::s3::S3Service;
use microstack_lambda::{FunctionRegistry, FunctionRuntime};
use microstack_logs::LogStore;
use microstack_s3::ObjectStore;

use crate::service::{
    CfnRouter, GatewayService, LambdaRouter, LogsRouter, S3Router, ServiceRouter,
};
use crate::wiring::{BucketResources, FunctionResources, LedgerSink, LogGroupResources};

/// Server version reported at startup.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the tracing subscriber from `RUST_LOG`, defaulting to `info`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

/// Build the gateway with every service wired to shared state.
fn build_gateway(config: &MicroStackConfig) -> GatewayService {
    let logs = Arc::new(LogStore::new());
    let objects = Arc::new(ObjectStore::new());
    let registry = Arc::new(FunctionRegistry::new());
    let runtime = Arc::new(FunctionRuntime::new(
        Arc::clone(&registry),
        config.runtime_dir(),
        Arc::new(LedgerSink::new(Arc::clone(&logs))),
    ));

    let adapters = ResourceAdapters {
        functions: Arc::new(FunctionResources::new(Arc::clone(&registry))),
        log_groups: Arc::new(LogGroupResources::new(Arc::clone(&logs))),
        buckets: Arc::new(BucketResources::new(Arc::clone(&objects))),
    };
    let orchestrator = Arc::new(StackOrchestrator::new(adapters));

    // Routing order: the header- and content-type-keyed services first,
    // then the Lambda path prefix; S3 is the catch-all and goes last.
    let routers: Vec<Box<dyn ServiceRouter>> = vec![
        Box::new(LogsRouter(LogsService::new(Arc::clone(&logs)))),
        Box::new(CfnRouter(CfnService::new(orchestrator))),
        Box::new(LambdaRouter(LambdaService::new(registry, runtime))),
        Box::new(S3Router(S3Service::new(objects))),
    ];

    GatewayService::new(routers)
}

/// Run the accept loop, serving connections until ctrl-c.
async fn serve(listener: TcpListener, service: GatewayService) -> Result<()> {
    let graceful = hyper_util::server::graceful::GracefulShutdown::new();
    let http = HttpConnBuilder::new(TokioExecutor::new());

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal, draining connections");
    };

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer_addr) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };

                let svc = service.clone();
                let conn = http.serve_connection(TokioIo::new(stream), svc);
                let conn = graceful.watch(conn.into_owned());

                tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        error!(peer_addr = %peer_addr, error = %e, "connection error");
                    }
                });
            }

            () = &mut shutdown => {
                info!("shutting down gracefully");
                break;
            }
        }
    }

    // Wait for in-flight requests to complete.
    graceful.shutdown().await;
    info!("all connections drained, exiting");

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = MicroStackConfig::from_env().context("invalid configuration")?;

    std::fs::create_dir_all(config.runtime_dir()).with_context(|| {
        format!(
            "failed to create scratch directory {}",
            config.runtime_dir().display()
        )
    })?;

    let gateway = build_gateway(&config);
    let service_names = gateway.service_names();

    let addr: SocketAddr = config
        .listen_addr()
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.listen_addr()))?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(
        %addr,
        services = ?service_names,
        data_dir = %config.data_dir.display(),
        version = VERSION,
        "starting MicroStack server",
    );

    serve(listener, gateway).await
}

//! Startup, serving and graceful shutdown.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::{Protocol, RunnerArgs};
use crate::error::RunnerError;
use crate::lifecycle::Phase;
use crate::loader::EnsemblerLoader;
use crate::runtime::EnsemblerRuntime;
use crate::{grpc, http};

/// Load the ensembler, then serve until `shutdown` resolves.
///
/// With `--dry_run` the function returns right after a successful load,
/// without binding a port.
pub async fn run<S>(
    args: &RunnerArgs,
    loader: &dyn EnsemblerLoader,
    shutdown: S,
) -> Result<Arc<EnsemblerRuntime>, RunnerError>
where
    S: Future<Output = ()> + Send,
{
    let runtime = Arc::new(EnsemblerRuntime::new(args.pool_settings()));
    runtime.load(loader, &args.ensembler_uri).await?;
    if args.dry_run {
        info!(uri = %args.ensembler_uri, "Dry run: ensembler loaded, not serving");
        return Ok(runtime);
    }
    serve(Arc::clone(&runtime), args, shutdown).await?;
    Ok(runtime)
}

pub async fn serve<S>(
    runtime: Arc<EnsemblerRuntime>,
    args: &RunnerArgs,
    shutdown: S,
) -> Result<(), RunnerError>
where
    S: Future<Output = ()> + Send,
{
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let (stop, stopped) = oneshot::channel::<()>();
    let stop_signal = async move {
        let _ = stopped.await;
    };

    let server: JoinHandle<Result<(), RunnerError>> = match args.protocol {
        Protocol::Http => {
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .map_err(|source| RunnerError::Bind {
                    addr: addr.to_string(),
                    source,
                })?;
            let app = http::router(Arc::clone(&runtime), args.request_timeout());
            let server = axum::serve(listener, app).with_graceful_shutdown(stop_signal);
            tokio::spawn(async move { server.await.map_err(RunnerError::Http) })
        }
        Protocol::Grpc => {
            let server = tonic::transport::Server::builder()
                .timeout(args.request_timeout())
                .add_service(grpc::service(Arc::clone(&runtime)))
                .serve_with_shutdown(addr, stop_signal);
            tokio::spawn(async move { server.await.map_err(RunnerError::Grpc) })
        }
    };
    runtime.lifecycle().advance(Phase::Serving);
    info!(%addr, protocol = ?args.protocol, "Ensembler runner serving");

    drain_on_shutdown(server, stop, shutdown, args.shutdown_grace()).await?;
    runtime.lifecycle().advance(Phase::Stopping);
    runtime.lifecycle().advance(Phase::Stopped);
    Ok(())
}

async fn drain_on_shutdown<S>(
    mut server: JoinHandle<Result<(), RunnerError>>,
    stop: oneshot::Sender<()>,
    shutdown: S,
    grace: Duration,
) -> Result<(), RunnerError>
where
    S: Future<Output = ()> + Send,
{
    tokio::select! {
        joined = &mut server => return flatten_join(joined),
        () = shutdown => {}
    }
    info!(grace_secs = grace.as_secs(), "Shutdown requested; draining in-flight requests");
    let _ = stop.send(());
    match tokio::time::timeout(grace, &mut server).await {
        Ok(joined) => flatten_join(joined),
        Err(_) => {
            warn!("Shutdown grace period elapsed; dropping remaining requests");
            server.abort();
            Ok(())
        }
    }
}

fn flatten_join(
    joined: Result<Result<(), RunnerError>, tokio::task::JoinError>,
) -> Result<(), RunnerError> {
    joined.map_err(|err| RunnerError::Http(std::io::Error::other(err)))?
}

/// Resolves on SIGINT or, on unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

//! Startup facade, accept loop and graceful shutdown.
//!
//! [`Server`] owns the startup pipeline. [`Server::init`] runs it against a
//! fresh [`App`] and hands the assembled app back; nothing listens until the
//! caller decides to [`App::listen`].
//!
//! # Graceful shutdown
//!
//! On SIGTERM or Ctrl-C the accept loop stops taking new connections, lets
//! every in-flight connection finish, then returns.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{Instrument, error, info, info_span, warn};

use crate::app::App;
use crate::config::Config;
use crate::error::Error;
use crate::pipeline::{Assembler, default_steps};
use crate::readiness::Readiness;
use crate::request::Request;
use crate::response::Response;
use crate::schema::Controllers;

/// Creates and configures the app.
pub struct Server {
    steps: Assembler,
}

impl Server {
    pub fn new(steps: Assembler) -> Self {
        Self { steps }
    }

    /// A server running [`default_steps`].
    pub fn with_defaults(config: &Config, controllers: Controllers) -> Self {
        Self::new(default_steps(config, controllers))
    }

    /// Runs every startup step against a new app.
    ///
    /// Resolves with the configured app, or with the first step failure.
    /// A failure is logged here before it is returned.
    pub async fn init(&self) -> Result<App, Error> {
        let mut app = App::new();
        match self.steps.assemble(&mut app).await {
            Ok(()) => {
                info!(layers = ?app.layers(), "server initialized");
                Ok(app)
            }
            Err(e) => {
                error!(error = %e, "server initialization failed");
                Err(e)
            }
        }
    }

    /// Waits for `readiness`, then [`init`](Server::init)s.
    pub async fn boot(&self, readiness: &dyn Readiness) -> Result<App, Error> {
        if let Err(e) = readiness.wait_for_init().await {
            error!(error = %e, "dependencies never became ready");
            return Err(e);
        }
        self.init().await
    }
}

impl App {
    /// Binds `addr` and serves until SIGTERM or Ctrl-C.
    pub async fn listen(self, addr: SocketAddr) -> Result<(), Error> {
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Accepts connections on `listener` until `shutdown` resolves, then
    /// drains in-flight connections.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        let app = Arc::new(self);
        let local = listener.local_addr()?;
        info!(addr = %local, "listening");

        let mut tasks = tokio::task::JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, peer) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let app = Arc::clone(&app);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        let svc = service_fn(move |req| {
                            let app = Arc::clone(&app);
                            async move { dispatch(app, req, peer).await }
                        });

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            warn!(%peer, "connection error: {e}");
                        }
                    });
                }

                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("server stopped");
        Ok(())
    }
}

/// Collects one request and runs it through the app.
async fn dispatch(
    app: Arc<App>,
    req: hyper::Request<Incoming>,
    peer: SocketAddr,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let raw_body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(%peer, "failed to read request body: {e}");
            return Ok(Response::status(StatusCode::BAD_REQUEST).into_inner());
        }
    };

    let request = Request::from_parts(parts, raw_body);
    let span = info_span!(
        "request",
        request_id = %request.request_id(),
        method = %request.method(),
        path = %request.path(),
        %peer,
    );
    let response = app.handle(request).instrument(span).await;
    Ok(response.into_inner())
}

/// Resolves on the first SIGTERM or Ctrl-C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = sigterm => {}
    }
}

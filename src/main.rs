use std::process::ExitCode;
use std::sync::Arc;

use swivel::schema::Controllers;
use swivel::{AlwaysReady, Config, Failure, Readiness, Request, Server, TcpProbe, health};
use tracing::{error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "startup failed");
            eprintln!("swivel: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), swivel::Error> {
    let config = Config::from_env()?;
    swivel::logging::init(&config)?;
    info!(spec = %config.spec_path, docs = %config.docs_path, "starting");

    let readiness: Box<dyn Readiness> = match config.db_addr() {
        Some(addr) => Box::new(TcpProbe::new(addr, config.ready_timeout)),
        None => Box::new(AlwaysReady),
    };

    let controllers = health::register(Controllers::new()).register("ping", ping);
    let app = Server::with_defaults(&config, controllers)
        .boot(readiness.as_ref())
        .await?;

    app.listen(config.addr()?).await
}

async fn ping(_req: Arc<Request>) -> Result<&'static str, Failure> {
    Ok("pong")
}

//! Readiness of external dependencies.
//!
//! The server assembles its pipeline only after its dependencies report
//! ready. The pipeline itself never looks inside a dependency; it only
//! awaits [`Readiness::wait_for_init`].

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::middleware::BoxFuture;

/// A dependency the server waits for before assembling.
pub trait Readiness: Send + Sync {
    fn wait_for_init(&self) -> BoxFuture<'_, Result<(), Error>>;
}

/// For services with nothing to wait for.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysReady;

impl Readiness for AlwaysReady {
    fn wait_for_init(&self) -> BoxFuture<'_, Result<(), Error>> {
        Box::pin(async { Ok(()) })
    }
}

/// Waits until a TCP endpoint (typically the database) accepts connections.
///
/// Retries with doubling backoff, capped at 2 s per attempt, until `timeout`
/// has elapsed.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    addr: String,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self { addr: addr.into(), timeout }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    async fn probe(&self) -> Result<(), Error> {
        let deadline = Instant::now() + self.timeout;
        let mut backoff = Duration::from_millis(50);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match TcpStream::connect(self.addr.as_str()).await {
                Ok(stream) => {
                    let peer: Option<SocketAddr> = stream.peer_addr().ok();
                    info!(addr = %self.addr, ?peer, attempt, "dependency ready");
                    return Ok(());
                }
                Err(e) if Instant::now() + backoff < deadline => {
                    debug!(addr = %self.addr, attempt, error = %e, "dependency not ready, retrying");
                    sleep(backoff).await;
                    backoff = (backoff * 2).min(Duration::from_secs(2));
                }
                Err(e) => {
                    warn!(addr = %self.addr, attempt, error = %e, "dependency never became ready");
                    return Err(Error::NotReady(format!("{}: {e}", self.addr)));
                }
            }
        }
    }
}

impl Readiness for TcpProbe {
    fn wait_for_init(&self) -> BoxFuture<'_, Result<(), Error>> {
        Box::pin(self.probe())
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;

    #[tokio::test]
    async fn probe_succeeds_against_a_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        TcpProbe::new(addr, Duration::from_secs(1)).wait_for_init().await.unwrap();
    }

    #[tokio::test]
    async fn probe_gives_up_after_the_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = TcpProbe::new(addr, Duration::from_millis(200)).wait_for_init().await.unwrap_err();
        assert!(matches!(err, Error::NotReady(_)));
    }

    #[tokio::test]
    async fn always_ready_is_ready() {
        AlwaysReady.wait_for_init().await.unwrap();
    }
}

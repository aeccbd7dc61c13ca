use anyhow::{Result, anyhow};
use std::time::{Duration, Instant};
use tokio::time::timeout;

/// Performs one reachability probe against an endpoint
#[async_trait::async_trait]
pub trait Checker: Send + Sync {
    /// Probe `address:port` and return the connect latency.
    ///
    /// Any error means the endpoint is considered down.
    async fn check(&self, address: &str, port: u16) -> Result<Duration>;
}

/// TCP connect checker
pub struct TcpChecker {
    timeout_duration: Duration,
}

impl TcpChecker {
    pub fn new(timeout_duration: Duration) -> Self {
        Self { timeout_duration }
    }
}

#[async_trait::async_trait]
impl Checker for TcpChecker {
    async fn check(&self, address: &str, port: u16) -> Result<Duration> {
        let start = Instant::now();

        let connect = tokio::net::TcpStream::connect((address, port));

        let stream = timeout(self.timeout_duration, connect)
            .await
            .map_err(|_| anyhow!("TCP connection timeout after {:?}", self.timeout_duration))?
            .map_err(|e| anyhow!("TCP connection failed: {}", e))?;
        drop(stream);

        Ok(start.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_tcp_check_open_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let checker = TcpChecker::new(Duration::from_secs(2));
        assert!(checker.check("127.0.0.1", port).await.is_ok());
    }

    #[tokio::test]
    async fn test_tcp_check_closed_port() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let checker = TcpChecker::new(Duration::from_secs(2));
        assert!(checker.check("127.0.0.1", port).await.is_err());
    }
}

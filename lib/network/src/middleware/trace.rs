use super::Middleware;
use crate::server::tcp::{ConnectionId, ConnectionInfo};
use async_trait::async_trait;
use common::util::time::{elapsed_duration_since, format_duration, now_as_u64};
use dashmap::DashMap;
use driver::{DriverError, ExecutionResult};
use tracing::{info, warn};

/// Logs connection establishment and termination, and every statement with
/// the time it took to execute.
///
/// Request start times are kept per connection so concurrent clients do not
/// clobber each other's timings.
#[derive(Debug, Default)]
pub struct LoggingMiddleware {
    request_start_times: DashMap<ConnectionId, u64>,
}

impl LoggingMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of requests currently being timed.
    pub fn pending_requests(&self) -> usize {
        self.request_start_times.len()
    }
}

#[async_trait]
impl Middleware for LoggingMiddleware {
    #[inline]
    fn name(&self) -> String {
        "LoggingMiddleware".to_string()
    }

    #[inline]
    async fn on_connect(&self, connection: &ConnectionInfo) -> anyhow::Result<()> {
        info!(
            connection_id = %connection.id(),
            "Connection established with {}",
            connection.peer()
        );
        Ok(())
    }

    #[inline]
    async fn before_request(
        &self,
        connection: &ConnectionInfo,
        statement: &str,
    ) -> anyhow::Result<()> {
        self.request_start_times
            .insert(connection.id().clone(), now_as_u64());
        info!(
            connection_id = %connection.id(),
            "Handling statement from {}: {}",
            connection.peer(),
            statement
        );
        Ok(())
    }

    #[inline]
    async fn after_request(
        &self,
        connection: &ConnectionInfo,
        outcome: &Result<ExecutionResult, DriverError>,
    ) -> anyhow::Result<()> {
        let elapsed = self
            .request_start_times
            .remove(connection.id())
            .map(|(_, start)| format_duration(elapsed_duration_since(start)))
            .unwrap_or_else(|| "unknown".to_string());

        match outcome {
            Ok(_) => info!(
                connection_id = %connection.id(),
                "Statement handled for {} (took {})",
                connection.peer(),
                elapsed
            ),
            Err(err) => warn!(
                connection_id = %connection.id(),
                kind = err.kind(),
                "Statement failed for {} (took {}): {}",
                connection.peer(),
                elapsed,
                err
            ),
        }
        Ok(())
    }

    #[inline]
    async fn on_disconnect(&self, connection: &ConnectionInfo) -> anyhow::Result<()> {
        self.request_start_times.remove(connection.id());
        warn!(
            connection_id = %connection.id(),
            "Connection terminated with {} (lifespan: {})",
            connection.peer(),
            format_duration(elapsed_duration_since(*connection.connected_at()))
        );
        Ok(())
    }
}

use crate::server::tcp::ConnectionInfo;
use anyhow::Result;
use async_trait::async_trait;
use core::fmt;
use driver::{DriverError, ExecutionResult};
use getset::{Getters, Setters};
use std::sync::Arc;
use std::time::Instant;
use tracing::trace;
use typed_builder::TypedBuilder;

pub mod trace;

/// Hooks run by the server around the lifecycle of every client connection.
///
/// Middlewares run in the order they were added to the [`MiddlewareStack`].
/// An error returned from any hook terminates the connection.
#[async_trait]
pub trait Middleware: Send + Sync {
    fn name(&self) -> String;

    /// Called once the connection is accepted and registered.
    async fn on_connect(&self, connection: &ConnectionInfo) -> Result<()>;

    /// Called with the raw statement line before it is executed.
    async fn before_request(&self, connection: &ConnectionInfo, statement: &str) -> Result<()>;

    /// Called with the outcome of the statement, before the response is written.
    async fn after_request(
        &self,
        connection: &ConnectionInfo,
        outcome: &Result<ExecutionResult, DriverError>,
    ) -> Result<()>;

    /// Called when the peer closed the connection or the handler gave up on it.
    async fn on_disconnect(&self, connection: &ConnectionInfo) -> Result<()>;
}

/// A reference-counted reference to a [`MiddlewareStack`].
pub type MiddlewareStackRef = Arc<MiddlewareStack>;

#[derive(Default, Getters, Setters, TypedBuilder)]
#[getset(get = "pub", set = "pub")]
pub struct MiddlewareStack {
    middlewares: Vec<Box<dyn Middleware>>,
}

impl MiddlewareStack {
    pub fn new() -> Self {
        Self {
            middlewares: Vec::new(),
        }
    }

    pub fn add_middleware<M: Middleware + 'static>(&mut self, middleware: M) {
        let start = Instant::now();
        let name = middleware.name();
        self.middlewares.push(Box::new(middleware));
        trace!(
            "Added middleware {} to middleware stack in {:?}",
            name,
            start.elapsed()
        );
    }

    pub async fn handle_connect(&self, connection: &ConnectionInfo) -> Result<()> {
        for middleware in &self.middlewares {
            middleware.on_connect(connection).await?;
        }
        Ok(())
    }

    pub async fn handle_before_request(
        &self,
        connection: &ConnectionInfo,
        statement: &str,
    ) -> Result<()> {
        for middleware in &self.middlewares {
            middleware.before_request(connection, statement).await?;
        }
        Ok(())
    }

    pub async fn handle_after_request(
        &self,
        connection: &ConnectionInfo,
        outcome: &Result<ExecutionResult, DriverError>,
    ) -> Result<()> {
        for middleware in &self.middlewares {
            middleware.after_request(connection, outcome).await?;
        }
        Ok(())
    }

    pub async fn handle_disconnect(&self, connection: &ConnectionInfo) -> Result<()> {
        for middleware in &self.middlewares {
            middleware.on_disconnect(connection).await?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }
}

impl fmt::Debug for MiddlewareStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareStack")
            .field("middlewares", &self.middlewares.len())
            .finish()
    }
}

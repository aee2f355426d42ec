use super::handler::ConnectionHandler;
use crate::middleware::trace::LoggingMiddleware;
use crate::middleware::{MiddlewareStack, MiddlewareStackRef};
use common::util::time::now_as_u64;
use common::DbConfig;
use dashmap::DashMap;
use driver::DriverRef;
use getset::Getters;
use rustc_hash::FxHasher;
use std::env;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, instrument, warn};
use typed_builder::TypedBuilder;

/// Unique identifier for each connection
pub type ConnectionId = String;

/// A reference-counted [`Semaphore`] handle that can be shared across threads.
pub type SemaphoreRef = Arc<Semaphore>;

const DEFAULT_MAX_PORT_RETRIES: u16 = 5;
const DEFAULT_PORT_RETRY_INTERVAL_MS: u64 = 500;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("cannot resolve server address `{0}`")]
    InvalidAddress(String),
    #[error("no free port after {attempts} attempts (last tried {port})")]
    PortUnavailable { port: u16, attempts: u16 },
    #[error("connection pool was closed")]
    ConnectionPoolClosed,
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// What the server knows about a live client connection.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
#[getset(get = "pub")]
pub struct ConnectionInfo {
    id: ConnectionId,
    peer: SocketAddr,
    /// Nanoseconds since the UNIX epoch.
    connected_at: u64,
}

impl ConnectionInfo {
    pub fn new(peer: SocketAddr) -> Self {
        Self {
            id: generate_connection_id(&peer),
            peer,
            connected_at: now_as_u64(),
        }
    }
}

/// Line-oriented statement server.
///
/// Each accepted connection is served by its own task; statements are run on
/// the blocking pool against the shared [`Driver`](driver::Driver). The number
/// of concurrent connections is capped by `conn_pool`; clients beyond the cap
/// wait in the accept queue until a permit is released.
#[derive(Debug, TypedBuilder)]
pub struct DbServer {
    server_address: SocketAddr,
    driver: DriverRef,
    middleware_stack: MiddlewareStackRef,
    #[builder(default = Arc::new(DashMap::new()))]
    connections: Arc<DashMap<ConnectionId, ConnectionInfo>>,
    conn_pool: SemaphoreRef,
    #[builder(default = DEFAULT_MAX_PORT_RETRIES)]
    max_port_retries: u16,
    #[builder(default = Duration::from_millis(DEFAULT_PORT_RETRY_INTERVAL_MS))]
    retry_interval: Duration,
}

impl DbServer {
    /// Creates a server for `config` with the logging middleware installed.
    ///
    /// `MAX_PORT_RETRIES` and `PORT_RETRY_INTERVAL_MS` in the environment tune
    /// how long [`DbServer::bind`] keeps walking ports.
    pub fn new(config: &DbConfig, driver: DriverRef) -> Result<Self, ServerError> {
        let address = config.server_address();
        let server_address = address
            .to_socket_addrs()
            .map_err(|_| ServerError::InvalidAddress(address.clone()))?
            .next()
            .ok_or_else(|| ServerError::InvalidAddress(address.clone()))?;

        let mut middleware_stack = MiddlewareStack::new();
        middleware_stack.add_middleware(LoggingMiddleware::new());

        let max_port_retries = env::var("MAX_PORT_RETRIES")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(DEFAULT_MAX_PORT_RETRIES);
        let retry_interval = env::var("PORT_RETRY_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_PORT_RETRY_INTERVAL_MS);

        Ok(DbServer::builder()
            .server_address(server_address)
            .driver(driver)
            .middleware_stack(Arc::new(middleware_stack))
            .conn_pool(Arc::new(Semaphore::new(*config.max_connections())))
            .max_port_retries(max_port_retries)
            .retry_interval(Duration::from_millis(retry_interval))
            .build())
    }

    pub fn active_connections(&self) -> usize {
        self.connections.len()
    }

    /// Binds the listener, walking up from the configured port when it is taken.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        let mut current_port = self.server_address.port();
        let mut attempt = 0;

        loop {
            let address = SocketAddr::new(self.server_address.ip(), current_port);
            match TcpListener::bind(&address).await {
                Ok(listener) => {
                    info!("Server successfully running on {}", listener.local_addr()?);
                    return Ok(listener);
                }
                Err(e) => {
                    if attempt >= self.max_port_retries {
                        error!("Reached maximum retry attempts. Unable to start server.");
                        return Err(ServerError::PortUnavailable {
                            port: current_port,
                            attempts: attempt + 1,
                        });
                    }
                    warn!(
                        "Failed to bind to port {}: {}. Retrying in {:?}",
                        current_port, e, self.retry_interval
                    );
                    current_port = current_port.wrapping_add(1);
                    attempt += 1;
                    tokio::time::sleep(self.retry_interval).await;
                }
            }
        }
    }

    /// Accept incoming connections and spawn a new connection handler
    /// for each one.
    pub async fn accept_connections(&self, listener: TcpListener) -> Result<(), ServerError> {
        loop {
            let permit = self
                .conn_pool
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| ServerError::ConnectionPoolClosed)?;

            let (socket, addr) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    continue;
                }
            };

            let connection = ConnectionInfo::new(addr);
            self.connections
                .insert(connection.id().clone(), connection.clone());
            debug!("Currently active connections: {}", self.connections.len());

            let handler = ConnectionHandler::builder()
                .stream(socket)
                .connection(connection.clone())
                .driver(self.driver.clone())
                .middleware_stack(self.middleware_stack.clone())
                .build();
            let connections = self.connections.clone();
            let conn_pool = self.conn_pool.clone();

            tokio::spawn(async move {
                if let Err(e) = handler.handle_connection().await {
                    error!("Error handling connection: {:?}", e);
                }

                connections.remove(connection.id());
                drop(permit);
                debug!(
                    "Released connection for {}; permits available: {}",
                    addr,
                    conn_pool.available_permits()
                );
            });
        }
    }

    /// Serves `listener` until `shutdown` resolves.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            result = self.accept_connections(listener) => result,
            _ = shutdown => {
                info!(
                    "Shutdown signal received, terminating server ({} open connections)",
                    self.connections.len()
                );
                Ok(())
            }
        }
    }

    /// Binds and serves until Ctrl-C.
    #[instrument(skip(self), fields(address = %self.server_address))]
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.serve(listener, async {
            if let Err(e) = signal::ctrl_c().await {
                error!("Unable to listen for the shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }
}

pub fn generate_connection_id(addr: &SocketAddr) -> ConnectionId {
    // Generate a unique connection ID based on the client's address
    let mut hasher = FxHasher::default();
    format!("{}:{}", addr.ip(), addr.port()).hash(&mut hasher);
    hasher.finish().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions_sorted::assert_eq;

    #[test]
    fn test_connection_ids_follow_the_peer() {
        let a = SocketAddr::from(([127, 0, 0, 1], 5000));
        let b = SocketAddr::from(([127, 0, 0, 1], 5001));

        assert_eq!(generate_connection_id(&a), generate_connection_id(&a));
        assert!(generate_connection_id(&a) != generate_connection_id(&b));
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let config = DbConfig::builder()
            .host("127.0.0.1".to_string())
            .port(0)
            .max_connections(2)
            .build();
        let server =
            DbServer::new(&config, Arc::new(driver::Driver::in_memory().unwrap())).unwrap();

        let listener = server.bind().await.unwrap();
        assert!(listener.local_addr().unwrap().port() != 0);
        assert_eq!(server.conn_pool.available_permits(), 2);
        assert_eq!(server.active_connections(), 0);
    }

    #[tokio::test]
    async fn test_bind_walks_to_the_next_port() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();
        let config = DbConfig::builder()
            .host("127.0.0.1".to_string())
            .port(port)
            .build();
        let mut server = DbServer::new(&config, Arc::new(driver::Driver::in_memory().unwrap()))
            .unwrap();
        server.retry_interval = Duration::from_millis(1);

        match server.bind().await {
            Ok(listener) => assert!(listener.local_addr().unwrap().port() != port),
            // every following port may be taken on a busy machine
            Err(ServerError::PortUnavailable { attempts, .. }) => {
                assert_eq!(attempts, server.max_port_retries + 1)
            }
            Err(e) => panic!("unexpected error: {}", e),
        }
    }
}

//! TCP server speaking the MongoDB wire protocol
//!
//! The accept loop spawns one [`Connection`] task per client into a
//! `JoinSet`. When the [`ShutdownCoordinator`] fires, the loop stops
//! accepting and drains the set.

mod connection;
mod shutdown;

pub use connection::{Connection, ConnectionOutcome, ConnectionReport, ConnectionState, Step};
pub use shutdown::{wait_for_signal, ShutdownCoordinator, ShutdownReport};

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use micromongo_common::config::ServerConfig;
use micromongo_common::error::{NetworkError, Result};
use micromongo_common::metrics;

use crate::bson::{ObjectId, ObjectIdGenerator};

/// MongoDB wire protocol server
pub struct MongoServer {
    listener: TcpListener,
    read_buffer_size: usize,
    object_ids: ObjectIdGenerator,
    instance_id: ObjectId,
}

impl MongoServer {
    /// Bind the listener. Fails if the address is unavailable.
    pub async fn bind(config: &ServerConfig) -> Result<Self> {
        let addr = config.bind_address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| NetworkError::BindFailed {
                addr: addr.clone(),
                source,
            })?;

        let object_ids = ObjectIdGenerator::new();
        let instance_id = object_ids.generate();
        info!(address = %addr, instance = %instance_id, "MongoDB wire server listening");

        Ok(Self {
            listener,
            read_buffer_size: config.read_buffer_size.max(1),
            object_ids,
            instance_id,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Process-wide ObjectId source
    pub fn object_ids(&self) -> &ObjectIdGenerator {
        &self.object_ids
    }

    pub fn instance_id(&self) -> ObjectId {
        self.instance_id
    }

    /// Accept connections until `shutdown` fires, then drain them.
    pub async fn run(self, shutdown: ShutdownCoordinator) -> Result<ShutdownReport> {
        let mut connections: JoinSet<Result<ConnectionReport>> = JoinSet::new();

        loop {
            tokio::select! {
                () = shutdown.triggered() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        info!("Accepted connection from {}", peer);
                        metrics::record_connection_opened();

                        let conn = Connection::new(stream, peer, self.read_buffer_size, shutdown.child_token());
                        connections.spawn(async move {
                            let result = conn.run().await;
                            metrics::record_connection_closed();
                            result
                        });
                    }
                    Err(e) => warn!(error = %e, "Failed to accept connection"),
                },
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    log_finished(joined);
                }
            }
        }

        debug!(open = connections.len(), "Accept loop stopped");
        drop(self.listener);
        Ok(shutdown.drain(connections).await)
    }
}

fn log_finished(joined: std::result::Result<Result<ConnectionReport>, JoinError>) {
    match joined {
        Ok(Ok(report)) => debug!(
            peer = %report.peer,
            messages = report.messages,
            bytes = report.bytes,
            "Connection finished"
        ),
        Ok(Err(e)) => warn!(error = %e, "Connection error"),
        Err(e) => error!(error = %e, "Connection task failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use micromongo_common::Error;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    fn ephemeral() -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_bind_reports_address_in_use() {
        let first = MongoServer::bind(&ephemeral()).await.unwrap();
        let taken = ServerConfig {
            port: first.local_addr().unwrap().port(),
            ..ephemeral()
        };

        match MongoServer::bind(&taken).await {
            Err(Error::Network(NetworkError::BindFailed { addr, .. })) => {
                assert_eq!(addr, taken.bind_address());
            }
            other => panic!("expected bind failure, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_echo_and_shutdown() {
        let server = MongoServer::bind(&ephemeral()).await.unwrap();
        let addr = server.local_addr().unwrap();
        let shutdown = ShutdownCoordinator::new();
        let handle = tokio::spawn(server.run(shutdown.clone()));

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"not a mongo message").await.unwrap();
        let mut echoed = [0u8; 19];
        client.read_exact(&mut echoed).await.unwrap();
        assert_eq!(&echoed, b"not a mongo message");

        shutdown.trigger("SIGTERM");
        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.cancelled, 1);

        let mut rest = Vec::new();
        assert_eq!(client.read_to_end(&mut rest).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_instance_ids_share_process_salt() {
        let server = MongoServer::bind(&ephemeral()).await.unwrap();
        let next = server.object_ids().generate();
        assert_eq!(next.random_value(), server.instance_id().random_value());
    }
}

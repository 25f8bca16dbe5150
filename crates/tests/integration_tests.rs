//! Integration tests for micromongo
//!
//! Each test binds a server on an ephemeral port and talks to it over TCP.

use std::net::SocketAddr;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use micromongo_common::config::ServerConfig;
use micromongo_common::error::Result;
use micromongo_protocol::bson::{Array, Document, ObjectIdGenerator, Value};
use micromongo_protocol::server::ShutdownReport;
use micromongo_protocol::wire::{MessageHeader, OpCode, OpQueryMessage};
use micromongo_protocol::{MongoServer, ShutdownCoordinator};

const IO_TIMEOUT: Duration = Duration::from_secs(5);

/// A running server plus the handle needed to stop it
struct TestServer {
    addr: SocketAddr,
    shutdown: ShutdownCoordinator,
    handle: JoinHandle<Result<ShutdownReport>>,
}

impl TestServer {
    async fn start() -> Self {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            read_buffer_size: 4096,
        };
        let server = MongoServer::bind(&config).await.expect("Failed to bind server");
        let addr = server.local_addr().expect("Failed to read local address");
        let shutdown = ShutdownCoordinator::new();
        let handle = tokio::spawn(server.run(shutdown.clone()));

        Self { addr, shutdown, handle }
    }

    async fn connect(&self) -> TcpStream {
        TcpStream::connect(self.addr).await.expect("Failed to connect")
    }

    async fn stop(self, reason: &str) -> ShutdownReport {
        self.shutdown.trigger(reason);
        timeout(IO_TIMEOUT, self.handle)
            .await
            .expect("Shutdown timed out")
            .expect("Server task panicked")
            .expect("Server returned error")
    }
}

/// Send `msg` and return exactly `msg.len()` echoed bytes
async fn exchange(client: &mut TcpStream, msg: &[u8]) -> Vec<u8> {
    client.write_all(msg).await.unwrap();
    let mut echoed = vec![0u8; msg.len()];
    timeout(IO_TIMEOUT, client.read_exact(&mut echoed))
        .await
        .expect("Echo timed out")
        .unwrap();
    echoed
}

fn header_only(op_code: i32, request_id: i32) -> Vec<u8> {
    let mut buf = BytesMut::new();
    MessageHeader {
        message_length: 16,
        request_id,
        response_to: 0,
        op_code,
    }
    .encode(&mut buf);
    buf.to_vec()
}

// ============================================================================
// Echo Tests
// ============================================================================

#[tokio::test]
async fn test_op_query_is_echoed_unchanged() {
    let server = TestServer::start().await;
    let mut client = server.connect().await;

    let ids = ObjectIdGenerator::new();
    let query = Document::new()
        .with("isMaster", 1)
        .with("_id", ids.generate())
        .with("client", Document::new().with("driver", "integration"))
        .with("tags", Array::from(vec![Value::from("a"), Value::Null]));
    let msg = OpQueryMessage::new(7, "admin.$cmd", query).encode().unwrap();

    assert_eq!(exchange(&mut client, &msg).await, msg.to_vec());
    server.stop("SIGTERM").await;
}

#[tokio::test]
async fn test_sequential_messages_echo_in_order() {
    let server = TestServer::start().await;
    let mut client = server.connect().await;

    for request_id in 1..=5 {
        let msg = OpQueryMessage::new(request_id, "db.coll", Document::new().with("n", request_id))
            .encode()
            .unwrap();
        assert_eq!(exchange(&mut client, &msg).await, msg.to_vec());
    }

    server.stop("SIGINT").await;
}

#[tokio::test]
async fn test_unknown_opcode_keeps_connection_open() {
    let server = TestServer::start().await;
    let mut client = server.connect().await;

    let unknown = header_only(2002, 1);
    assert_eq!(exchange(&mut client, &unknown).await, unknown);

    let op_msg = header_only(OpCode::OpMsg as i32, 2);
    assert_eq!(exchange(&mut client, &op_msg).await, op_msg);

    server.stop("SIGTERM").await;
}

#[tokio::test]
async fn test_garbage_is_echoed() {
    let server = TestServer::start().await;
    let mut client = server.connect().await;

    assert_eq!(exchange(&mut client, b"hello").await, b"hello");
    server.stop("SIGTERM").await;
}

#[tokio::test]
async fn test_unsupported_element_type_is_echoed() {
    let server = TestServer::start().await;
    let mut client = server.connect().await;

    let mut msg = OpQueryMessage::new(3, "db.coll", Document::new().with("a", 1))
        .encode()
        .unwrap()
        .to_vec();
    // header(16) flags(4) "db.coll\0"(8) skip(4) return(4) doc length(4)
    assert_eq!(msg[40], 0x10);
    msg[40] = 0x0B;

    assert_eq!(exchange(&mut client, &msg).await, msg);
    server.stop("SIGTERM").await;
}

// ============================================================================
// Lifecycle Tests
// ============================================================================

#[tokio::test]
async fn test_peer_close_does_not_affect_others() {
    let server = TestServer::start().await;
    let mut first = server.connect().await;
    let mut second = server.connect().await;

    assert_eq!(exchange(&mut first, b"one").await, b"one");
    drop(first);

    assert_eq!(exchange(&mut second, b"two").await, b"two");
    let report = server.stop("SIGTERM").await;
    // the first connection may or may not have been reaped before shutdown
    assert!(report.cancelled >= 1);
    assert_eq!(report.failed, 0);
}

#[tokio::test]
async fn test_shutdown_cancels_every_connection() {
    let server = TestServer::start().await;

    let mut clients = Vec::new();
    for i in 0..4u8 {
        let mut client = server.connect().await;
        // a round trip proves the connection task is running
        assert_eq!(exchange(&mut client, &[i]).await, vec![i]);
        clients.push(client);
    }

    let report = server.stop("SIGHUP").await;
    assert_eq!(report.cancelled, 4);
    assert_eq!(report.failed, 0);

    for mut client in clients {
        let mut rest = Vec::new();
        let n = timeout(IO_TIMEOUT, client.read_to_end(&mut rest))
            .await
            .expect("Close timed out")
            .unwrap();
        assert_eq!(n, 0);
    }
}

#[tokio::test]
async fn test_shutdown_stops_accepting() {
    let server = TestServer::start().await;
    let addr = server.addr;

    let report = server.stop("SIGTERM").await;
    assert_eq!(report.total(), 0);

    assert!(TcpStream::connect(addr).await.is_err());
}

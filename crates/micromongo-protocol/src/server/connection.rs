//! Per-connection read / dispatch / echo loop
//!
//! Whatever a single read returns is treated as one message. That is only
//! right when the peer sends one message per write and waits for the answer,
//! which is how legacy drivers talk during the handshake.

use std::net::SocketAddr;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use micromongo_common::error::Result;
use micromongo_common::metrics;

use crate::wire::{dispatch, Dispatch};

/// Where a connection is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    AwaitingData,
    HeaderDecoded,
    Dispatched,
    Closed,
    Cancelled,
}

/// How a connection ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionOutcome {
    /// The peer closed its side
    Closed,
    /// Shutdown was requested while the connection was open
    Cancelled,
}

/// Summary returned when a connection ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionReport {
    pub peer: SocketAddr,
    pub outcome: ConnectionOutcome,
    pub messages: u64,
    pub bytes: u64,
}

/// Result of one pass through the loop
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Dispatched(Dispatch),
    Closed,
    Cancelled,
}

/// One client connection
pub struct Connection<S> {
    stream: S,
    peer: SocketAddr,
    buffer: BytesMut,
    read_buffer_size: usize,
    cancel: CancellationToken,
    state: ConnectionState,
    messages: u64,
    bytes: u64,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, peer: SocketAddr, read_buffer_size: usize, cancel: CancellationToken) -> Self {
        Self {
            stream,
            peer,
            buffer: BytesMut::with_capacity(read_buffer_size),
            read_buffer_size,
            cancel,
            state: ConnectionState::AwaitingData,
            messages: 0,
            bytes: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Read once, dispatch what arrived, write it back.
    ///
    /// Cancellation is observed while waiting for bytes and while writing.
    pub async fn step(&mut self) -> Result<Step> {
        match self.state {
            ConnectionState::Closed => return Ok(Step::Closed),
            ConnectionState::Cancelled => return Ok(Step::Cancelled),
            _ => {}
        }

        self.buffer.clear();
        self.buffer.reserve(self.read_buffer_size);

        let n = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Ok(self.finish(ConnectionState::Cancelled)),
            read = self.stream.read_buf(&mut self.buffer) => read?,
        };
        if n == 0 {
            return Ok(self.finish(ConnectionState::Closed));
        }

        debug!(peer = %self.peer, len = n, "Received bytes");
        let decision = dispatch(&self.buffer);
        if decision.header().is_some() {
            self.state = ConnectionState::HeaderDecoded;
        }
        self.log_dispatch(&decision, n);
        self.state = ConnectionState::Dispatched;

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Ok(self.finish(ConnectionState::Cancelled)),
            written = self.stream.write_all(&self.buffer) => written?,
        }

        self.state = ConnectionState::AwaitingData;
        self.messages += 1;
        self.bytes += n as u64;
        metrics::record_bytes_echoed(n as u64);
        Ok(Step::Dispatched(decision))
    }

    /// Loop until the peer closes or cancellation is requested
    pub async fn run(mut self) -> Result<ConnectionReport> {
        loop {
            match self.step().await? {
                Step::Dispatched(_) => continue,
                Step::Closed => {
                    return Ok(self.report(ConnectionOutcome::Closed));
                }
                Step::Cancelled => {
                    return Ok(self.report(ConnectionOutcome::Cancelled));
                }
            }
        }
    }

    fn finish(&mut self, state: ConnectionState) -> Step {
        self.state = state;
        match state {
            ConnectionState::Cancelled => {
                debug!(peer = %self.peer, "Connection cancelled");
                Step::Cancelled
            }
            _ => {
                info!(peer = %self.peer, messages = self.messages, "Connection closed");
                Step::Closed
            }
        }
    }

    fn report(&self, outcome: ConnectionOutcome) -> ConnectionReport {
        ConnectionReport {
            peer: self.peer,
            outcome,
            messages: self.messages,
            bytes: self.bytes,
        }
    }

    fn log_dispatch(&self, decision: &Dispatch, received: usize) {
        metrics::record_message(decision.label());

        if let Some(header) = decision.header() {
            if usize::try_from(header.message_length).ok() != Some(received) {
                warn!(
                    peer = %self.peer,
                    request_id = header.request_id,
                    "Declared message length {} differs from {} bytes received",
                    header.message_length,
                    received
                );
            }
        }

        match decision {
            Dispatch::Query { message, unsupported } => {
                info!(
                    peer = %self.peer,
                    request_id = message.header.request_id,
                    collection = %message.full_collection_name,
                    skip = message.number_to_skip,
                    limit = message.number_to_return,
                    query = %message.query.to_json(),
                    "Received OP_QUERY"
                );
                if let Some(tag) = unsupported {
                    warn!(
                        peer = %self.peer,
                        request_id = message.header.request_id,
                        "Query document truncated at unsupported element type 0x{:02x}",
                        tag
                    );
                }
            }
            Dispatch::Unhandled { header, op_code } => {
                warn!(
                    peer = %self.peer,
                    request_id = header.request_id,
                    "Received message with unhandled opcode: {}",
                    op_code
                );
            }
            Dispatch::UnknownOpcode { header } => {
                metrics::record_decode_failure("unknown_opcode");
                warn!(
                    peer = %self.peer,
                    request_id = header.request_id,
                    "Received message with unknown opcode: {}",
                    header.op_code
                );
            }
            Dispatch::Malformed(err) => {
                metrics::record_decode_failure(err.kind());
                warn!(peer = %self.peer, error = %err, "Failed to decode message");
            }
        }
    }
}

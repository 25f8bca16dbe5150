//! Diagnostic counters for micromongo
//!
//! Recorded through the `metrics` facade. Nothing is exported unless the
//! embedding binary installs a recorder.
#![allow(clippy::must_use_candidate)]

use metrics::{counter, gauge};

// ============================================================================
// Connection Metrics
// ============================================================================

/// Record an accepted connection
pub fn record_connection_opened() {
    counter!("micromongo_connections_accepted_total").increment(1);
    gauge!("micromongo_connections_active").increment(1.0);
}

/// Record a connection leaving the server, for any reason
pub fn record_connection_closed() {
    gauge!("micromongo_connections_active").decrement(1.0);
}

/// Record bytes written back to a peer
pub fn record_bytes_echoed(bytes: u64) {
    counter!("micromongo_bytes_echoed_total").increment(bytes);
}

// ============================================================================
// Protocol Metrics
// ============================================================================

/// Record a received message by opcode label
pub fn record_message(op_code: &str) {
    counter!("micromongo_messages_received_total", "op_code" => op_code.to_string()).increment(1);
}

/// Record a decode failure by error kind
pub fn record_decode_failure(kind: &'static str) {
    counter!("micromongo_decode_failures_total", "kind" => kind).increment(1);
}

// ============================================================================
// Lifecycle Metrics
// ============================================================================

/// Record tasks cancelled during shutdown
pub fn record_tasks_cancelled(count: u64) {
    counter!("micromongo_tasks_cancelled_total").increment(count);
}

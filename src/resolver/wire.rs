//! DNS wire-format query construction and single-shot UDP exchange.
//!
//! Queries are standard recursive questions: one question section entry,
//! `RD` set, class `IN`, random message id. Responses are consumed as-is;
//! truncated responses are surfaced to the caller without a TCP retry.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::{DNSClass, Name, RecordType};
use hickory_proto::serialize::binary::{BinEncodable, BinEncoder};
use hickory_proto::ProtoError;
use log::warn;
use tokio::net::UdpSocket;

/// Maximum UDP DNS response size accepted.
pub const MAX_UDP_RESPONSE_SIZE: usize = 4096;

/// Outcome of a failed query attempt against one upstream.
#[derive(Debug)]
pub enum ExchangeError {
    /// The per-attempt deadline expired before a response arrived.
    Timeout {
        /// The upstream that did not answer in time.
        server: SocketAddr,
    },
    /// Socket-level send or receive failure.
    Network {
        /// The upstream the exchange targeted.
        server: SocketAddr,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// The query could not be encoded or the response could not be decoded.
    Proto(ProtoError),
}

impl fmt::Display for ExchangeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ExchangeError::Timeout { server } => {
                write!(f, "query to {server} timed out")
            }
            ExchangeError::Network { server, source } => {
                write!(f, "network error talking to {server}: {source}")
            }
            ExchangeError::Proto(e) => write!(f, "DNS message error: {e}"),
        }
    }
}

impl std::error::Error for ExchangeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExchangeError::Timeout { .. } => None,
            ExchangeError::Network { source, .. } => Some(source),
            ExchangeError::Proto(e) => Some(e),
        }
    }
}

impl From<ProtoError> for ExchangeError {
    fn from(e: ProtoError) -> Self {
        ExchangeError::Proto(e)
    }
}

/// Normalizes a domain to its fully-qualified form with a trailing dot.
pub fn fqdn(domain: &str) -> String {
    if domain.ends_with('.') {
        domain.to_string()
    } else {
        format!("{domain}.")
    }
}

/// Builds a recursive query message in wire format.
///
/// Returns the message id (for response matching) together with the encoded
/// bytes.
///
/// # Errors
///
/// Fails when the domain does not parse as a DNS name or the message cannot
/// be encoded.
pub fn build_query(domain: &str, record_type: RecordType) -> Result<(u16, Vec<u8>), ExchangeError> {
    let name = Name::from_str(&fqdn(domain))?;

    let mut query = Query::new();
    query.set_name(name);
    query.set_query_type(record_type);
    query.set_query_class(DNSClass::IN);

    let id = rand::random::<u16>();

    let mut message = Message::new();
    message.set_id(id);
    message.set_message_type(MessageType::Query);
    message.set_op_code(OpCode::Query);
    message.set_recursion_desired(true);
    message.add_query(query);

    let mut buf = Vec::with_capacity(512);
    let mut encoder = BinEncoder::new(&mut buf);
    message.emit(&mut encoder)?;

    Ok((id, buf))
}

/// Performs one query exchange over UDP with a per-attempt deadline.
///
/// Binds an ephemeral socket, sends `query_bytes` to `server`, and waits for
/// a response whose message id matches `id`. Datagrams from other sources or
/// with stale ids are discarded without restarting the deadline.
///
/// # Errors
///
/// [`ExchangeError::Timeout`] when the deadline expires,
/// [`ExchangeError::Network`] for socket failures, and
/// [`ExchangeError::Proto`] when the response cannot be parsed.
pub async fn exchange(
    server: SocketAddr,
    id: u16,
    query_bytes: &[u8],
    timeout: Duration,
) -> Result<Message, ExchangeError> {
    let exchange = async {
        let bind_addr: SocketAddr = if server.is_ipv4() {
            "0.0.0.0:0".parse().expect("static bind address")
        } else {
            "[::]:0".parse().expect("static bind address")
        };

        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|source| ExchangeError::Network { server, source })?;

        socket
            .send_to(query_bytes, server)
            .await
            .map_err(|source| ExchangeError::Network { server, source })?;

        let mut recv_buf = vec![0u8; MAX_UDP_RESPONSE_SIZE];
        loop {
            let (len, from_addr) = socket
                .recv_from(&mut recv_buf)
                .await
                .map_err(|source| ExchangeError::Network { server, source })?;

            if from_addr.ip() != server.ip() {
                warn!("Discarding UDP response from unexpected source {from_addr} (expected {server})");
                continue;
            }

            let message = Message::from_vec(&recv_buf[..len])?;
            if message.id() != id {
                warn!("Discarding UDP response with mismatched id from {from_addr}");
                continue;
            }

            return Ok(message);
        }
    };

    match tokio::time::timeout(timeout, exchange).await {
        Ok(result) => result,
        Err(_) => Err(ExchangeError::Timeout { server }),
    }
}

//! Upstream resolver pool and per-query attempt machinery.
//!
//! This module owns the endpoint pool (selection, liveness), the wire-level
//! UDP exchange, and the retry loop that turns a `(domain, record type)`
//! pair into a [`QueryResult`].

pub mod pool;
pub mod wire;

use std::fmt;
use std::net::SocketAddr;

use hickory_proto::op::{Message, ResponseCode};
use hickory_proto::rr::RecordType;
use log::debug;

pub use pool::{ResolverEndpoint, ResolverPool};
pub use wire::ExchangeError;

/// Why a query produced no usable response after all attempts.
#[derive(Debug)]
pub enum ResolveError {
    /// The pool handed out no endpoint (empty or closed pool).
    NoResolversAvailable,
    /// The last attempt's exchange failure.
    Exchange(ExchangeError),
    /// The upstream answered with a server-failure response code.
    ErrorResponse {
        /// The upstream that refused or failed.
        server: SocketAddr,
        /// The response code it returned.
        code: ResponseCode,
    },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ResolveError::NoResolversAvailable => write!(f, "no resolvers available"),
            ResolveError::Exchange(e) => write!(f, "{e}"),
            ResolveError::ErrorResponse { server, code } => {
                write!(f, "{server} answered with {code}")
            }
        }
    }
}

impl std::error::Error for ResolveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResolveError::NoResolversAvailable => None,
            ResolveError::Exchange(e) => Some(e),
            ResolveError::ErrorResponse { .. } => None,
        }
    }
}

/// Response codes treated as per-attempt failures rather than answers.
///
/// NXDOMAIN stays a success (an empty answer, counted as no-answer
/// downstream); a failing or refusing upstream is worth a retry elsewhere.
fn is_server_failure(code: ResponseCode) -> bool {
    matches!(
        code,
        ResponseCode::ServFail | ResponseCode::Refused | ResponseCode::NotImp
    )
}

/// Result of resolving one `(domain, record type)` pair.
///
/// A `Success` with an empty answer section is still a success at this
/// layer; the result processor distinguishes answered from no-answer.
#[derive(Debug)]
pub enum QueryResult {
    /// A response arrived from an upstream.
    Success {
        /// The domain as read from input.
        domain: String,
        /// The queried record type.
        record_type: RecordType,
        /// The full response message.
        response: Box<Message>,
        /// The upstream that answered.
        resolver: SocketAddr,
    },
    /// Every attempt failed; carries the last error observed.
    Failure {
        /// The domain as read from input.
        domain: String,
        /// The queried record type.
        record_type: RecordType,
        /// The error from the final attempt.
        error: ResolveError,
    },
}

impl QueryResult {
    /// The domain this result belongs to.
    pub fn domain(&self) -> &str {
        match self {
            QueryResult::Success { domain, .. } | QueryResult::Failure { domain, .. } => domain,
        }
    }

    /// The record type this result belongs to.
    pub fn record_type(&self) -> RecordType {
        match self {
            QueryResult::Success { record_type, .. }
            | QueryResult::Failure { record_type, .. } => *record_type,
        }
    }
}

/// Resolves one `(domain, record type)` pair with retries.
///
/// Performs up to `retries + 1` attempts. Each attempt draws a fresh
/// endpoint from the pool round-robin, so consecutive attempts hit
/// different upstreams. The last error is retained and returned when every
/// attempt fails. Per-attempt failures are logged at debug level with the
/// attempt number and cause.
pub async fn resolve_with_retries(
    pool: &ResolverPool,
    domain: &str,
    record_type: RecordType,
    retries: u32,
) -> QueryResult {
    let mut last_error = ResolveError::NoResolversAvailable;

    for attempt in 0..=retries {
        let Some(endpoint) = pool.next_round_robin() else {
            last_error = ResolveError::NoResolversAvailable;
            continue;
        };

        match endpoint.exchange(domain, record_type).await {
            Ok(response) if is_server_failure(response.response_code()) => {
                let code = response.response_code();
                debug!(
                    "Query failed for {domain} (type {record_type}, attempt {}): {code} from {}",
                    attempt + 1,
                    endpoint.addr
                );
                last_error = ResolveError::ErrorResponse {
                    server: endpoint.addr,
                    code,
                };
            }
            Ok(response) => {
                return QueryResult::Success {
                    domain: domain.to_string(),
                    record_type,
                    response: Box::new(response),
                    resolver: endpoint.addr,
                };
            }
            Err(e) => {
                debug!(
                    "Query failed for {domain} (type {record_type}, attempt {}): {e}",
                    attempt + 1
                );
                last_error = ResolveError::Exchange(e);
            }
        }
    }

    QueryResult::Failure {
        domain: domain.to_string(),
        record_type,
        error: last_error,
    }
}

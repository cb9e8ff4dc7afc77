//! Upstream resolver endpoints and the shared selection pool.
//!
//! Endpoints are validated and liveness-tested once at construction and are
//! immutable afterwards. Workers draw endpoints round-robin so successive
//! retry attempts hit different upstreams; wildcard probes draw at random.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use hickory_proto::op::Message;
use hickory_proto::rr::RecordType;
use log::{info, warn};
use rand::Rng;

use super::wire;
use crate::config::{default_resolvers, Config};

/// Domain used for the construction-time liveness probe.
const PROBE_DOMAIN: &str = "google.com";

/// A validated upstream recursor address with its per-attempt timeout.
#[derive(Debug)]
pub struct ResolverEndpoint {
    /// Upstream `host:port` address.
    pub addr: SocketAddr,
    /// Deadline applied to each exchange against this endpoint.
    pub timeout: Duration,
}

impl ResolverEndpoint {
    /// Creates an endpoint without probing it. Liveness checking happens in
    /// [`ResolverPool::new`].
    pub fn new(addr: SocketAddr, timeout: Duration) -> Self {
        ResolverEndpoint { addr, timeout }
    }

    /// Performs one recursive query against this endpoint.
    ///
    /// # Errors
    ///
    /// See [`wire::ExchangeError`] for the failure taxonomy.
    pub async fn exchange(
        &self,
        domain: &str,
        record_type: RecordType,
    ) -> Result<Message, wire::ExchangeError> {
        let (id, bytes) = wire::build_query(domain, record_type)?;
        wire::exchange(self.addr, id, &bytes, self.timeout).await
    }

    /// Construction-time connectivity test: one `A` query for a well-known
    /// name.
    async fn probe(&self) -> bool {
        self.exchange(PROBE_DOMAIN, RecordType::A).await.is_ok()
    }
}

struct PoolInner {
    endpoints: Vec<Arc<ResolverEndpoint>>,
    cursor: usize,
}

/// Shared pool of upstream resolvers.
///
/// The round-robin cursor always stays inside `[0, len)` while the pool is
/// non-empty. An empty pool is valid: selection returns `None` and query
/// attempts fail fast.
pub struct ResolverPool {
    inner: RwLock<PoolInner>,
}

impl ResolverPool {
    /// Builds the pool from configuration.
    ///
    /// Candidate addresses are merged from the inline `-r` list and the
    /// resolvers file; the built-in public recursor list is used when both
    /// are empty. Each candidate is normalized (`:53` appended when no port
    /// is present), parsed, and liveness-tested. Failing candidates are
    /// dropped with a warning; construction itself never fails.
    pub async fn new(config: &Config) -> Self {
        let mut addresses: Vec<String> = Vec::new();

        if let Some(inline) = &config.resolvers {
            addresses.extend(
                inline
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(ToString::to_string),
            );
        }

        if let Some(path) = &config.resolvers_file {
            match load_resolvers_from_file(path) {
                Ok(from_file) => addresses.extend(from_file),
                Err(e) => warn!("Error loading resolvers from file: {e:#}"),
            }
        }

        if addresses.is_empty() {
            info!("Using default DNS resolvers");
            addresses = default_resolvers();
        }

        let mut endpoints = Vec::new();
        for address in addresses {
            if let Some(endpoint) = Self::create_endpoint(&address, config.timeout).await {
                endpoints.push(Arc::new(endpoint));
            }
        }

        info!("Initialized resolver pool with {} resolvers", endpoints.len());
        Self::from_endpoints(endpoints)
    }

    /// Builds a pool from already-validated endpoints, skipping the liveness
    /// probe. The pipeline goes through [`ResolverPool::new`]; this entry
    /// point exists for embedding and tests.
    pub fn from_endpoints(endpoints: Vec<Arc<ResolverEndpoint>>) -> Self {
        ResolverPool {
            inner: RwLock::new(PoolInner {
                endpoints,
                cursor: 0,
            }),
        }
    }

    /// Normalizes, validates, and probes one candidate address.
    async fn create_endpoint(address: &str, timeout: Duration) -> Option<ResolverEndpoint> {
        let normalized = normalize_address(address);

        let addr: SocketAddr = match normalized.parse() {
            Ok(addr) => addr,
            Err(_) => {
                warn!("Invalid resolver address: {address}");
                return None;
            }
        };

        let endpoint = ResolverEndpoint::new(addr, timeout);
        if !endpoint.probe().await {
            warn!("Resolver test failed: {normalized}");
            return None;
        }

        Some(endpoint)
    }

    /// Returns the next endpoint in round-robin order, advancing the cursor.
    pub fn next_round_robin(&self) -> Option<Arc<ResolverEndpoint>> {
        let mut inner = self.inner.write().expect("resolver pool lock poisoned");

        if inner.endpoints.is_empty() {
            return None;
        }

        let endpoint = Arc::clone(&inner.endpoints[inner.cursor]);
        inner.cursor = (inner.cursor + 1) % inner.endpoints.len();
        Some(endpoint)
    }

    /// Returns a uniformly random endpoint without touching the cursor.
    pub fn pick_random(&self) -> Option<Arc<ResolverEndpoint>> {
        let inner = self.inner.read().expect("resolver pool lock poisoned");

        if inner.endpoints.is_empty() {
            return None;
        }

        let index = rand::thread_rng().gen_range(0..inner.endpoints.len());
        Some(Arc::clone(&inner.endpoints[index]))
    }

    /// Number of live endpoints.
    pub fn count(&self) -> usize {
        self.inner
            .read()
            .expect("resolver pool lock poisoned")
            .endpoints
            .len()
    }

    /// Drains the pool. Subsequent selections return `None`.
    pub fn close(&self) {
        let mut inner = self.inner.write().expect("resolver pool lock poisoned");
        inner.endpoints.clear();
        inner.cursor = 0;
        info!("Resolver pool closed");
    }
}

/// Appends the default DNS port when the address carries none.
///
/// IPv6 endpoints must use the bracketed `[addr]:port` form; a bare IPv6
/// address fails the subsequent parse and is dropped.
fn normalize_address(address: &str) -> String {
    if address.contains(':') {
        return address.to_string();
    }
    format!("{address}:53")
}

/// Reads one address per line; blank lines and `#` comments are ignored.
fn load_resolvers_from_file(path: &Path) -> anyhow::Result<Vec<String>> {
    use anyhow::Context;

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to open resolvers file: {}", path.display()))?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(ToString::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn test_pool(n: usize) -> ResolverPool {
        let endpoints = (0..n)
            .map(|i| {
                Arc::new(ResolverEndpoint::new(
                    format!("127.0.0.{}:53", i + 1).parse().unwrap(),
                    Duration::from_secs(1),
                ))
            })
            .collect();
        ResolverPool::from_endpoints(endpoints)
    }

    #[test]
    fn round_robin_cycles_through_all_endpoints() {
        let pool = test_pool(3);
        let picks: Vec<_> = (0..6)
            .map(|_| pool.next_round_robin().unwrap().addr)
            .collect();

        assert_eq!(picks[0], picks[3]);
        assert_eq!(picks[1], picks[4]);
        assert_eq!(picks[2], picks[5]);
        assert_ne!(picks[0], picks[1]);
        assert_ne!(picks[1], picks[2]);
    }

    #[test]
    fn cursor_after_k_calls_is_k_mod_count() {
        let pool = test_pool(4);
        for _ in 0..7 {
            pool.next_round_robin();
        }
        // Cursor wrapped to 3; the next pick is endpoint index 3.
        assert_eq!(
            pool.next_round_robin().unwrap().addr,
            "127.0.0.4:53".parse().unwrap()
        );
    }

    #[test]
    fn empty_pool_yields_none() {
        let pool = test_pool(0);
        assert!(pool.next_round_robin().is_none());
        assert!(pool.pick_random().is_none());
        assert_eq!(pool.count(), 0);
    }

    #[test]
    fn pick_random_does_not_advance_cursor() {
        let pool = test_pool(3);
        let first = pool.next_round_robin().unwrap().addr;
        for _ in 0..10 {
            pool.pick_random();
        }
        let second = pool.next_round_robin().unwrap().addr;
        assert_ne!(first, second);
        // After exactly two round-robin calls the cursor sits at index 2.
        assert_eq!(
            pool.next_round_robin().unwrap().addr,
            "127.0.0.3:53".parse().unwrap()
        );
    }

    #[test]
    fn close_drains_the_pool() {
        let pool = test_pool(2);
        pool.close();
        assert_eq!(pool.count(), 0);
        assert!(pool.next_round_robin().is_none());
    }

    #[test]
    fn normalize_appends_default_port() {
        assert_eq!(normalize_address("8.8.8.8"), "8.8.8.8:53");
        assert_eq!(normalize_address("8.8.8.8:5353"), "8.8.8.8:5353");
    }

    #[test]
    fn resolver_file_skips_comments_and_blanks() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# primary").unwrap();
        writeln!(file, "8.8.8.8").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "1.1.1.1:53").unwrap();

        let addresses = load_resolvers_from_file(file.path()).unwrap();
        assert_eq!(addresses, vec!["8.8.8.8", "1.1.1.1:53"]);
    }

    #[test]
    fn resolver_file_errors_on_missing_path() {
        assert!(load_resolvers_from_file(Path::new("/nonexistent/resolvers.txt")).is_err());
    }
}

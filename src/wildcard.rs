//! Wildcard zone detection and answer suppression.
//!
//! A zone serving `*.example.com` answers every nonexistent label
//! positively, which floods brute-force output with junk. The detector
//! probes each registrable base domain once with random labels and caches
//! the verdict for the rest of the run.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use hickory_proto::op::Message;
use hickory_proto::rr::{RData, RecordType};
use log::{debug, info};
use publicsuffix::{List, Psl};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::output::render_value;
use crate::resolver::{QueryResult, ResolverPool};

/// Number of random-label probes per base domain.
const PROBE_COUNT: usize = 3;
/// Length of each random probe label.
const PROBE_LABEL_LEN: usize = 12;
const PROBE_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Detects wildcard zones by probing random labels under a base domain.
///
/// Holds a shared reference to the resolver pool; probes pick a random
/// endpoint per query. The RNG is owned by the detector and seeded once at
/// construction.
pub struct WildcardDetector {
    pool: Arc<ResolverPool>,
    suffix_list: List,
    cache: RwLock<HashMap<String, bool>>,
    rng: Mutex<StdRng>,
}

impl WildcardDetector {
    /// Creates a detector over the given pool.
    pub fn new(pool: Arc<ResolverPool>) -> Self {
        WildcardDetector {
            pool,
            suffix_list: List::new(),
            cache: RwLock::new(HashMap::new()),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Decides whether a successful result is explainable by a wildcard
    /// record at its base domain.
    ///
    /// Returns `false` for failures, empty answers, and domains whose
    /// registrable base cannot be determined. The first caller for an
    /// uncached base performs the probe sequence; concurrent first callers
    /// may each probe, and the last verdict written wins (the verdicts
    /// agree in practice since probes observe the same zone).
    pub async fn is_wildcard(&self, result: &QueryResult) -> bool {
        let QueryResult::Success {
            domain,
            record_type,
            response,
            ..
        } = result
        else {
            return false;
        };

        if response.answers().is_empty() {
            return false;
        }

        let Some(base_domain) = self.effective_tld_plus_one(domain) else {
            return false;
        };

        {
            let cache = self.cache.read().expect("wildcard cache lock poisoned");
            if let Some(&verdict) = cache.get(&base_domain) {
                return verdict;
            }
        }

        // A missing probe endpoint leaves the verdict undecided and uncached.
        let Some(verdict) = self.detect(&base_domain, *record_type).await else {
            return false;
        };

        self.cache
            .write()
            .expect("wildcard cache lock poisoned")
            .insert(base_domain.clone(), verdict);

        if verdict {
            info!("Wildcard detected for domain: {base_domain}");
        }

        verdict
    }

    /// Extracts the registrable base domain (effective TLD+1).
    ///
    /// The `publicsuffix` crate's `domain()` method has a bug where it
    /// returns the public suffix (e.g., "co.uk") instead of the registrable
    /// domain (e.g., "example.co.uk") for multi-part TLDs. When `domain()`
    /// and `suffix()` agree, the registrable label is reattached from the
    /// hostname; a hostname that *is* a bare public suffix has no
    /// registrable domain and yields `None`.
    fn effective_tld_plus_one(&self, domain: &str) -> Option<String> {
        let host = domain.trim_end_matches('.').to_lowercase();

        let base = self.suffix_list.domain(host.as_bytes())?;
        let base = String::from_utf8_lossy(base.as_bytes()).into_owned();

        let suffix = self.suffix_list.suffix(host.as_bytes())?;
        if base.as_bytes() == suffix.as_bytes() {
            // domain() handed back the bare suffix; the registrable label is
            // the hostname label immediately before it.
            let prefix = host.strip_suffix(base.as_str())?.strip_suffix('.')?;
            let label = prefix.rsplit('.').next()?;
            if label.is_empty() {
                return None;
            }
            return Some(format!("{label}.{base}"));
        }

        Some(base)
    }

    /// Probes `base_domain` with random labels and judges the responses.
    ///
    /// Returns `None` when no endpoint was available for a probe. Otherwise:
    /// any probe with an empty answer set means not-wildcard; three
    /// non-empty, pairwise-equal normalized answer sets mean wildcard.
    async fn detect(&self, base_domain: &str, record_type: RecordType) -> Option<bool> {
        let mut answer_sets: Vec<Vec<String>> = Vec::with_capacity(PROBE_COUNT);

        for _ in 0..PROBE_COUNT {
            let probe_domain = format!("{}.{base_domain}", self.random_label());
            let answers = self.probe(&probe_domain, record_type).await?;

            debug!(
                "Wildcard probe {probe_domain} ({record_type}) returned {} answers",
                answers.len()
            );

            if answers.is_empty() {
                return Some(false);
            }
            answer_sets.push(answers);
        }

        let first = &answer_sets[0];
        Some(answer_sets.iter().all(|set| set == first))
    }

    /// Issues one probe query and returns its normalized answer set.
    ///
    /// Exchange failures count as an empty answer set; only a missing
    /// endpoint yields `None`.
    async fn probe(&self, domain: &str, record_type: RecordType) -> Option<Vec<String>> {
        let endpoint = self.pool.pick_random()?;

        match endpoint.exchange(domain, record_type).await {
            Ok(response) => Some(normalized_answers(&response, record_type)),
            Err(e) => {
                debug!("Wildcard probe for {domain} failed: {e}");
                Some(Vec::new())
            }
        }
    }

    fn random_label(&self) -> String {
        let mut rng = self.rng.lock().expect("wildcard rng lock poisoned");
        (0..PROBE_LABEL_LEN)
            .map(|_| PROBE_CHARSET[rng.gen_range(0..PROBE_CHARSET.len())] as char)
            .collect()
    }

    /// Forgets every cached verdict.
    pub fn clear_cache(&self) {
        self.cache
            .write()
            .expect("wildcard cache lock poisoned")
            .clear();
    }

    /// Number of cached verdicts.
    pub fn cache_size(&self) -> usize {
        self.cache
            .read()
            .expect("wildcard cache lock poisoned")
            .len()
    }
}

/// Builds the sorted, normalized answer set for a probe response.
///
/// For `A`, `AAAA`, and `CNAME` probes only records of the probed type
/// contribute; other probe types take every answer record in its rendered
/// form. Sorting makes the comparison order-insensitive.
fn normalized_answers(response: &Message, record_type: RecordType) -> Vec<String> {
    let mut answers: Vec<String> = response
        .answers()
        .iter()
        .filter(|rr| match record_type {
            RecordType::A => matches!(rr.data(), RData::A(_)),
            RecordType::AAAA => matches!(rr.data(), RData::AAAA(_)),
            RecordType::CNAME => matches!(rr.data(), RData::CNAME(_)),
            _ => true,
        })
        .map(render_value)
        .collect();

    answers.sort();
    answers
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::str::FromStr;

    use hickory_proto::op::{MessageType, OpCode};
    use hickory_proto::rr::rdata::{A, TXT};
    use hickory_proto::rr::{Name, Record};

    fn detector() -> WildcardDetector {
        WildcardDetector::new(Arc::new(ResolverPool::from_endpoints(Vec::new())))
    }

    fn response_with(answers: Vec<Record>) -> Message {
        let mut message = Message::new();
        message.set_id(7);
        message.set_message_type(MessageType::Response);
        message.set_op_code(OpCode::Query);
        for answer in answers {
            message.add_answer(answer);
        }
        message
    }

    fn a_record(owner: &str, ip: [u8; 4]) -> Record {
        Record::from_rdata(
            Name::from_str(owner).unwrap(),
            60,
            RData::A(A(Ipv4Addr::new(ip[0], ip[1], ip[2], ip[3]))),
        )
    }

    #[test]
    fn random_labels_use_the_probe_charset() {
        let detector = detector();
        for _ in 0..20 {
            let label = detector.random_label();
            assert_eq!(label.len(), PROBE_LABEL_LEN);
            assert!(label
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit()));
        }
    }

    #[test]
    fn successive_labels_differ() {
        let detector = detector();
        let labels: Vec<String> = (0..5).map(|_| detector.random_label()).collect();
        let distinct: std::collections::HashSet<_> = labels.iter().collect();
        assert!(distinct.len() > 1, "persistent RNG must not repeat seeds");
    }

    #[test]
    fn base_domain_strips_subdomains_and_trailing_dot() {
        let detector = detector();
        assert_eq!(
            detector.effective_tld_plus_one("a.b.example.com."),
            Some("example.com".to_string())
        );
        assert_eq!(
            detector.effective_tld_plus_one("EXAMPLE.COM"),
            Some("example.com".to_string())
        );
    }

    #[test]
    fn base_domain_handles_multi_part_tlds() {
        let detector = detector();
        assert_eq!(
            detector.effective_tld_plus_one("a.b.example.co.uk"),
            Some("example.co.uk".to_string())
        );
        assert_eq!(
            detector.effective_tld_plus_one("example.co.uk"),
            Some("example.co.uk".to_string())
        );
        assert_eq!(
            detector.effective_tld_plus_one("www.shop.com.br"),
            Some("shop.com.br".to_string())
        );
    }

    #[test]
    fn bare_public_suffix_has_no_base_domain() {
        let detector = detector();
        assert_eq!(detector.effective_tld_plus_one("co.uk"), None);
    }

    #[test]
    fn normalization_sorts_answers() {
        let response = response_with(vec![
            a_record("x.example.com.", [10, 0, 0, 2]),
            a_record("x.example.com.", [10, 0, 0, 1]),
        ]);
        assert_eq!(
            normalized_answers(&response, RecordType::A),
            vec!["10.0.0.1", "10.0.0.2"]
        );
    }

    #[test]
    fn normalization_filters_by_probed_type() {
        let mut records = vec![a_record("x.example.com.", [10, 0, 0, 1])];
        records.push(Record::from_rdata(
            Name::from_str("x.example.com.").unwrap(),
            60,
            RData::TXT(TXT::new(vec!["noise".to_string()])),
        ));
        let response = response_with(records);

        assert_eq!(
            normalized_answers(&response, RecordType::A),
            vec!["10.0.0.1"]
        );
    }

    #[tokio::test]
    async fn failure_results_are_never_wildcards() {
        let detector = detector();
        let result = QueryResult::Failure {
            domain: "example.com".to_string(),
            record_type: RecordType::A,
            error: crate::resolver::ResolveError::NoResolversAvailable,
        };
        assert!(!detector.is_wildcard(&result).await);
    }

    #[tokio::test]
    async fn empty_answers_are_never_wildcards() {
        let detector = detector();
        let result = QueryResult::Success {
            domain: "example.com".to_string(),
            record_type: RecordType::A,
            response: Box::new(response_with(Vec::new())),
            resolver: "127.0.0.1:53".parse().unwrap(),
        };
        assert!(!detector.is_wildcard(&result).await);
    }

    #[tokio::test]
    async fn missing_probe_endpoint_leaves_cache_empty() {
        // Empty pool: pick_random returns None mid-probe.
        let detector = detector();
        let result = QueryResult::Success {
            domain: "sub.example.com".to_string(),
            record_type: RecordType::A,
            response: Box::new(response_with(vec![a_record(
                "sub.example.com.",
                [10, 0, 0, 1],
            )])),
            resolver: "127.0.0.1:53".parse().unwrap(),
        };

        assert!(!detector.is_wildcard(&result).await);
        assert_eq!(detector.cache_size(), 0);
    }

    #[test]
    fn clear_cache_resets_verdicts() {
        let detector = detector();
        detector
            .cache
            .write()
            .unwrap()
            .insert("example.com".to_string(), true);
        assert_eq!(detector.cache_size(), 1);

        detector.clear_cache();
        assert_eq!(detector.cache_size(), 0);
    }
}

// Shared test helpers: a programmable mock DNS upstream and fixture plumbing.
//
// The mock binds a local UDP socket and answers queries according to a
// per-test handler. Every received question is recorded in arrival order so
// tests can assert on distribution and retry behavior. The resolver pool's
// construction-time liveness probe (an A query for google.com) hits the mock
// like any other query; use `data_questions` to filter it out.

// Each test file pulls in only the helpers it needs.
#![allow(dead_code)]

use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use std::sync::{Arc, Mutex};

use hickory_proto::op::{Message, MessageType, OpCode, ResponseCode};
use hickory_proto::rr::rdata::A;
use hickory_proto::rr::{Name, RData, Record, RecordType};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

/// Domain used by the resolver pool's liveness probe.
pub const PROBE_DOMAIN: &str = "google.com";

/// What the mock should do with one query.
pub enum MockAnswer {
    /// NOERROR with the given answer records.
    Answer(Vec<Record>),
    /// NOERROR with an empty answer section.
    Empty,
    /// A response with the given error code and no answers.
    Rcode(ResponseCode),
    /// No response at all; the client times out.
    Drop,
}

/// A scripted upstream resolver on a local UDP socket.
pub struct MockUpstream {
    addr: SocketAddr,
    questions: Arc<Mutex<Vec<(String, RecordType)>>>,
    handle: JoinHandle<()>,
}

impl MockUpstream {
    /// Spawns a mock whose behavior is decided per question by `handler`.
    ///
    /// The handler receives the queried name without its trailing dot.
    pub async fn spawn<F>(handler: F) -> Self
    where
        F: Fn(&str, RecordType) -> MockAnswer + Send + Sync + 'static,
    {
        let socket = UdpSocket::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock upstream socket");
        let addr = socket.local_addr().expect("mock socket has a local addr");
        let questions = Arc::new(Mutex::new(Vec::new()));

        let recorded = Arc::clone(&questions);
        let handle = tokio::spawn(async move {
            let mut buf = vec![0u8; 4096];
            loop {
                let Ok((len, peer)) = socket.recv_from(&mut buf).await else {
                    return;
                };
                let Ok(query) = Message::from_vec(&buf[..len]) else {
                    continue;
                };
                let Some(question) = query.queries().first().cloned() else {
                    continue;
                };

                let domain = question.name().to_utf8();
                let domain = domain.trim_end_matches('.').to_string();
                let record_type = question.query_type();

                recorded
                    .lock()
                    .expect("question log lock poisoned")
                    .push((domain.clone(), record_type));

                let mut response = Message::new();
                response.set_id(query.id());
                response.set_message_type(MessageType::Response);
                response.set_op_code(OpCode::Query);
                response.set_recursion_desired(true);
                response.set_recursion_available(true);
                response.add_query(question);

                match handler(&domain, record_type) {
                    MockAnswer::Answer(records) => {
                        for record in records {
                            response.add_answer(record);
                        }
                    }
                    MockAnswer::Empty => {}
                    MockAnswer::Rcode(code) => {
                        response.set_response_code(code);
                    }
                    MockAnswer::Drop => continue,
                }

                let Ok(bytes) = response.to_vec() else {
                    continue;
                };
                let _ = socket.send_to(&bytes, peer).await;
            }
        });

        MockUpstream {
            addr,
            questions,
            handle,
        }
    }

    /// The `ip:port` string to hand to the resolver configuration.
    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    /// Every recorded question in arrival order, probes included.
    pub fn questions(&self) -> Vec<(String, RecordType)> {
        self.questions
            .lock()
            .expect("question log lock poisoned")
            .clone()
    }

    /// Recorded questions excluding the liveness probe.
    pub fn data_questions(&self) -> Vec<(String, RecordType)> {
        self.questions()
            .into_iter()
            .filter(|(domain, _)| domain != PROBE_DOMAIN)
            .collect()
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Builds an A record for `owner` (trailing dot added if missing).
pub fn a_record(owner: &str, ip: Ipv4Addr, ttl: u32) -> Record {
    let fqdn = if owner.ends_with('.') {
        owner.to_string()
    } else {
        format!("{owner}.")
    };
    Record::from_rdata(
        fqdn.parse::<Name>().expect("valid owner name"),
        ttl,
        RData::A(A(ip)),
    )
}

/// Convenience handler arm: answer the liveness probe positively.
pub fn probe_answer() -> MockAnswer {
    MockAnswer::Answer(vec![a_record(
        PROBE_DOMAIN,
        Ipv4Addr::new(127, 0, 0, 1),
        60,
    )])
}

/// Writes one domain per line into a temp file and returns its guard.
pub fn write_input_file(domains: &[&str]) -> tempfile::NamedTempFile {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().expect("Failed to create input fixture");
    for domain in domains {
        writeln!(file, "{domain}").expect("Failed to write input fixture");
    }
    file.flush().expect("Failed to flush input fixture");
    file
}

/// Reads the whole output file produced by a sweep.
pub fn read_output(path: &Path) -> String {
    std::fs::read_to_string(path).expect("Failed to read sweep output")
}

//! Reply assembly and the UDP server

use std::collections::VecDeque;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::Builder;

use derive_more::{Display, Error, From};

use crate::dns::authority::RecordStore;
use crate::dns::buffer::{SlicePacketBuffer, MAX_UDP_MESSAGE};
use crate::dns::context::ServerContext;
use crate::dns::protocol::{
    DnsHeader, DnsQuery, DnsResponse, ProtocolError, ResourceRecord, ResultCode,
};

#[derive(Debug, Display, From, Error)]
pub enum ServerError {
    Io(std::io::Error),
}

type Result<T> = std::result::Result<T, ServerError>;

/// Common trait for DNS servers
pub trait DnsServer {
    /// Initialize the server and start listening
    ///
    /// This method should _NOT_ block. Rather, servers are expected to spawn
    /// threads to handle requests and return the address they listen on.
    fn run_server(self) -> Result<SocketAddr>;
}

/// Reply header for a request: id and rd echoed, everything else cleared
fn build_response_header(request: &DnsHeader) -> DnsHeader {
    let mut header = DnsHeader::new();
    header.id = request.id;
    header.response = true;
    header.recursion_desired = request.recursion_desired;
    header
}

fn validate_request(request: &DnsQuery) -> Option<ResultCode> {
    if request.question.is_none() {
        log::info!("Query {} carries no question: FORMERR", request.header.id);
        Some(ResultCode::FORMERR)
    } else {
        None
    }
}

/// Answers a decoded query from the store
///
/// This function always returns a reply, even when the question cannot be
/// answered, since the client should still hear back. Lookup failures only
/// change the response code.
pub fn execute_query<'a>(store: &'a RecordStore, request: &'a DnsQuery) -> DnsResponse<'a> {
    let mut header = build_response_header(&request.header);

    if let Some(rescode) = validate_request(request) {
        header.rescode = rescode;
        return DnsResponse {
            header,
            question: None,
            answers: &[],
        };
    }

    let question = request.question.as_ref();
    let answers: &[ResourceRecord] = match question.map(|q| store.lookup_question(q)) {
        Some(Ok(records)) => records,
        Some(Err(err)) => {
            log::info!("Query {} not answered: {}", request.header.id, err);
            header.rescode = err.result_code();
            &[]
        }
        None => &[],
    };

    DnsResponse {
        header,
        question,
        answers,
    }
}

/// Decodes a query datagram and encodes the reply to it
///
/// A datagram that cannot be decoded produces no reply.
pub fn handle_datagram(
    store: &RecordStore,
    datagram: &[u8],
) -> std::result::Result<Vec<u8>, ProtocolError> {
    let mut buffer = SlicePacketBuffer::new(datagram);
    let request = DnsQuery::from_buffer(&mut buffer)?;

    if let Some(ref question) = request.question {
        log::debug!("Query {}: {}", request.header.id, question);
    }

    let response = execute_query(store, &request);
    log::debug!(
        "Reply {}: {:?} with {} answers",
        response.header.id,
        response.header.rescode,
        response.answers.len()
    );

    response.to_bytes()
}

/// The UDP server
///
/// Datagrams are read on a single thread and queued. A fixed pool of worker
/// threads takes them off the queue, builds the replies and sends them back.
pub struct DnsUdpServer {
    context: Arc<ServerContext>,
    request_queue: Arc<Mutex<VecDeque<(SocketAddr, Vec<u8>)>>>,
    request_cond: Arc<Condvar>,
    thread_count: usize,
}

impl DnsUdpServer {
    pub fn new(context: Arc<ServerContext>, thread_count: usize) -> DnsUdpServer {
        DnsUdpServer {
            context,
            request_queue: Arc::new(Mutex::new(VecDeque::new())),
            request_cond: Arc::new(Condvar::new()),
            thread_count,
        }
    }

    /// Answer a single datagram
    fn process_request(socket: &UdpSocket, context: &ServerContext, src: SocketAddr, datagram: &[u8]) {
        let reply = match handle_datagram(&context.store, datagram) {
            Ok(x) => x,
            Err(e) => {
                context.statistics.dropped_count.fetch_add(1, Ordering::Release);
                log::info!("Dropping datagram from {}: {}", src, e);
                return;
            }
        };

        match socket.send_to(&reply, src) {
            Ok(_) => {
                context.statistics.answered_count.fetch_add(1, Ordering::Release);
            }
            Err(e) => {
                context.statistics.dropped_count.fetch_add(1, Ordering::Release);
                log::info!("Failed to send reply to {}: {}", src, e);
            }
        }
    }

    /// Spawn a worker thread to handle queued datagrams
    fn spawn_request_handler(&self, thread_id: usize, socket: UdpSocket) -> std::io::Result<()> {
        let context = self.context.clone();
        let request_cond = self.request_cond.clone();
        let request_queue = self.request_queue.clone();

        let name = format!("DnsUdpServer-request-{}", thread_id);
        Builder::new().name(name).spawn(move || loop {
            let (src, datagram) = {
                let mut queue = match request_queue.lock() {
                    Ok(x) => x,
                    Err(e) => {
                        log::warn!("Request queue poisoned, stopping worker: {}", e);
                        return;
                    }
                };

                // Wait until there is work; a wakeup may find the queue already drained
                loop {
                    if let Some(item) = queue.pop_front() {
                        break item;
                    }
                    queue = match request_cond.wait(queue) {
                        Ok(x) => x,
                        Err(e) => {
                            log::warn!("Request queue poisoned, stopping worker: {}", e);
                            return;
                        }
                    };
                }
            };

            Self::process_request(&socket, &context, src, &datagram);
        })?;

        Ok(())
    }

    /// Spawn the thread receiving datagrams
    fn spawn_incoming_handler(self, socket: UdpSocket) -> std::io::Result<()> {
        Builder::new()
            .name("DnsUdpServer-incoming".into())
            .spawn(move || {
                let mut buf = [0u8; MAX_UDP_MESSAGE];
                loop {
                    let (len, src) = match socket.recv_from(&mut buf) {
                        Ok(x) => x,
                        Err(e) => {
                            log::info!("Failed to read from UDP socket: {:?}", e);
                            continue;
                        }
                    };

                    self.context
                        .statistics
                        .received_count
                        .fetch_add(1, Ordering::Release);

                    self.enqueue_request(src, buf[..len].to_vec());
                }
            })?;

        Ok(())
    }

    /// Add a datagram to the queue and wake a worker
    fn enqueue_request(&self, src: SocketAddr, datagram: Vec<u8>) {
        match self.request_queue.lock() {
            Ok(mut queue) => {
                queue.push_back((src, datagram));
                self.request_cond.notify_one();
            }
            Err(e) => {
                self.context
                    .statistics
                    .dropped_count
                    .fetch_add(1, Ordering::Release);
                log::info!("Failed to queue UDP request for processing: {}", e);
            }
        }
    }
}

impl DnsServer for DnsUdpServer {
    /// Launch the server
    ///
    /// This method takes ownership of the server, preventing the method from
    /// being called multiple times.
    fn run_server(self) -> Result<SocketAddr> {
        let socket = UdpSocket::bind((self.context.address.as_str(), self.context.dns_port))?;
        let local_addr = socket.local_addr()?;

        for thread_id in 0..self.thread_count {
            self.spawn_request_handler(thread_id, socket.try_clone()?)?;
        }

        self.spawn_incoming_handler(socket)?;
        log::info!("Listening for UDP queries on {}", local_addr);

        Ok(local_addr)
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::dns::buffer::VectorPacketBuffer;
    use crate::dns::name::DomainName;
    use crate::dns::protocol::DnsQuestion;
    use crate::dns::query_type::{QueryType, RecordClass};

    fn name(domain: &str) -> DomainName {
        DomainName::from_dotted(domain).unwrap()
    }

    fn create_store() -> RecordStore {
        let mut builder = RecordStore::builder();
        builder.add_a(&name("example.com"), Ipv4Addr::new(1, 2, 3, 4), 100);
        builder.build()
    }

    fn build_query(qname: &str, qtype: QueryType) -> DnsQuery {
        let mut query = DnsQuery::new(0x1234, DnsQuestion::new(name(qname), qtype));
        query.header.recursion_desired = true;
        query
    }

    fn decode_reply(bytes: &[u8]) -> DnsQuery {
        DnsQuery::from_buffer(&mut SlicePacketBuffer::new(bytes)).unwrap()
    }

    #[test]
    fn test_execute_query() {
        let store = create_store();

        // Successful lookup
        let query = build_query("example.com", QueryType::A);
        let res = execute_query(&store, &query);
        assert_eq!(res.header.id, 0x1234);
        assert!(res.header.response);
        assert!(res.header.recursion_desired);
        assert!(!res.header.recursion_available);
        assert!(!res.header.authoritative_answer);
        assert_eq!(res.header.rescode, ResultCode::NOERROR);
        assert_eq!(res.question, query.question.as_ref());
        assert_eq!(res.answers.len(), 1);

        // Missing data is an empty answer
        let query = build_query("nothere.example.com", QueryType::A);
        let res = execute_query(&store, &query);
        assert_eq!(res.header.rescode, ResultCode::NOERROR);
        assert!(res.answers.is_empty());
        assert!(res.question.is_some());

        // Wildcard type
        let query = build_query("example.com", QueryType::All);
        let res = execute_query(&store, &query);
        assert_eq!(res.header.rescode, ResultCode::NOTIMP);
        assert!(res.answers.is_empty());

        // Type outside the table
        let query = build_query("example.com", QueryType::Unknown(28));
        let res = execute_query(&store, &query);
        assert_eq!(res.header.rescode, ResultCode::NOTIMP);

        // Class other than IN
        let mut query = build_query("example.com", QueryType::A);
        if let Some(ref mut q) = query.question {
            q.qclass = RecordClass::from_num(3);
        }
        let res = execute_query(&store, &query);
        assert_eq!(res.header.rescode, ResultCode::REFUSED);
        assert!(res.answers.is_empty());
    }

    #[test]
    fn test_no_question_is_formerr() {
        let store = create_store();

        let mut header = DnsHeader::new();
        header.id = 77;
        let query = DnsQuery {
            header,
            question: None,
        };

        let res = execute_query(&store, &query);
        assert_eq!(res.header.id, 77);
        assert_eq!(res.header.rescode, ResultCode::FORMERR);
        assert!(res.question.is_none());

        let bytes = res.to_bytes().unwrap();
        assert_eq!(bytes, vec![0, 77, 0x80, 0x01, 0, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_handle_datagram_end_to_end() {
        let store = create_store();

        let query = build_query("example.com", QueryType::A).to_bytes().unwrap();
        let reply = handle_datagram(&store, &query).unwrap();

        let mut expected = VectorPacketBuffer::new();
        expected.buffer.extend_from_slice(&[0x12, 0x34, 0x81, 0x00, 0, 1, 0, 1, 0, 0, 0, 0]);
        expected.buffer.extend_from_slice(&query[12..]);
        expected.buffer.extend_from_slice(b"\x07example\x03com\x00");
        expected.buffer.extend_from_slice(&[0, 1, 0, 1, 0, 0, 0, 100, 0, 4, 1, 2, 3, 4]);
        assert_eq!(reply, expected.buffer);

        let decoded = decode_reply(&reply);
        assert_eq!(decoded.header.answers, 1);
        assert_eq!(decoded.question, Some(DnsQuestion::new(name("example.com"), QueryType::A)));
    }

    #[test]
    fn test_handle_datagram_preserves_rd() {
        let store = create_store();

        let mut query = build_query("example.com", QueryType::A);
        query.header.recursion_desired = false;
        query.header.opcode = 2;
        let reply = handle_datagram(&store, &query.to_bytes().unwrap()).unwrap();

        let decoded = decode_reply(&reply);
        assert!(!decoded.header.recursion_desired);
        assert_eq!(decoded.header.opcode, 0);
        assert!(decoded.header.response);
    }

    #[test]
    fn test_handle_datagram_rejects_garbage() {
        let store = create_store();

        let err = handle_datagram(&store, &[0x12, 0x34, 0x01]).unwrap_err();
        assert!(matches!(err, ProtocolError::TruncatedMessage { .. }));

        // One question announced, label runs past the end
        let datagram = [0, 1, 1, 0, 0, 1, 0, 0, 0, 0, 0, 0, 9, b'a', b'b'];
        let err = handle_datagram(&store, &datagram).unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedName { offset: 12, .. }));
    }

    #[test]
    fn test_trailing_questions_ignored() {
        let store = create_store();

        let mut bytes = build_query("example.com", QueryType::A).to_bytes().unwrap();
        bytes[5] = 2;
        bytes.extend_from_slice(b"\xff\xff");

        let decoded = decode_reply(&handle_datagram(&store, &bytes).unwrap());
        assert_eq!(decoded.header.questions, 1);
        assert_eq!(decoded.header.answers, 1);
    }
}

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::process::Command;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use hickory_proto::{
    op::{Message, MessageType, OpCode, Query, ResponseCode},
    rr::{
        rdata::{A, AAAA},
        Name, RData, Record, RecordType,
    },
    serialize::binary::{BinDecodable, BinEncodable},
};

/// A minimal mock DNS server that answers A and AAAA queries.
pub struct MockDns {
    hosts: Vec<MockHost>,
}

impl MockDns {
    /// Address to bind the DNS server to.
    pub const BIND_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 53);

    /// Files to mount under `/etc` so that lookups consult `/etc/hosts`,
    /// then this server at [`Self::BIND_ADDR`].
    pub fn resolver_files() -> [(&'static str, String); 3] {
        [
            ("resolv.conf", format!("nameserver {}\n", Self::BIND_ADDR.ip())),
            ("hosts", String::from("127.0.0.1 localhost\n")),
            ("nsswitch.conf", String::from("hosts: files dns\n")),
        ]
    }

    /// Create a DNS server knowing the given hosts.
    pub fn new(hosts: &[MockHost]) -> Self {
        Self {
            hosts: hosts.to_vec(),
        }
    }

    /// Start the server in a background thread.
    /// Brings up the loopback interface, binds to [`Self::BIND_ADDR`], and spawns a
    /// thread that answers address queries for the configured hosts.
    pub fn spawn(&self) -> io::Result<DnsServerHandle> {
        let output = Command::new("ip")
            .args(["link", "set", "lo", "up"])
            .output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            panic!("failed to bring up loopback interface: {}", stderr);
        }

        let socket = UdpSocket::bind(Self::BIND_ADDR)?;
        socket.set_read_timeout(Some(Duration::from_millis(1000)))?;
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = Arc::clone(&shutdown);
        let hosts = self.hosts.clone();
        let join_handle = std::thread::spawn(move || Self::run(&hosts, &socket, &shutdown_clone));

        Ok(DnsServerHandle {
            shutdown,
            join_handle: Some(join_handle),
        })
    }

    /// Run the server loop, blocking the current thread.
    /// Returns when shutdown is triggered or an unrecoverable error occurs.
    fn run(hosts: &[MockHost], socket: &UdpSocket, shutdown: &AtomicBool) -> io::Result<()> {
        let mut buf = [0u8; 512];
        while !shutdown.load(Ordering::Relaxed) {
            let (len, src) = match socket.recv_from(&mut buf) {
                Ok(result) => result,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
                Err(e) if e.kind() == io::ErrorKind::TimedOut => continue,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };

            if let Ok(response) = Self::handle_query(hosts, &buf[..len]) {
                let _ = socket.send_to(&response, src);
            }
        }

        Ok(())
    }

    fn handle_query(hosts: &[MockHost], query_bytes: &[u8]) -> Result<Vec<u8>, ()> {
        let query = Message::from_bytes(query_bytes).map_err(|_| ())?;

        let mut response = Message::new();
        response.set_id(query.id());
        response.set_message_type(MessageType::Response);
        response.set_op_code(OpCode::Query);
        response.set_authoritative(true);
        response.set_recursion_desired(query.recursion_desired());
        response.set_recursion_available(false);

        let mut known = false;
        for question in query.queries() {
            response.add_query(question.clone());
            let qname = Self::normalize_name(&question.name().to_string());
            let matching: Vec<&MockHost> = hosts
                .iter()
                .filter(|host| Self::normalize_name(host.name) == qname)
                .collect();
            known |= !matching.is_empty();
            let answers = matching
                .into_iter()
                .filter_map(|host| Self::create_record(host, question));
            response.add_answers(answers);
        }

        // Known names without records of the queried type get an empty NOERROR
        if !known {
            response.set_response_code(ResponseCode::NXDomain);
        }

        response.to_bytes().map_err(|_| ())
    }

    /// Normalize a DNS name for comparison (lowercase, no trailing dot).
    fn normalize_name(name: &str) -> String {
        name.to_lowercase().trim_end_matches('.').to_string()
    }

    fn create_record(host: &MockHost, question: &Query) -> Option<Record> {
        let rdata = match (question.query_type(), host.addr) {
            (RecordType::A, IpAddr::V4(addr)) => RData::A(A(addr)),
            (RecordType::AAAA, IpAddr::V6(addr)) => RData::AAAA(AAAA(addr)),
            _ => return None,
        };
        let name: Name = question.name().clone();
        Some(Record::from_rdata(name, host.ttl, rdata))
    }
}

/// Static address record definition for use in test configurations.
#[derive(Clone, Debug)]
pub struct MockHost {
    /// The host name (e.g., `db1.test.local`)
    pub name: &'static str,
    /// Address the name resolves to
    pub addr: IpAddr,
    /// TTL in seconds
    pub ttl: u32,
}

impl MockHost {
    /// Create a new address record.
    pub const fn new(name: &'static str, addr: IpAddr, ttl: u32) -> Self {
        Self { name, addr, ttl }
    }
}

/// Handle for the mock DNS server that shuts it down when dropped.
pub struct DnsServerHandle {
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<std::io::Result<()>>>,
}

impl Drop for DnsServerHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.join();
        }
    }
}

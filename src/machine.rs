//! Machine record and remote reachability
//!
//! A [`MachineRecord`] is the caller-owned identity of one machine: the
//! provider instance id (cleared exactly once on termination) and a local
//! data directory for small persisted facts, currently the spot-request id.
//!
//! Reachability is probed through the [`Communicator`] trait. The shipped
//! implementations open a TCP connection to the machine's SSH port, either
//! against a fixed host ([`TcpCommunicator`]) or resolving the public IP
//! through the provider before each attempt ([`InstanceSshProbe`]).

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::Result;
use crate::provider::ComputeProvider;

/// File under the machine data dir holding the provider spot-request id
const SPOT_REQUEST_ID_FILE: &str = "spot_request_id";

/// Default SSH port probed for reachability
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Default timeout for a single reachability connect attempt
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Caller-owned identity and local state of one machine
#[derive(Debug, Clone)]
pub struct MachineRecord {
    id: Option<String>,
    data_dir: PathBuf,
}

impl MachineRecord {
    /// Create a record for a live instance
    pub fn new(instance_id: impl Into<String>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            id: Some(instance_id.into()),
            data_dir: data_dir.into(),
        }
    }

    /// The provider instance id, if the record is still live
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Replace the instance id
    pub fn set_id(&mut self, instance_id: impl Into<String>) {
        self.id = Some(instance_id.into());
    }

    /// Clear the instance id, marking the record no longer live
    pub fn clear_id(&mut self) {
        self.id = None;
    }

    /// The local data directory backing this record
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// The persisted spot-request id, if one exists
    ///
    /// A missing or unreadable file reads as "no spot request".
    pub fn spot_request_id(&self) -> Option<String> {
        let path = self.data_dir.join(SPOT_REQUEST_ID_FILE);
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                let id = contents.trim().to_string();
                if id.is_empty() { None } else { Some(id) }
            }
            Err(err) => {
                debug!(path = %path.display(), error = %err, "no persisted spot request id");
                None
            }
        }
    }

    /// Persist the spot-request id under the data directory
    pub fn persist_spot_request_id(&self, request_id: &str) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::write(self.data_dir.join(SPOT_REQUEST_ID_FILE), request_id)?;
        Ok(())
    }
}

/// Remote-reachability probe for a machine
#[async_trait]
pub trait Communicator: Send + Sync {
    /// Whether the machine currently accepts remote connections
    async fn ready(&self) -> bool;
}

/// Probe that opens a TCP connection to a fixed host and port
#[derive(Debug, Clone)]
pub struct TcpCommunicator {
    host: String,
    port: u16,
    connect_timeout: Duration,
}

impl TcpCommunicator {
    /// Create a probe for the given host on the default SSH port
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_SSH_PORT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Set the probed port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the per-attempt connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

#[async_trait]
impl Communicator for TcpCommunicator {
    async fn ready(&self) -> bool {
        let addr = format!("{}:{}", self.host, self.port);
        match tokio::time::timeout(self.connect_timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(_)) => true,
            Ok(Err(err)) => {
                debug!(addr = %addr, error = %err, "connect failed");
                false
            }
            Err(_) => {
                debug!(addr = %addr, "connect timed out");
                false
            }
        }
    }
}

/// Probe that resolves the instance's public IP through the provider before
/// each TCP attempt
///
/// The public IP is not known until the instance is running, so the lookup
/// happens on every probe rather than once up front.
pub struct InstanceSshProbe {
    provider: Arc<dyn ComputeProvider>,
    instance_id: String,
    port: u16,
    connect_timeout: Duration,
}

impl InstanceSshProbe {
    /// Create a probe for the given instance on the default SSH port
    pub fn new(provider: Arc<dyn ComputeProvider>, instance_id: impl Into<String>) -> Self {
        Self {
            provider,
            instance_id: instance_id.into(),
            port: DEFAULT_SSH_PORT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Set the probed port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the per-attempt connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

#[async_trait]
impl Communicator for InstanceSshProbe {
    async fn ready(&self) -> bool {
        let public_ip = match self.provider.instance_public_ip(&self.instance_id).await {
            Ok(Some(ip)) => ip,
            Ok(None) => {
                debug!(instance_id = %self.instance_id, "instance has no public IP yet");
                return false;
            }
            Err(err) => {
                debug!(instance_id = %self.instance_id, error = %err, "public IP lookup failed");
                return false;
            }
        };

        TcpCommunicator::new(public_ip)
            .with_port(self.port)
            .with_connect_timeout(self.connect_timeout)
            .ready()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_clear_id_marks_record_not_live() {
        let mut machine = MachineRecord::new("i-0abc", "/tmp/windlass-test");
        assert_eq!(machine.id(), Some("i-0abc"));

        machine.clear_id();
        assert_eq!(machine.id(), None);
    }

    #[test]
    fn test_spot_request_id_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let machine = MachineRecord::new("i-0abc", dir.path());

        machine.persist_spot_request_id("sir-12345\n").unwrap();
        assert_eq!(machine.spot_request_id().as_deref(), Some("sir-12345"));
    }

    #[test]
    fn test_missing_spot_request_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let machine = MachineRecord::new("i-0abc", dir.path());

        assert_eq!(machine.spot_request_id(), None);
    }

    #[test]
    fn test_blank_spot_request_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let machine = MachineRecord::new("i-0abc", dir.path());

        machine.persist_spot_request_id("  \n").unwrap();
        assert_eq!(machine.spot_request_id(), None);
    }

    #[tokio::test]
    async fn test_tcp_communicator_ready_against_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let probe = TcpCommunicator::new("127.0.0.1").with_port(port);
        assert!(probe.ready().await);
    }

    #[tokio::test]
    async fn test_tcp_communicator_not_ready_on_closed_port() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let probe = TcpCommunicator::new("127.0.0.1")
            .with_port(port)
            .with_connect_timeout(Duration::from_millis(200));
        assert!(!probe.ready().await);
    }
}

//! Compute provider capability surface
//!
//! The orchestrator never talks to a cloud API directly. Everything it needs
//! from the provider — instance mutation, readiness queries, elastic address
//! management, spot-request cancellation — goes through the [`ComputeProvider`]
//! trait, so the pipeline can run against EC2 ([`crate::aws::AwsProvider`]) or
//! an in-memory double ([`crate::mock::MockProvider`]) without changing.
//!
//! Provider faults carry a finite [`ProviderErrorKind`] tag. Callers switch on
//! the tag, never on message text; only the `Timeout` kind is considered
//! transient by the retry layer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for provider calls
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Classification of a provider fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// A referenced resource (instance, address, allocation) does not exist
    NotFound,
    /// The provider is rate limiting the caller
    Throttled,
    /// The credentials lack permission for the call
    Unauthorized,
    /// The call or an underlying wait timed out; retryable
    Timeout,
    /// Anything else
    Other,
}

/// A provider API fault with its classification
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ProviderError {
    /// Fault classification
    pub kind: ProviderErrorKind,
    /// Human-readable description from the provider
    pub message: String,
}

impl ProviderError {
    /// Create a provider error
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::NotFound, message)
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Timeout, message)
    }

    /// Create an unclassified error
    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Other, message)
    }

    /// Whether the retry layer may re-attempt after this fault
    pub fn is_retryable(&self) -> bool {
        self.kind == ProviderErrorKind::Timeout
    }
}

/// Network domain an elastic address belongs to
///
/// Determines the association form: classic addresses associate by public IP
/// literal, VPC addresses by allocation id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressDomain {
    /// Classic (non-VPC) networking
    Classic,
    /// Virtual private cloud networking
    Vpc,
}

/// An elastic IP resource on the provider side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRecord {
    /// The address literal
    pub public_ip: String,

    /// Allocation id; present for VPC-domain addresses
    pub allocation_id: Option<String>,

    /// Association id; present once the address is attached to an instance
    pub association_id: Option<String>,

    /// Domain the address was allocated in
    pub domain: AddressDomain,
}

/// Capability interface the lifecycle pipeline consumes
///
/// One instance operation at a time; all calls are synchronous
/// request/response from the orchestrator's point of view.
#[async_trait]
pub trait ComputeProvider: Send + Sync {
    /// Start a stopped instance
    async fn start_instance(&self, instance_id: &str) -> ProviderResult<()>;

    /// Terminate an instance
    async fn destroy_instance(&self, instance_id: &str) -> ProviderResult<()>;

    /// Whether the instance has reached its running/ready state
    async fn instance_ready(&self, instance_id: &str) -> ProviderResult<bool>;

    /// The instance's current public IP, if it has one
    async fn instance_public_ip(&self, instance_id: &str) -> ProviderResult<Option<String>>;

    /// Look up the address currently associated with a public IP
    async fn find_address_by_public_ip(
        &self,
        public_ip: &str,
    ) -> ProviderResult<Option<AddressRecord>>;

    /// Look up an elastic IP resource by its literal address
    async fn find_address_by_literal(
        &self,
        public_ip: &str,
    ) -> ProviderResult<Option<AddressRecord>>;

    /// Allocate a fresh elastic IP in the given domain
    async fn allocate_address(&self, domain: AddressDomain) -> ProviderResult<AddressRecord>;

    /// Associate an address with an instance
    ///
    /// Exactly one of `public_ip` (classic domain) or `allocation_id` (VPC
    /// domain) is expected.
    async fn associate_address(
        &self,
        instance_id: &str,
        public_ip: Option<&str>,
        allocation_id: Option<&str>,
    ) -> ProviderResult<()>;

    /// Detach an address from whatever it is associated with
    ///
    /// Exactly one of `public_ip` (classic domain) or `association_id` (VPC
    /// domain) is expected.
    async fn disassociate_address(
        &self,
        public_ip: Option<&str>,
        association_id: Option<&str>,
    ) -> ProviderResult<()>;

    /// Return an allocated address to the provider
    async fn release_address(&self, address: &AddressRecord) -> ProviderResult<()>;

    /// Cancel a pending spot request
    ///
    /// Call sites treat this as best-effort and must not fail the surrounding
    /// operation on error.
    async fn cancel_spot_request(&self, request_id: &str) -> ProviderResult<()>;
}

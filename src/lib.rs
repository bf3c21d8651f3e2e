//! # Windlass
//!
//! Provider action pipeline for cloud VM lifecycle.
//!
//! ## Architecture
//!
//! ```text
//! Action chain (caller)
//!     │
//!     ├── start ──────► LifecycleOrchestrator
//!     │                   ├── ComputeProvider (EC2 or mock)
//!     │                   ├── RetryPolicy + Timer (bounded readiness wait)
//!     │                   ├── ElasticIpCoordinator (classic / VPC)
//!     │                   └── Communicator (SSH reachability wait)
//!     │
//!     └── terminate ──► disassociate address, cancel spot request,
//!                       destroy instance, clear machine id
//! ```
//!
//! The orchestrator is a sequential state machine: one machine, one in-flight
//! operation, suspension only in its two polling loops. Cancellation is
//! cooperative — the caller's [`InterruptSignal`] short-circuits a wait as
//! [`WaitOutcome::Skipped`] rather than raising, and later steps tolerate the
//! unverified state. Timing for each phase is returned as [`PhaseMetrics`]
//! for the next chain stage.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod address;
pub mod aws;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod machine;
pub mod metrics;
pub mod mock;
pub mod notify;
pub mod provider;
pub mod retry;
pub mod timer;

// ============================================================================
// Public exports - Orchestration
// ============================================================================

// Error handling
pub use error::{LifecycleError, Result};

// Lifecycle entry points
pub use lifecycle::LifecycleOrchestrator;

// Elastic IP coordination
pub use address::ElasticIpCoordinator;

// Waiting and interruption
pub use retry::{DEFAULT_POLL_INTERVAL, InterruptSignal, RetryError, RetryPolicy, WaitOutcome};

// Phase timing
pub use metrics::{INSTANCE_READY_TIME, INSTANCE_SSH_TIME, PhaseMetrics};
pub use timer::time;

// ============================================================================
// Public exports - Environment collaborators
// ============================================================================

// Machine identity and reachability
pub use machine::{
    Communicator, DEFAULT_SSH_PORT, InstanceSshProbe, MachineRecord, TcpCommunicator,
};

// Per-invocation configuration
pub use config::{DEFAULT_INSTANCE_READY_TIMEOUT_SECS, RegionConfig};

// User-facing notifications
pub use notify::{Notifier, RecordingNotifier, TracingNotifier};

// ============================================================================
// Public exports - Providers
// ============================================================================

pub use provider::{
    AddressDomain, AddressRecord, ComputeProvider, ProviderError, ProviderErrorKind,
    ProviderResult,
};

pub use aws::{AwsProvider, DEFAULT_REGION};
pub use mock::{MockProvider, ProviderCall};

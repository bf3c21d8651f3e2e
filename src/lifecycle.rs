//! Instance lifecycle orchestration
//!
//! Sequences provider calls, timed waits, and elastic IP coordination behind
//! the two pipeline entry points:
//!
//! ```text
//! start                                terminate
//!   │                                    │
//!   ├── 1. provider start call           ├── 1. disassociate elastic IP
//!   │                                    │
//!   ├── 2. bounded readiness wait        ├── 2. cancel spot request (best effort)
//!   │      (timed, retryable)            │
//!   ├── 3. elastic IP association        ├── 3. provider destroy call
//!   │      (rolls back on failure)       │
//!   └── 4. reachability wait             └── 4. clear the machine id
//!          (unbounded, timed)
//! ```
//!
//! Both operations hand control back to the caller's action chain: the chain
//! continues on `Ok` and short-circuits on `Err`. Cancellation is cooperative:
//! an interrupt makes the waits end as skipped, never as errors, so a start
//! can run its later steps against an instance that was never verified ready.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::address::ElasticIpCoordinator;
use crate::config::RegionConfig;
use crate::error::{LifecycleError, Result};
use crate::machine::{Communicator, MachineRecord};
use crate::metrics::{INSTANCE_READY_TIME, INSTANCE_SSH_TIME, PhaseMetrics};
use crate::notify::Notifier;
use crate::provider::ComputeProvider;
use crate::retry::{DEFAULT_POLL_INTERVAL, InterruptSignal, RetryError, RetryPolicy, WaitOutcome};
use crate::timer;

/// Seconds of readiness timeout covered by one retry attempt
const SECS_PER_READY_TRY: u64 = 2;

/// Drives a machine between its running and terminated states
///
/// One orchestrator serves any number of machines, but at most one lifecycle
/// operation may be in flight per machine at a time.
pub struct LifecycleOrchestrator {
    provider: Arc<dyn ComputeProvider>,
    notifier: Arc<dyn Notifier>,
    poll_interval: Duration,
}

impl LifecycleOrchestrator {
    /// Create an orchestrator over the given provider and notification sink
    pub fn new(provider: Arc<dyn ComputeProvider>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            provider,
            notifier,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the pause between readiness and reachability polls
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Start the machine's instance and wait until it is ready and reachable
    ///
    /// Returns the per-phase timing metrics for downstream chain stages. The
    /// machine id is left untouched unless an elastic IP failure forces a
    /// rollback, which terminates the instance and clears the id.
    pub async fn start(
        &self,
        machine: &mut MachineRecord,
        region: &RegionConfig,
        communicator: &dyn Communicator,
        interrupt: &InterruptSignal,
    ) -> Result<PhaseMetrics> {
        let instance_id = machine
            .id()
            .ok_or(LifecycleError::MissingInstanceId)?
            .to_string();
        let mut metrics = PhaseMetrics::new();

        self.notifier.info("Starting the instance...");
        self.provider.start_instance(&instance_id).await?;

        // Readiness budget: one try per poll-interval slice of the timeout.
        let tries = (region.instance_ready_timeout / SECS_PER_READY_TRY) as u32;
        let policy = RetryPolicy::new(tries).with_interval(self.poll_interval);

        self.notifier.info("Waiting for instance to become ready...");
        let ready_wait = policy.retry_until(interrupt, || {
            let provider = Arc::clone(&self.provider);
            let id = instance_id.clone();
            async move { provider.instance_ready(&id).await }
        });
        let (wait_result, elapsed) = timer::time(ready_wait).await;
        metrics.record(INSTANCE_READY_TIME, elapsed);

        match wait_result {
            Ok(WaitOutcome::Ready) => {
                info!(
                    instance_id = %instance_id,
                    elapsed_secs = elapsed.as_secs_f64(),
                    "instance is ready"
                );
            }
            Ok(WaitOutcome::Skipped) => {
                debug!(instance_id = %instance_id, "readiness wait skipped by interrupt");
            }
            Err(RetryError::Exhausted { .. }) => {
                return Err(LifecycleError::InstanceReadyTimeout {
                    timeout: region.instance_ready_timeout,
                });
            }
            Err(RetryError::Fatal(err)) => return Err(err.into()),
        }

        if region.wants_elastic_ip() {
            let coordinator = ElasticIpCoordinator::new(
                Arc::clone(&self.provider),
                Arc::clone(&self.notifier),
            );
            coordinator
                .associate(machine, region.elastic_ip.as_deref(), region.address_domain())
                .await?;
        }

        if !interrupt.is_interrupted() {
            self.notifier.info("Waiting for SSH to become available...");
            let (_, elapsed) =
                timer::time(self.wait_for_reachable(communicator, interrupt)).await;
            metrics.record(INSTANCE_SSH_TIME, elapsed);

            info!(
                instance_id = %instance_id,
                elapsed_secs = elapsed.as_secs_f64(),
                "remote access is available"
            );
            self.notifier.info("Machine is booted and ready for use!");
        }

        Ok(metrics)
    }

    /// Terminate the machine's instance and clean up its addresses and any
    /// pending spot request
    ///
    /// Clears the machine id exactly once, after the destroy call succeeds.
    /// A machine whose id is already cleared is left alone.
    pub async fn terminate(&self, machine: &mut MachineRecord) -> Result<()> {
        terminate_instance(self.provider.as_ref(), self.notifier.as_ref(), machine).await
    }

    /// Poll the communicator until the machine is reachable or the caller
    /// interrupts. No upper bound: a machine that never comes up holds the
    /// wait until the user cancels.
    async fn wait_for_reachable(
        &self,
        communicator: &dyn Communicator,
        interrupt: &InterruptSignal,
    ) {
        loop {
            if interrupt.is_interrupted() {
                debug!("reachability wait interrupted");
                break;
            }
            if communicator.ready().await {
                break;
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

/// Full termination path, shared between [`LifecycleOrchestrator::terminate`]
/// and the elastic IP coordinator's rollback
pub(crate) async fn terminate_instance(
    provider: &dyn ComputeProvider,
    notifier: &dyn Notifier,
    machine: &mut MachineRecord,
) -> Result<()> {
    let Some(instance_id) = machine.id().map(str::to_string) else {
        warn!("terminate requested for a machine with no instance id, nothing to do");
        return Ok(());
    };

    // Detach any elastic IP still associated with the instance.
    match provider.instance_public_ip(&instance_id).await? {
        Some(public_ip) => {
            if let Some(address) = provider.find_address_by_public_ip(&public_ip).await? {
                match address.association_id.as_deref() {
                    Some(association_id) => {
                        provider
                            .disassociate_address(None, Some(association_id))
                            .await?;
                    }
                    None => {
                        provider
                            .disassociate_address(Some(&address.public_ip), None)
                            .await?;
                    }
                }
                notifier.info("Elastic IP deallocated.");
            }
        }
        None => {
            debug!(instance_id = %instance_id, "instance has no public IP, skipping address lookup");
        }
    }

    // Cancel any pending spot request. Best effort: the destroy proceeds
    // regardless of this call's outcome.
    if let Some(request_id) = machine.spot_request_id() {
        info!(spot_request_id = %request_id, "cancelling spot request");
        if let Err(err) = provider.cancel_spot_request(&request_id).await {
            warn!(
                spot_request_id = %request_id,
                error = %err,
                "failed to cancel spot request"
            );
        }
    }

    notifier.info("Terminating the instance...");
    provider.destroy_instance(&instance_id).await?;
    machine.clear_id();

    info!(instance_id = %instance_id, "instance terminated");
    Ok(())
}

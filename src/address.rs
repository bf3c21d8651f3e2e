//! Elastic IP coordination
//!
//! Locates (or allocates) an elastic IP and associates it with an instance.
//! The association form depends on the address domain: classic addresses
//! associate by public IP literal, VPC addresses by allocation id.
//!
//! An unrecoverable failure rolls the instance back: the machine is
//! terminated (clearing its id) and a freshly allocated address is released
//! before the error surfaces, so the user sees a single terminal failure and
//! no leaked resources.

use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{LifecycleError, Result};
use crate::lifecycle::terminate_instance;
use crate::machine::MachineRecord;
use crate::notify::Notifier;
use crate::provider::{AddressDomain, AddressRecord, ComputeProvider, ProviderErrorKind};

/// Allocates, locates, and associates elastic IPs for one machine
pub struct ElasticIpCoordinator {
    provider: Arc<dyn ComputeProvider>,
    notifier: Arc<dyn Notifier>,
}

impl ElasticIpCoordinator {
    /// Create a coordinator over the given provider and notification sink
    pub fn new(provider: Arc<dyn ComputeProvider>, notifier: Arc<dyn Notifier>) -> Self {
        Self { provider, notifier }
    }

    /// Attach an elastic IP to the machine's instance
    ///
    /// With a literal, the address must already exist; without one, a fresh
    /// address is allocated in the given domain. A missing address or a
    /// not-found fault from the associate call terminates the instance before
    /// [`LifecycleError::ElasticIpNotFound`] surfaces. Other provider errors
    /// propagate without rollback.
    pub async fn associate(
        &self,
        machine: &mut MachineRecord,
        elastic_ip: Option<&str>,
        domain: AddressDomain,
    ) -> Result<()> {
        let instance_id = machine
            .id()
            .ok_or(LifecycleError::MissingInstanceId)?
            .to_string();

        let (address, freshly_allocated) = match elastic_ip {
            Some(literal) => match self.provider.find_address_by_literal(literal).await? {
                Some(address) => (address, false),
                None => {
                    warn!(elastic_ip = %literal, "elastic IP not found, rolling back instance");
                    self.rollback(machine, None).await;
                    return Err(LifecycleError::ElasticIpNotFound(literal.to_string()));
                }
            },
            None => {
                let address = self.provider.allocate_address(domain).await?;
                info!(
                    public_ip = %address.public_ip,
                    allocation_id = ?address.allocation_id,
                    "allocated elastic IP"
                );
                (address, true)
            }
        };

        let result = match domain {
            AddressDomain::Vpc => {
                self.provider
                    .associate_address(&instance_id, None, address.allocation_id.as_deref())
                    .await
            }
            AddressDomain::Classic => {
                self.provider
                    .associate_address(&instance_id, Some(&address.public_ip), None)
                    .await
            }
        };

        match result {
            Ok(()) => {
                info!(
                    instance_id = %instance_id,
                    public_ip = %address.public_ip,
                    "elastic IP associated"
                );
                self.notifier.info("Allocated and associated elastic IP.");
                Ok(())
            }
            Err(err) if err.kind == ProviderErrorKind::NotFound => {
                warn!(
                    instance_id = %instance_id,
                    public_ip = %address.public_ip,
                    error = %err,
                    "elastic IP association target not found, rolling back instance"
                );
                let fresh = freshly_allocated.then_some(&address);
                self.rollback(machine, fresh).await;
                Err(LifecycleError::ElasticIpNotFound(address.public_ip))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Best-effort rollback: release a freshly allocated address and
    /// terminate the instance. Failures here are logged, not propagated, so
    /// the caller's original error stays the terminal one.
    async fn rollback(&self, machine: &mut MachineRecord, fresh: Option<&AddressRecord>) {
        if let Some(address) = fresh {
            if let Err(err) = self.provider.release_address(address).await {
                warn!(
                    public_ip = %address.public_ip,
                    error = %err,
                    "failed to release elastic IP during rollback"
                );
            }
        }

        if let Err(err) =
            terminate_instance(self.provider.as_ref(), self.notifier.as_ref(), machine).await
        {
            warn!(error = %err, "rollback termination failed");
        }
    }
}

//! In-memory compute provider
//!
//! Simulates just enough provider behavior to exercise the pipeline without
//! network access: one instance with scripted readiness and failures, a set
//! of elastic addresses, and a log of every call in arrival order. Used by
//! the crate's own tests and available to callers for dry runs.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use crate::provider::{
    AddressDomain, AddressRecord, ComputeProvider, ProviderError, ProviderResult,
};

/// One provider call, recorded in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    /// `start_instance` with the instance id
    StartInstance(String),
    /// `destroy_instance` with the instance id
    DestroyInstance(String),
    /// `instance_ready` with the instance id
    InstanceReady(String),
    /// `instance_public_ip` with the instance id
    InstancePublicIp(String),
    /// `find_address_by_public_ip` with the queried IP
    FindAddressByPublicIp(String),
    /// `find_address_by_literal` with the queried literal
    FindAddressByLiteral(String),
    /// `allocate_address` with the requested domain
    AllocateAddress(AddressDomain),
    /// `associate_address` with its full argument set
    AssociateAddress {
        /// Target instance
        instance_id: String,
        /// Classic-domain association argument
        public_ip: Option<String>,
        /// VPC-domain association argument
        allocation_id: Option<String>,
    },
    /// `disassociate_address` with its full argument set
    DisassociateAddress {
        /// Classic-domain disassociation argument
        public_ip: Option<String>,
        /// VPC-domain disassociation argument
        association_id: Option<String>,
    },
    /// `release_address` with the released address literal
    ReleaseAddress(String),
    /// `cancel_spot_request` with the request id
    CancelSpotRequest(String),
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<ProviderCall>,
    ready_after: u32,
    ready_polls: u32,
    ready_errors: VecDeque<ProviderError>,
    start_error: Option<ProviderError>,
    associate_error: Option<ProviderError>,
    cancel_spot_error: Option<ProviderError>,
    public_ip: Option<String>,
    addresses: Vec<AddressRecord>,
    allocations: u32,
}

/// Scriptable in-memory [`ComputeProvider`]
#[derive(Debug, Default)]
pub struct MockProvider {
    state: Mutex<MockState>,
}

impl MockProvider {
    /// Create a provider whose instance is immediately ready
    pub fn new() -> Self {
        Self::default()
    }

    /// Report the instance not ready for the first `polls` readiness checks
    pub fn with_ready_after(self, polls: u32) -> Self {
        self.state().ready_after = polls;
        self
    }

    /// Set the instance's public IP
    pub fn with_public_ip(self, public_ip: impl Into<String>) -> Self {
        self.state().public_ip = Some(public_ip.into());
        self
    }

    /// Seed a known elastic address
    pub fn with_address(self, address: AddressRecord) -> Self {
        self.state().addresses.push(address);
        self
    }

    /// Queue an error for the next readiness check; queued errors are
    /// consumed before the poll counter advances
    pub fn with_ready_error(self, error: ProviderError) -> Self {
        self.state().ready_errors.push_back(error);
        self
    }

    /// Fail the next `start_instance` call
    pub fn with_start_error(self, error: ProviderError) -> Self {
        self.state().start_error = Some(error);
        self
    }

    /// Fail the next `associate_address` call
    pub fn with_associate_error(self, error: ProviderError) -> Self {
        self.state().associate_error = Some(error);
        self
    }

    /// Fail the next `cancel_spot_request` call
    pub fn with_cancel_spot_error(self, error: ProviderError) -> Self {
        self.state().cancel_spot_error = Some(error);
        self
    }

    /// Every call received so far, in order
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.state().calls.clone()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().expect("mock provider state poisoned")
    }
}

#[async_trait]
impl ComputeProvider for MockProvider {
    async fn start_instance(&self, instance_id: &str) -> ProviderResult<()> {
        let mut state = self.state();
        state
            .calls
            .push(ProviderCall::StartInstance(instance_id.to_string()));
        match state.start_error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn destroy_instance(&self, instance_id: &str) -> ProviderResult<()> {
        self.state()
            .calls
            .push(ProviderCall::DestroyInstance(instance_id.to_string()));
        Ok(())
    }

    async fn instance_ready(&self, instance_id: &str) -> ProviderResult<bool> {
        let mut state = self.state();
        state
            .calls
            .push(ProviderCall::InstanceReady(instance_id.to_string()));
        if let Some(err) = state.ready_errors.pop_front() {
            return Err(err);
        }
        state.ready_polls += 1;
        Ok(state.ready_polls > state.ready_after)
    }

    async fn instance_public_ip(&self, instance_id: &str) -> ProviderResult<Option<String>> {
        let mut state = self.state();
        state
            .calls
            .push(ProviderCall::InstancePublicIp(instance_id.to_string()));
        Ok(state.public_ip.clone())
    }

    async fn find_address_by_public_ip(
        &self,
        public_ip: &str,
    ) -> ProviderResult<Option<AddressRecord>> {
        let mut state = self.state();
        state
            .calls
            .push(ProviderCall::FindAddressByPublicIp(public_ip.to_string()));
        Ok(state
            .addresses
            .iter()
            .find(|a| a.public_ip == public_ip)
            .cloned())
    }

    async fn find_address_by_literal(
        &self,
        public_ip: &str,
    ) -> ProviderResult<Option<AddressRecord>> {
        let mut state = self.state();
        state
            .calls
            .push(ProviderCall::FindAddressByLiteral(public_ip.to_string()));
        Ok(state
            .addresses
            .iter()
            .find(|a| a.public_ip == public_ip)
            .cloned())
    }

    async fn allocate_address(&self, domain: AddressDomain) -> ProviderResult<AddressRecord> {
        let mut state = self.state();
        state.calls.push(ProviderCall::AllocateAddress(domain));
        state.allocations += 1;
        let n = state.allocations;
        let record = AddressRecord {
            public_ip: format!("203.0.113.{}", 100 + n),
            allocation_id: match domain {
                AddressDomain::Vpc => Some(format!("eipalloc-{:04}", n)),
                AddressDomain::Classic => None,
            },
            association_id: None,
            domain,
        };
        state.addresses.push(record.clone());
        Ok(record)
    }

    async fn associate_address(
        &self,
        instance_id: &str,
        public_ip: Option<&str>,
        allocation_id: Option<&str>,
    ) -> ProviderResult<()> {
        let mut state = self.state();
        state.calls.push(ProviderCall::AssociateAddress {
            instance_id: instance_id.to_string(),
            public_ip: public_ip.map(str::to_string),
            allocation_id: allocation_id.map(str::to_string),
        });
        match state.associate_error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn disassociate_address(
        &self,
        public_ip: Option<&str>,
        association_id: Option<&str>,
    ) -> ProviderResult<()> {
        self.state().calls.push(ProviderCall::DisassociateAddress {
            public_ip: public_ip.map(str::to_string),
            association_id: association_id.map(str::to_string),
        });
        Ok(())
    }

    async fn release_address(&self, address: &AddressRecord) -> ProviderResult<()> {
        self.state()
            .calls
            .push(ProviderCall::ReleaseAddress(address.public_ip.clone()));
        Ok(())
    }

    async fn cancel_spot_request(&self, request_id: &str) -> ProviderResult<()> {
        let mut state = self.state();
        state
            .calls
            .push(ProviderCall::CancelSpotRequest(request_id.to_string()));
        match state.cancel_spot_error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_readiness() {
        let provider = MockProvider::new().with_ready_after(2);

        assert!(!provider.instance_ready("i-0abc").await.unwrap());
        assert!(!provider.instance_ready("i-0abc").await.unwrap());
        assert!(provider.instance_ready("i-0abc").await.unwrap());
    }

    #[tokio::test]
    async fn test_ready_errors_are_consumed_first() {
        let provider = MockProvider::new().with_ready_error(ProviderError::timeout("slow"));

        assert!(provider.instance_ready("i-0abc").await.is_err());
        assert!(provider.instance_ready("i-0abc").await.unwrap());
    }

    #[tokio::test]
    async fn test_allocation_is_domain_aware() {
        let provider = MockProvider::new();

        let vpc = provider.allocate_address(AddressDomain::Vpc).await.unwrap();
        assert!(vpc.allocation_id.is_some());

        let classic = provider
            .allocate_address(AddressDomain::Classic)
            .await
            .unwrap();
        assert!(classic.allocation_id.is_none());

        let found = provider
            .find_address_by_literal(&vpc.public_ip)
            .await
            .unwrap();
        assert_eq!(found, Some(vpc));
    }

    #[tokio::test]
    async fn test_call_log_preserves_order() {
        let provider = MockProvider::new();
        provider.start_instance("i-0abc").await.unwrap();
        provider.destroy_instance("i-0abc").await.unwrap();

        assert_eq!(
            provider.calls(),
            vec![
                ProviderCall::StartInstance("i-0abc".to_string()),
                ProviderCall::DestroyInstance("i-0abc".to_string()),
            ]
        );
    }
}

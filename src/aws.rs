//! AWS EC2-backed compute provider
//!
//! Implements [`ComputeProvider`] over the EC2 API. SDK faults are mapped
//! onto the pipeline's structured [`ProviderErrorKind`] by inspecting the
//! service error code, so callers never match on message text.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_ec2::Client;
use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_ec2::types::{DomainType, Filter, InstanceStateName};
use aws_types::region::Region;
use tracing::{debug, info};

use crate::provider::{
    AddressDomain, AddressRecord, ComputeProvider, ProviderError, ProviderErrorKind,
    ProviderResult,
};

/// Default AWS region
pub const DEFAULT_REGION: &str = "us-east-1";

/// EC2 implementation of the provider capability surface
pub struct AwsProvider {
    client: Client,
}

impl AwsProvider {
    /// Wrap an existing EC2 client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a provider from the ambient AWS configuration
    pub async fn from_env(region: Option<String>) -> Self {
        let region_str = region.unwrap_or_else(|| DEFAULT_REGION.to_string());
        debug!("creating EC2 client for region: {}", region_str);

        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region_str))
            .load()
            .await;

        Self::new(Client::new(&config))
    }

    async fn describe_instance(
        &self,
        instance_id: &str,
    ) -> ProviderResult<aws_sdk_ec2::types::Instance> {
        let response = self
            .client
            .describe_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .map_err(map_sdk_error)?;

        response
            .reservations()
            .first()
            .and_then(|reservation| reservation.instances().first())
            .cloned()
            .ok_or_else(|| ProviderError::not_found(format!("instance {} not found", instance_id)))
    }
}

#[async_trait]
impl ComputeProvider for AwsProvider {
    async fn start_instance(&self, instance_id: &str) -> ProviderResult<()> {
        info!(instance_id = %instance_id, "starting instance");

        self.client
            .start_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .map_err(map_sdk_error)?;

        Ok(())
    }

    async fn destroy_instance(&self, instance_id: &str) -> ProviderResult<()> {
        info!(instance_id = %instance_id, "terminating instance");

        self.client
            .terminate_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .map_err(map_sdk_error)?;

        Ok(())
    }

    async fn instance_ready(&self, instance_id: &str) -> ProviderResult<bool> {
        let instance = self.describe_instance(instance_id).await?;
        let state = instance.state.as_ref().and_then(|s| s.name.as_ref());

        debug!(instance_id = %instance_id, state = ?state, "polled instance state");
        Ok(matches!(state, Some(InstanceStateName::Running)))
    }

    async fn instance_public_ip(&self, instance_id: &str) -> ProviderResult<Option<String>> {
        let instance = self.describe_instance(instance_id).await?;
        Ok(instance.public_ip_address.clone())
    }

    async fn find_address_by_public_ip(
        &self,
        public_ip: &str,
    ) -> ProviderResult<Option<AddressRecord>> {
        let response = self
            .client
            .describe_addresses()
            .filters(Filter::builder().name("public-ip").values(public_ip).build())
            .send()
            .await
            .map_err(map_sdk_error)?;

        Ok(response.addresses().first().map(to_address_record))
    }

    async fn find_address_by_literal(
        &self,
        public_ip: &str,
    ) -> ProviderResult<Option<AddressRecord>> {
        // Unlike the filter form, querying by address literal faults when the
        // address does not exist; that fault means "no such address" here.
        match self
            .client
            .describe_addresses()
            .public_ips(public_ip)
            .send()
            .await
        {
            Ok(response) => Ok(response.addresses().first().map(to_address_record)),
            Err(err) => {
                let mapped = map_sdk_error(err);
                if mapped.kind == ProviderErrorKind::NotFound {
                    Ok(None)
                } else {
                    Err(mapped)
                }
            }
        }
    }

    async fn allocate_address(&self, domain: AddressDomain) -> ProviderResult<AddressRecord> {
        let domain_type = match domain {
            AddressDomain::Vpc => DomainType::Vpc,
            AddressDomain::Classic => DomainType::Standard,
        };

        let response = self
            .client
            .allocate_address()
            .domain(domain_type)
            .send()
            .await
            .map_err(map_sdk_error)?;

        let record = AddressRecord {
            public_ip: response.public_ip.clone().unwrap_or_default(),
            allocation_id: response.allocation_id.clone(),
            association_id: None,
            domain,
        };

        info!(
            public_ip = %record.public_ip,
            allocation_id = ?record.allocation_id,
            "allocated elastic IP"
        );
        Ok(record)
    }

    async fn associate_address(
        &self,
        instance_id: &str,
        public_ip: Option<&str>,
        allocation_id: Option<&str>,
    ) -> ProviderResult<()> {
        self.client
            .associate_address()
            .instance_id(instance_id)
            .set_public_ip(public_ip.map(str::to_string))
            .set_allocation_id(allocation_id.map(str::to_string))
            .send()
            .await
            .map_err(map_sdk_error)?;

        Ok(())
    }

    async fn disassociate_address(
        &self,
        public_ip: Option<&str>,
        association_id: Option<&str>,
    ) -> ProviderResult<()> {
        self.client
            .disassociate_address()
            .set_public_ip(public_ip.map(str::to_string))
            .set_association_id(association_id.map(str::to_string))
            .send()
            .await
            .map_err(map_sdk_error)?;

        Ok(())
    }

    async fn release_address(&self, address: &AddressRecord) -> ProviderResult<()> {
        // Allocation id for VPC addresses, public IP for classic ones.
        let request = match address.allocation_id.as_deref() {
            Some(allocation_id) => self.client.release_address().allocation_id(allocation_id),
            None => self.client.release_address().public_ip(&address.public_ip),
        };

        request.send().await.map_err(map_sdk_error)?;
        Ok(())
    }

    async fn cancel_spot_request(&self, request_id: &str) -> ProviderResult<()> {
        info!(spot_request_id = %request_id, "cancelling spot request");

        self.client
            .cancel_spot_instance_requests()
            .spot_instance_request_ids(request_id)
            .send()
            .await
            .map_err(map_sdk_error)?;

        Ok(())
    }
}

fn to_address_record(address: &aws_sdk_ec2::types::Address) -> AddressRecord {
    AddressRecord {
        public_ip: address.public_ip.clone().unwrap_or_default(),
        allocation_id: address.allocation_id.clone(),
        association_id: address.association_id.clone(),
        domain: match address.domain.as_ref() {
            Some(DomainType::Vpc) => AddressDomain::Vpc,
            _ => AddressDomain::Classic,
        },
    }
}

fn map_sdk_error<E>(err: SdkError<E>) -> ProviderError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let kind = match &err {
        SdkError::TimeoutError(_) => ProviderErrorKind::Timeout,
        SdkError::DispatchFailure(failure) if failure.is_timeout() => ProviderErrorKind::Timeout,
        SdkError::ServiceError(context) => kind_from_code(context.err().code()),
        _ => ProviderErrorKind::Other,
    };

    ProviderError::new(kind, DisplayErrorContext(&err).to_string())
}

fn kind_from_code(code: Option<&str>) -> ProviderErrorKind {
    match code {
        Some(code) if code.contains("NotFound") => ProviderErrorKind::NotFound,
        Some("RequestLimitExceeded") | Some("Throttling") | Some("ThrottlingException") => {
            ProviderErrorKind::Throttled
        }
        Some("UnauthorizedOperation") | Some("AuthFailure") => ProviderErrorKind::Unauthorized,
        Some("RequestTimeout") | Some("RequestExpired") => ProviderErrorKind::Timeout,
        _ => ProviderErrorKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_ec2::types::Address;

    #[test]
    fn test_kind_from_code_classifies_not_found_variants() {
        assert_eq!(
            kind_from_code(Some("InvalidAddress.NotFound")),
            ProviderErrorKind::NotFound
        );
        assert_eq!(
            kind_from_code(Some("InvalidInstanceID.NotFound")),
            ProviderErrorKind::NotFound
        );
        assert_eq!(
            kind_from_code(Some("InvalidAllocationID.NotFound")),
            ProviderErrorKind::NotFound
        );
    }

    #[test]
    fn test_kind_from_code_classifies_throttling_and_auth() {
        assert_eq!(
            kind_from_code(Some("RequestLimitExceeded")),
            ProviderErrorKind::Throttled
        );
        assert_eq!(
            kind_from_code(Some("UnauthorizedOperation")),
            ProviderErrorKind::Unauthorized
        );
        assert_eq!(
            kind_from_code(Some("RequestTimeout")),
            ProviderErrorKind::Timeout
        );
        assert_eq!(kind_from_code(Some("DryRunOperation")), ProviderErrorKind::Other);
        assert_eq!(kind_from_code(None), ProviderErrorKind::Other);
    }

    #[test]
    fn test_address_record_from_vpc_address() {
        let address = Address::builder()
            .public_ip("203.0.113.10")
            .allocation_id("eipalloc-1")
            .association_id("eipassoc-2")
            .domain(DomainType::Vpc)
            .build();

        let record = to_address_record(&address);
        assert_eq!(record.public_ip, "203.0.113.10");
        assert_eq!(record.allocation_id.as_deref(), Some("eipalloc-1"));
        assert_eq!(record.association_id.as_deref(), Some("eipassoc-2"));
        assert_eq!(record.domain, AddressDomain::Vpc);
    }

    #[test]
    fn test_address_record_defaults_to_classic_domain() {
        let address = Address::builder().public_ip("203.0.113.10").build();

        let record = to_address_record(&address);
        assert_eq!(record.domain, AddressDomain::Classic);
        assert!(record.allocation_id.is_none());
    }
}

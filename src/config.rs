//! Per-invocation region configuration

use serde::{Deserialize, Serialize};

use crate::provider::AddressDomain;

/// Default wait for an instance to reach its ready state (seconds)
pub const DEFAULT_INSTANCE_READY_TIMEOUT_SECS: u64 = 120;

/// Immutable configuration for one lifecycle operation in one region
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionConfig {
    /// Subnet the instance lives in; presence implies VPC addressing
    pub subnet_id: Option<String>,

    /// Elastic IP literal to associate after the instance is ready
    pub elastic_ip: Option<String>,

    /// Allocate a fresh elastic IP when no literal is given
    #[serde(default)]
    pub allocate_elastic_ip: bool,

    /// Seconds to wait for the instance to become ready
    #[serde(default = "default_instance_ready_timeout")]
    pub instance_ready_timeout: u64,
}

fn default_instance_ready_timeout() -> u64 {
    DEFAULT_INSTANCE_READY_TIMEOUT_SECS
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            subnet_id: None,
            elastic_ip: None,
            allocate_elastic_ip: false,
            instance_ready_timeout: DEFAULT_INSTANCE_READY_TIMEOUT_SECS,
        }
    }
}

impl RegionConfig {
    /// Create a config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the subnet id
    pub fn with_subnet(mut self, subnet_id: impl Into<String>) -> Self {
        self.subnet_id = Some(subnet_id.into());
        self
    }

    /// Set the elastic IP literal
    pub fn with_elastic_ip(mut self, elastic_ip: impl Into<String>) -> Self {
        self.elastic_ip = Some(elastic_ip.into());
        self
    }

    /// Request allocation of a fresh elastic IP
    pub fn with_allocate_elastic_ip(mut self, allocate: bool) -> Self {
        self.allocate_elastic_ip = allocate;
        self
    }

    /// Set the instance-ready timeout (seconds)
    pub fn with_instance_ready_timeout(mut self, seconds: u64) -> Self {
        self.instance_ready_timeout = seconds;
        self
    }

    /// Whether the start operation should attach an elastic IP at all
    pub fn wants_elastic_ip(&self) -> bool {
        self.elastic_ip.is_some() || self.allocate_elastic_ip
    }

    /// Address domain implied by the subnet configuration
    pub fn address_domain(&self) -> AddressDomain {
        if self.subnet_id.is_some() {
            AddressDomain::Vpc
        } else {
            AddressDomain::Classic
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = RegionConfig::new()
            .with_subnet("subnet-0a1b")
            .with_elastic_ip("203.0.113.10")
            .with_instance_ready_timeout(60);

        assert_eq!(config.subnet_id.as_deref(), Some("subnet-0a1b"));
        assert_eq!(config.elastic_ip.as_deref(), Some("203.0.113.10"));
        assert_eq!(config.instance_ready_timeout, 60);
        assert!(config.wants_elastic_ip());
    }

    #[test]
    fn test_subnet_implies_vpc_domain() {
        let classic = RegionConfig::new();
        let vpc = RegionConfig::new().with_subnet("subnet-0a1b");

        assert_eq!(classic.address_domain(), AddressDomain::Classic);
        assert_eq!(vpc.address_domain(), AddressDomain::Vpc);
    }

    #[test]
    fn test_allocate_flag_alone_wants_elastic_ip() {
        let config = RegionConfig::new().with_allocate_elastic_ip(true);
        assert!(config.wants_elastic_ip());
        assert!(config.elastic_ip.is_none());
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let config: RegionConfig = serde_json::from_str("{}").unwrap();

        assert!(config.subnet_id.is_none());
        assert!(!config.allocate_elastic_ip);
        assert_eq!(
            config.instance_ready_timeout,
            DEFAULT_INSTANCE_READY_TIMEOUT_SECS
        );
        assert!(!config.wants_elastic_ip());
    }
}

//! Phase timing metrics
//!
//! The start operation reports how long each lifecycle phase took, keyed by
//! phase name. The map is created by the operation and returned to the
//! caller, whose downstream chain stages or telemetry read it; nothing here
//! is ambient state.

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;
use std::time::Duration;

/// Metrics key for the boot/network readiness wait
pub const INSTANCE_READY_TIME: &str = "instance_ready_time";

/// Metrics key for the remote-reachability (SSH) wait
pub const INSTANCE_SSH_TIME: &str = "instance_ssh_time";

/// Timing breakdown of lifecycle phases, keyed by phase name
///
/// Serializes as a flat map of phase name to elapsed seconds.
#[derive(Debug, Clone, Default)]
pub struct PhaseMetrics {
    phases: BTreeMap<String, Duration>,
}

impl PhaseMetrics {
    /// Create an empty metrics map
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the elapsed time of a phase, replacing any earlier value
    pub fn record(&mut self, phase: impl Into<String>, elapsed: Duration) {
        self.phases.insert(phase.into(), elapsed);
    }

    /// Elapsed time of a phase, if it was recorded
    pub fn get(&self, phase: &str) -> Option<Duration> {
        self.phases.get(phase).copied()
    }

    /// Whether a phase was recorded
    pub fn contains(&self, phase: &str) -> bool {
        self.phases.contains_key(phase)
    }

    /// Number of recorded phases
    pub fn len(&self) -> usize {
        self.phases.len()
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// Iterate over recorded phases in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, Duration)> {
        self.phases.iter().map(|(name, d)| (name.as_str(), *d))
    }
}

impl Serialize for PhaseMetrics {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.phases.len()))?;
        for (name, elapsed) in &self.phases {
            map.serialize_entry(name, &elapsed.as_secs_f64())?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_get() {
        let mut metrics = PhaseMetrics::new();
        assert!(metrics.is_empty());

        metrics.record(INSTANCE_READY_TIME, Duration::from_secs(7));
        assert_eq!(
            metrics.get(INSTANCE_READY_TIME),
            Some(Duration::from_secs(7))
        );
        assert!(metrics.contains(INSTANCE_READY_TIME));
        assert!(!metrics.contains(INSTANCE_SSH_TIME));
        assert_eq!(metrics.len(), 1);
    }

    #[test]
    fn test_record_replaces_earlier_value() {
        let mut metrics = PhaseMetrics::new();
        metrics.record(INSTANCE_SSH_TIME, Duration::from_secs(1));
        metrics.record(INSTANCE_SSH_TIME, Duration::from_secs(3));

        assert_eq!(metrics.get(INSTANCE_SSH_TIME), Some(Duration::from_secs(3)));
        assert_eq!(metrics.len(), 1);
    }

    #[test]
    fn test_serializes_as_seconds_map() {
        let mut metrics = PhaseMetrics::new();
        metrics.record(INSTANCE_READY_TIME, Duration::from_millis(1500));
        metrics.record(INSTANCE_SSH_TIME, Duration::from_secs(2));

        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json[INSTANCE_READY_TIME], 1.5);
        assert_eq!(json[INSTANCE_SSH_TIME], 2.0);
    }
}

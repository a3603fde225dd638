//! Probe overrides declared on a Cluster

use k8s_openapi::api::core::v1::Probe;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Timing overrides for one of the instance probes.
///
/// Only the fields that are set replace the corresponding field of the
/// default probe; everything else is left as generated.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProbeOverride {
    /// Seconds after container start before the probe is initiated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_delay_seconds: Option<i32>,

    /// Seconds between two probe executions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_seconds: Option<i32>,

    /// Seconds after which the probe times out
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<i32>,

    /// Consecutive successes needed after a failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_threshold: Option<i32>,

    /// Consecutive failures before the probe gives up
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_threshold: Option<i32>,

    /// Grace period used when the probe triggers a termination
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub termination_grace_period_seconds: Option<i64>,
}

impl ProbeOverride {
    /// Merge the fields that are set into `probe`
    pub fn apply_into(&self, probe: &mut Probe) {
        if let Some(v) = self.initial_delay_seconds {
            probe.initial_delay_seconds = Some(v);
        }
        if let Some(v) = self.period_seconds {
            probe.period_seconds = Some(v);
        }
        if let Some(v) = self.timeout_seconds {
            probe.timeout_seconds = Some(v);
        }
        if let Some(v) = self.success_threshold {
            probe.success_threshold = Some(v);
        }
        if let Some(v) = self.failure_threshold {
            probe.failure_threshold = Some(v);
        }
        if let Some(v) = self.termination_grace_period_seconds {
            probe.termination_grace_period_seconds = Some(v);
        }
    }
}

/// Per-kind probe overrides
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProbesConfiguration {
    /// Startup probe overrides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub startup: Option<ProbeOverride>,

    /// Readiness probe overrides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readiness: Option<ProbeOverride>,

    /// Liveness probe overrides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liveness: Option<ProbeOverride>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_probe() -> Probe {
        Probe {
            period_seconds: Some(10),
            timeout_seconds: Some(5),
            ..Default::default()
        }
    }

    #[test]
    fn unset_override_leaves_probe_untouched() {
        let mut probe = default_probe();
        ProbeOverride::default().apply_into(&mut probe);
        assert_eq!(probe, default_probe());
    }

    #[test]
    fn only_set_fields_are_replaced() {
        let mut probe = default_probe();
        ProbeOverride {
            period_seconds: Some(3),
            failure_threshold: Some(7),
            ..Default::default()
        }
        .apply_into(&mut probe);

        assert_eq!(probe.period_seconds, Some(3));
        assert_eq!(probe.failure_threshold, Some(7));
        assert_eq!(probe.timeout_seconds, Some(5));
        assert_eq!(probe.initial_delay_seconds, None);
    }

    #[test]
    fn probes_configuration_parses_camel_case() {
        let cfg: ProbesConfiguration = serde_json::from_str(
            r#"{"liveness": {"periodSeconds": 4, "terminationGracePeriodSeconds": 12}}"#,
        )
        .expect("probes configuration should parse");

        let liveness = cfg.liveness.expect("liveness should be set");
        assert_eq!(liveness.period_seconds, Some(4));
        assert_eq!(liveness.termination_grace_period_seconds, Some(12));
        assert!(cfg.startup.is_none());
    }
}

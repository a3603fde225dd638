//! Scheduling configuration declared on a Cluster

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{NodeAffinity, PodAffinity, PodAntiAffinity, Toleration};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Topology key used when the cluster does not declare one
pub const DEFAULT_TOPOLOGY_KEY: &str = "kubernetes.io/hostname";

/// How strictly instances of the same cluster are kept apart
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PodAntiAffinityType {
    /// Scheduler tries to spread instances but may co-locate them
    #[default]
    Preferred,
    /// Scheduler refuses to co-locate instances
    Required,
}

impl std::fmt::Display for PodAntiAffinityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Preferred => write!(f, "preferred"),
            Self::Required => write!(f, "required"),
        }
    }
}

/// Affinity, anti-affinity, tolerations and node selection for instances
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AffinityConfiguration {
    /// Generate the anti-affinity rule keeping instances apart.
    /// Only an explicit `false` disables it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_pod_anti_affinity: Option<bool>,

    /// Topology key of the generated anti-affinity rule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topology_key: Option<String>,

    /// Strictness of the generated anti-affinity rule (default: preferred)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_anti_affinity_type: Option<PodAntiAffinityType>,

    /// Node selector copied to every instance
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,

    /// Node affinity copied to every instance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_affinity: Option<NodeAffinity>,

    /// Tolerations copied to every instance
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<Toleration>,

    /// Pod affinity replacing the generated one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_pod_affinity: Option<PodAffinity>,

    /// Pod anti-affinity terms appended to the generated ones
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_pod_anti_affinity: Option<PodAntiAffinity>,
}

impl AffinityConfiguration {
    /// Whether the generated anti-affinity rule is wanted
    pub fn pod_anti_affinity_enabled(&self) -> bool {
        self.enable_pod_anti_affinity != Some(false)
    }

    /// Topology key of the generated rule, falling back to the per-node key
    pub fn topology_key(&self) -> &str {
        match self.topology_key.as_deref() {
            Some(key) if !key.is_empty() => key,
            _ => DEFAULT_TOPOLOGY_KEY,
        }
    }

    /// Anti-affinity strictness, resolving an unset value to preferred
    pub fn anti_affinity_type(&self) -> PodAntiAffinityType {
        self.pod_anti_affinity_type.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anti_affinity_enabled_unless_explicitly_disabled() {
        let mut cfg = AffinityConfiguration::default();
        assert!(cfg.pod_anti_affinity_enabled());

        cfg.enable_pod_anti_affinity = Some(true);
        assert!(cfg.pod_anti_affinity_enabled());

        cfg.enable_pod_anti_affinity = Some(false);
        assert!(!cfg.pod_anti_affinity_enabled());
    }

    #[test]
    fn empty_topology_key_falls_back_to_hostname() {
        let mut cfg = AffinityConfiguration::default();
        assert_eq!(cfg.topology_key(), DEFAULT_TOPOLOGY_KEY);

        cfg.topology_key = Some(String::new());
        assert_eq!(cfg.topology_key(), DEFAULT_TOPOLOGY_KEY);

        cfg.topology_key = Some("topology.kubernetes.io/zone".to_string());
        assert_eq!(cfg.topology_key(), "topology.kubernetes.io/zone");
    }

    #[test]
    fn anti_affinity_type_parses_lowercase() {
        let cfg: AffinityConfiguration =
            serde_json::from_str(r#"{"podAntiAffinityType": "required"}"#)
                .expect("affinity configuration should parse");
        assert_eq!(cfg.anti_affinity_type(), PodAntiAffinityType::Required);
        assert_eq!(
            AffinityConfiguration::default().anti_affinity_type(),
            PodAntiAffinityType::Preferred
        );
    }
}

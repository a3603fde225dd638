//! Cluster CRD types
//!
//! Defines `Cluster`, the user-authored description of a PostgreSQL cluster.
//! Only the fields consumed by instance synthesis are modelled here.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    EnvFromSource, EnvVar, ResourceRequirements, SeccompProfile, TopologySpreadConstraint,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::affinity::AffinityConfiguration;
use super::probes::ProbesConfiguration;
use crate::POD_PATCH_ANNOTATION;

/// Seconds an instance may take to start when the cluster does not say
pub const DEFAULT_MAX_START_DELAY: i32 = 3600;

/// Seconds an instance may take to shut down when the cluster does not say
pub const DEFAULT_MAX_STOP_DELAY: i32 = 1800;

/// User id of the postgres user in the default images
pub const DEFAULT_POSTGRES_UID: i64 = 26;

/// Group id of the postgres user in the default images
pub const DEFAULT_POSTGRES_GID: i64 = 26;

// =============================================================================
// Sub-configurations
// =============================================================================

/// Log level of the instance manager
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Errors only
    Error,
    /// Warnings and errors
    Warning,
    /// Informational messages
    Info,
    /// Debugging output
    Debug,
    /// Everything
    Trace,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
            Self::Debug => write!(f, "debug"),
            Self::Trace => write!(f, "trace"),
        }
    }
}

/// TLS toggle
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct TlsConfiguration {
    /// Serve over TLS
    #[serde(default)]
    pub enabled: bool,
}

/// Metrics endpoint configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct MonitoringConfiguration {
    /// TLS settings of the metrics endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfiguration>,
}

/// Storage request for a volume
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfiguration {
    /// Requested size (e.g. "10Gi")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,

    /// Storage class of the claim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,
}

/// Size limits of the memory-backed and scratch volumes
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EphemeralVolumesSizeLimit {
    /// Limit of the shared memory volume
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shm: Option<Quantity>,

    /// Limit of the scratch data volume
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temporary_data: Option<Quantity>,
}

/// A plugin the cluster wants to be extended by
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct PluginConfiguration {
    /// Plugin name
    pub name: String,

    /// Whether the plugin is active (default: true)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Free-form plugin parameters
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, String>,
}

// =============================================================================
// CRD
// =============================================================================

/// PostgreSQL cluster specification
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "tidepool.dev",
    version = "v1",
    kind = "Cluster",
    plural = "clusters",
    shortname = "tpc",
    namespaced,
    status = "ClusterStatus",
    printcolumn = r#"{"name":"Image","type":"string","jsonPath":".status.image"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    /// PostgreSQL container image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_name: Option<String>,

    /// Pull policy of the instance containers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<String>,

    /// Resources of the instance containers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    /// Extra environment variables, appended after the built-in ones
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,

    /// Extra environment sources
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env_from: Vec<EnvFromSource>,

    /// Scheduler in charge of the instances
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduler_name: Option<String>,

    /// Scheduling configuration
    #[serde(default)]
    pub affinity: AffinityConfiguration,

    /// Topology spread constraints copied to every instance
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topology_spread_constraints: Vec<TopologySpreadConstraint>,

    /// Probe overrides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probes: Option<ProbesConfiguration>,

    /// Seccomp profile of the instances (default: RuntimeDefault)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seccomp_profile: Option<SeccompProfile>,

    /// User id running PostgreSQL
    #[serde(rename = "postgresUID", default, skip_serializing_if = "Option::is_none")]
    pub postgres_uid: Option<i64>,

    /// Group id running PostgreSQL
    #[serde(rename = "postgresGID", default, skip_serializing_if = "Option::is_none")]
    pub postgres_gid: Option<i64>,

    /// Priority class of the instances
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_class_name: Option<String>,

    /// Seconds an instance may take to start
    #[serde(rename = "startDelay", default, skip_serializing_if = "Option::is_none")]
    pub max_start_delay: Option<i32>,

    /// Seconds an instance may take to stop
    #[serde(rename = "stopDelay", default, skip_serializing_if = "Option::is_none")]
    pub max_stop_delay: Option<i32>,

    /// Seconds without a successful liveness check before a restart
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liveness_probe_timeout: Option<i32>,

    /// Metrics endpoint configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitoring: Option<MonitoringConfiguration>,

    /// Separate WAL volume configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wal_storage: Option<StorageConfiguration>,

    /// Size limits of the ephemeral volumes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ephemeral_volumes_size_limit: Option<EphemeralVolumesSizeLimit>,

    /// Instance manager log level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<LogLevel>,

    /// Plugins extending the cluster
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<PluginConfiguration>,
}

/// Status of a Cluster
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    /// Image resolved by the controller for the running instances
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Cluster {
    /// Maximum startup delay in seconds
    pub fn max_start_delay(&self) -> i32 {
        self.spec.max_start_delay.unwrap_or(DEFAULT_MAX_START_DELAY)
    }

    /// Maximum shutdown delay in seconds
    pub fn max_stop_delay(&self) -> i32 {
        self.spec.max_stop_delay.unwrap_or(DEFAULT_MAX_STOP_DELAY)
    }

    /// User id running PostgreSQL
    pub fn postgres_uid(&self) -> i64 {
        self.spec.postgres_uid.unwrap_or(DEFAULT_POSTGRES_UID)
    }

    /// Group id running PostgreSQL
    pub fn postgres_gid(&self) -> i64 {
        self.spec.postgres_gid.unwrap_or(DEFAULT_POSTGRES_GID)
    }

    /// Declared seccomp profile, or `RuntimeDefault`
    pub fn seccomp_profile(&self) -> SeccompProfile {
        self.spec
            .seccomp_profile
            .clone()
            .unwrap_or_else(|| SeccompProfile {
                type_: "RuntimeDefault".to_string(),
                localhost_profile: None,
            })
    }

    /// Whether the metrics endpoint is served over TLS
    pub fn is_metrics_tls_enabled(&self) -> bool {
        self.spec
            .monitoring
            .as_ref()
            .and_then(|m| m.tls.as_ref())
            .is_some_and(|tls| tls.enabled)
    }

    /// Name of the service selecting every instance, ready or not
    pub fn service_any_name(&self) -> String {
        format!("{}-any", self.name_any())
    }

    /// JSON patch to apply to every instance, if one is declared
    pub fn pod_patch(&self) -> Option<&str> {
        self.metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(POD_PATCH_ANNOTATION))
            .map(String::as_str)
            .filter(|patch| !patch.is_empty())
    }

    /// Image the instances run: the one resolved in status, then the declared
    /// one, then `default`
    pub fn resolved_image<'a>(&'a self, default: &'a str) -> &'a str {
        self.status
            .as_ref()
            .and_then(|s| s.image.as_deref())
            .or(self.spec.image_name.as_deref())
            .unwrap_or(default)
    }

    /// Names of the plugins that are not explicitly disabled
    pub fn enabled_plugins(&self) -> Vec<&str> {
        self.spec
            .plugins
            .iter()
            .filter(|p| p.enabled != Some(false))
            .map(|p| p.name.as_str())
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================

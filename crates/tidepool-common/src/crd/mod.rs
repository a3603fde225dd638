//! Custom Resource Definitions for Tidepool
//!
//! The `Cluster` resource and the configuration blocks it embeds.

mod affinity;
mod cluster;
mod probes;

pub use affinity::{AffinityConfiguration, PodAntiAffinityType, DEFAULT_TOPOLOGY_KEY};
pub use cluster::{
    Cluster, ClusterSpec, ClusterStatus, EphemeralVolumesSizeLimit, LogLevel,
    MonitoringConfiguration, PluginConfiguration, StorageConfiguration, TlsConfiguration,
    DEFAULT_MAX_START_DELAY, DEFAULT_MAX_STOP_DELAY, DEFAULT_POSTGRES_GID, DEFAULT_POSTGRES_UID,
};
pub use probes::{ProbeOverride, ProbesConfiguration};

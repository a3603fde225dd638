//! Common types for Tidepool: the Cluster resource, well-known keys, and
//! operator configuration

#![deny(missing_docs)]

pub mod config;
pub mod crd;
pub mod telemetry;

pub use config::{ConfigError, OperatorConfig, Platform, PlatformSecurityPolicy};

/// API group of all Tidepool resources
pub const API_GROUP: &str = "tidepool.dev";

// =============================================================================
// Labels
// =============================================================================

/// Label carrying the name of the cluster an instance belongs to
pub const CLUSTER_LABEL: &str = "tidepool.dev/cluster";

/// Label carrying the instance name
pub const INSTANCE_NAME_LABEL: &str = "tidepool.dev/instanceName";

/// Label carrying the role of a pod inside the cluster
pub const POD_ROLE_LABEL: &str = "tidepool.dev/podRole";

/// Value of [`POD_ROLE_LABEL`] for database instances
pub const POD_ROLE_INSTANCE: &str = "instance";

// =============================================================================
// Annotations
// =============================================================================

/// Annotation carrying the serial number of the instance
pub const CLUSTER_SERIAL_ANNOTATION: &str = "tidepool.dev/nodeSerial";

/// Annotation carrying the hash of the instance environment
pub const POD_ENV_HASH_ANNOTATION: &str = "tidepool.dev/podEnvHash";

/// Annotation carrying the serialized, fully resolved pod spec
pub const POD_SPEC_ANNOTATION: &str = "tidepool.dev/podSpec";

/// Cluster annotation carrying a JSON patch applied to every instance
pub const POD_PATCH_ANNOTATION: &str = "tidepool.dev/podPatch";

/// Key prefix of per-container AppArmor profile annotations
pub const APPARMOR_ANNOTATION_PREFIX: &str = "container.apparmor.security.beta.kubernetes.io/";

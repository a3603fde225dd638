//! Instance pod synthesis for Tidepool clusters
//!
//! Turns a `Cluster` and an instance serial into the exact `Pod` the
//! instance runs as. The base build is pure and deterministic; on top of it
//! the pipeline applies the cluster's JSON patch annotation and an optional
//! lifecycle hook, then stamps the resolved `PodSpec` back onto the pod so
//! later reconciliations can compare against it.
//!
//! # Usage
//!
//! ```rust,ignore
//! let pod = InstanceSynthesizer::new(&cluster, serial, &config, &platform)
//!     .with_status_tls(true)
//!     .with_hook_client(&plugins)
//!     .with_hook_context(HookContext::from_config(&config))
//!     .synthesize()
//!     .await?;
//! ```

pub mod affinity;
pub mod apparmor;
pub mod containers;
pub mod drift;
pub mod env;
pub mod error;
pub mod pod;
pub mod probes;
pub mod security;
pub mod volumes;

mod pipeline;

pub use drift::stored_pod_spec;
pub use env::EnvConfig;
pub use error::{BaseBuildError, InstanceError};
pub use pipeline::hook::{HookContext, HookError, LifecycleHookClient, OperationVerb};
pub use pipeline::patch::apply_pod_patch;
pub use pipeline::InstanceSynthesizer;
pub use pod::{build_instance, instance_name};

/// Name of the PostgreSQL container, always the first main container
pub const POSTGRES_CONTAINER_NAME: &str = "postgres";

/// Name of the init container copying the instance manager
pub const BOOTSTRAP_CONTAINER_NAME: &str = "bootstrap-controller";

/// PostgreSQL server port
pub const POSTGRES_PORT: i32 = 5432;

/// Metrics exporter port
pub const METRICS_PORT: i32 = 9187;

/// Instance manager status port, target of every probe
pub const STATUS_PORT: i32 = 8000;

/// Mount point of the data volume
pub const PG_DATA_MOUNT_PATH: &str = "/var/lib/postgresql/data";

/// PostgreSQL data directory inside the data volume
pub const PG_DATA_PATH: &str = "/var/lib/postgresql/data/pgdata";

/// Mount point of the WAL volume
pub const PG_WAL_MOUNT_PATH: &str = "/var/lib/postgresql/wal";

/// Scratch directory of the instance manager
pub const TEMPORARY_DIRECTORY: &str = "/controller/tmp";

/// Directory holding the PostgreSQL unix socket
pub const SOCKET_DIRECTORY: &str = "/controller/run";

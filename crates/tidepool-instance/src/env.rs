//! Environment of the PostgreSQL container
//!
//! The environment is built once per synthesis call and hashed. The hash is
//! stamped on the pod so the control loop can tell when a running instance
//! was created from a different environment.

use aws_lc_rs::digest::{digest, SHA256};
use k8s_openapi::api::core::v1::{Container, EnvFromSource, EnvVar};
use kube::ResourceExt;
use serde::Serialize;
use tidepool_common::crd::Cluster;
use tidepool_common::OperatorConfig;

use crate::{PG_DATA_PATH, POSTGRES_PORT, SOCKET_DIRECTORY, TEMPORARY_DIRECTORY};

/// Variable carrying the standby TCP user timeout, in milliseconds
pub const STANDBY_TCP_USER_TIMEOUT_ENV: &str = "TIDEPOOL_STANDBY_TCP_USER_TIMEOUT";

/// Environment variables and sources of an instance, with their content hash
#[derive(Clone, Debug, PartialEq)]
pub struct EnvConfig {
    /// Variables in the order they appear in the container
    pub env_vars: Vec<EnvVar>,
    /// Sources in the order they appear in the container
    pub env_from: Vec<EnvFromSource>,
    /// Hex-encoded prefix of the SHA-256 over the variables and sources
    pub hash: String,
}

impl EnvConfig {
    /// Build the environment of instance `pod_name`.
    ///
    /// The built-in variables come first, then the cluster's own variables in
    /// declaration order, then the standby timeout when one is configured.
    pub fn new(cluster: &Cluster, pod_name: &str, config: &OperatorConfig) -> Self {
        let mut env_vars = vec![
            env_var("PGDATA", PG_DATA_PATH),
            env_var("POD_NAME", pod_name),
            env_var("NAMESPACE", &cluster.namespace().unwrap_or_default()),
            env_var("CLUSTER_NAME", &cluster.name_any()),
            env_var("PSQL_HISTORY", &format!("{TEMPORARY_DIRECTORY}/.psql_history")),
            env_var("PGPORT", &POSTGRES_PORT.to_string()),
            env_var("PGHOST", SOCKET_DIRECTORY),
            env_var("TMPDIR", TEMPORARY_DIRECTORY),
        ];
        env_vars.extend(cluster.spec.env.iter().cloned());

        if let Some(timeout) = config.standby_tcp_user_timeout.filter(|t| *t != 0) {
            env_vars.push(env_var(STANDBY_TCP_USER_TIMEOUT_ENV, &timeout.to_string()));
        }

        let env_from = cluster.spec.env_from.clone();
        let hash = compute_env_hash(&env_vars, &env_from);

        Self {
            env_vars,
            env_from,
            hash,
        }
    }

    /// Whether `container` runs with exactly this environment.
    ///
    /// The comparison is order-sensitive: the same variables in a different
    /// order are reported as a difference. A missing list equals an empty one.
    pub fn is_env_equal(&self, container: &Container) -> bool {
        let env = container.env.as_deref().unwrap_or_default();
        let env_from = container.env_from.as_deref().unwrap_or_default();
        env == self.env_vars.as_slice() && env_from == self.env_from.as_slice()
    }
}

fn env_var(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        value_from: None,
    }
}

#[derive(Serialize)]
struct HashInput<'a> {
    env: &'a [EnvVar],
    env_from: &'a [EnvFromSource],
}

/// Hash the ordered environment.
///
/// Uses SHA-256 for FIPS compliance and keeps the first 8 bytes.
fn compute_env_hash(env: &[EnvVar], env_from: &[EnvFromSource]) -> String {
    // Serializing k8s-openapi types to a Vec cannot fail
    let data = serde_json::to_vec(&HashInput { env, env_from }).unwrap_or_default();

    let hash = digest(&SHA256, &data);
    hash.as_ref()
        .iter()
        .take(8)
        .map(|b| format!("{:02x}", b))
        .collect()
}

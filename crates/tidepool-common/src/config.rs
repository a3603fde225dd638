//! Operator configuration and platform facts
//!
//! Both values are computed once by the caller and threaded into every
//! synthesis call; nothing in the engine reads process state on its own.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Default image of the operator (used by the bootstrap init container)
pub const DEFAULT_OPERATOR_IMAGE: &str = "ghcr.io/tidepool/tidepool:latest";

/// Default PostgreSQL image when neither status nor spec name one
pub const DEFAULT_POSTGRES_IMAGE: &str = "ghcr.io/tidepool/postgresql:17";

/// Default bound on a lifecycle hook invocation
pub const DEFAULT_HOOK_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable was set to a value that cannot be parsed
    #[error("invalid value for {key}: {value:?} ({message})")]
    InvalidValue {
        /// Variable name
        key: String,
        /// Raw value
        value: String,
        /// What was expected
        message: String,
    },
}

impl ConfigError {
    fn invalid(key: &str, value: &str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            message: message.into(),
        }
    }
}

/// Process-wide operator configuration
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct OperatorConfig {
    /// Image of the operator, copied into the bootstrap container
    pub operator_image_name: String,

    /// PostgreSQL image used when the cluster does not name one
    pub postgres_image_name: String,

    /// TCP user timeout (milliseconds) for standby connections; unset or zero
    /// leaves the variable out of the instance environment
    pub standby_tcp_user_timeout: Option<u32>,

    /// Give every instance a subdomain under the cluster's `-any` service
    pub create_any_service: bool,

    /// Bound on a single lifecycle hook invocation
    #[serde(with = "duration_secs")]
    pub hook_timeout: Duration,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            operator_image_name: DEFAULT_OPERATOR_IMAGE.to_string(),
            postgres_image_name: DEFAULT_POSTGRES_IMAGE.to_string(),
            standby_tcp_user_timeout: None,
            create_any_service: false,
            hook_timeout: DEFAULT_HOOK_TIMEOUT,
        }
    }
}

impl OperatorConfig {
    /// Load configuration from `TIDEPOOL_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(image) = lookup("TIDEPOOL_OPERATOR_IMAGE_NAME") {
            config.operator_image_name = image;
        }
        if let Some(image) = lookup("TIDEPOOL_POSTGRES_IMAGE_NAME") {
            config.postgres_image_name = image;
        }

        if let Some(raw) = lookup("TIDEPOOL_STANDBY_TCP_USER_TIMEOUT") {
            let timeout: u32 = raw.trim().parse().map_err(|_| {
                ConfigError::invalid(
                    "TIDEPOOL_STANDBY_TCP_USER_TIMEOUT",
                    &raw,
                    "expected a non-negative integer",
                )
            })?;
            config.standby_tcp_user_timeout = (timeout != 0).then_some(timeout);
        }

        if let Some(raw) = lookup("TIDEPOOL_CREATE_ANY_SERVICE") {
            config.create_any_service = parse_bool("TIDEPOOL_CREATE_ANY_SERVICE", &raw)?;
        }

        if let Some(raw) = lookup("TIDEPOOL_HOOK_TIMEOUT_SECONDS") {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                ConfigError::invalid("TIDEPOOL_HOOK_TIMEOUT_SECONDS", &raw, "expected seconds")
            })?;
            config.hook_timeout = Duration::from_secs(secs);
        }

        debug!(?config, "loaded operator configuration");
        Ok(config)
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" | "" => Ok(false),
        _ => Err(ConfigError::invalid(key, raw, "expected a boolean")),
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

// =============================================================================
// Platform
// =============================================================================

/// Whether the platform imposes its own pod security policy
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum PlatformSecurityPolicy {
    /// Pods carry their own security context
    #[default]
    Unrestricted,
    /// The platform injects a mandatory restricted policy (e.g. OpenShift SCCs)
    Restricted,
}

/// Facts about the platform the instances run on
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Platform {
    /// Pod security policy enforcement
    pub security_policy: PlatformSecurityPolicy,

    /// Nodes support AppArmor profiles
    pub apparmor_supported: bool,
}

impl Platform {
    /// Whether the platform supplies the pod security context itself
    pub fn enforces_security_policy(&self) -> bool {
        self.security_policy == PlatformSecurityPolicy::Restricted
    }
}

//! Health probes of the PostgreSQL container

use k8s_openapi::api::core::v1::{HTTPGetAction, Probe};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use tidepool_common::crd::{Cluster, ProbesConfiguration};

use crate::STATUS_PORT;

/// Path of the startup probe
pub const STARTUP_PROBE_PATH: &str = "/startupz";

/// Path of the readiness probe
pub const READINESS_PROBE_PATH: &str = "/readyz";

/// Path of the liveness probe
pub const LIVENESS_PROBE_PATH: &str = "/healthz";

/// Seconds between two executions of a default probe
pub const DEFAULT_PROBE_PERIOD_SECONDS: i32 = 10;

/// Seconds before a default probe times out
pub const DEFAULT_PROBE_TIMEOUT_SECONDS: i32 = 5;

/// Startup, readiness and liveness probes of an instance
#[derive(Clone, Debug, PartialEq)]
pub struct InstanceProbes {
    /// Startup probe
    pub startup: Probe,
    /// Readiness probe
    pub readiness: Probe,
    /// Liveness probe
    pub liveness: Probe,
}

impl Default for InstanceProbes {
    fn default() -> Self {
        Self {
            startup: http_probe(STARTUP_PROBE_PATH),
            readiness: http_probe(READINESS_PROBE_PATH),
            liveness: http_probe(LIVENESS_PROBE_PATH),
        }
    }
}

impl InstanceProbes {
    /// Probes of an instance of `cluster`, with overrides merged and
    /// thresholds resolved
    pub fn for_cluster(cluster: &Cluster, status_tls: bool) -> Self {
        let mut probes = Self::default();
        if status_tls {
            probes.use_https();
        }
        probes.apply_overrides(cluster.spec.probes.as_ref());
        probes.resolve_thresholds(cluster.max_start_delay(), cluster.spec.liveness_probe_timeout);
        probes
    }

    /// Switch every probe to HTTPS
    pub fn use_https(&mut self) {
        for probe in [&mut self.startup, &mut self.readiness, &mut self.liveness] {
            if let Some(http_get) = probe.http_get.as_mut() {
                http_get.scheme = Some("HTTPS".to_string());
            }
        }
    }

    /// Merge the declared overrides into the default probes
    pub fn apply_overrides(&mut self, overrides: Option<&ProbesConfiguration>) {
        let Some(overrides) = overrides else {
            return;
        };
        if let Some(startup) = &overrides.startup {
            startup.apply_into(&mut self.startup);
        }
        if let Some(liveness) = &overrides.liveness {
            liveness.apply_into(&mut self.liveness);
        }
        if let Some(readiness) = &overrides.readiness {
            readiness.apply_into(&mut self.readiness);
        }
    }

    /// Fill in failure thresholds that no override set.
    ///
    /// The startup probe gets enough attempts to cover `max_start_delay`. The
    /// liveness probe is only touched when a liveness timeout is configured.
    pub fn resolve_thresholds(&mut self, max_start_delay: i32, liveness_timeout: Option<i32>) {
        if threshold_unset(&self.startup) {
            self.startup.failure_threshold =
                Some(failure_threshold(max_start_delay, period_of(&self.startup)));
        }

        if let Some(timeout) = liveness_timeout {
            if threshold_unset(&self.liveness) {
                self.liveness.failure_threshold =
                    Some(failure_threshold(timeout, period_of(&self.liveness)));
            }
        }
    }
}

/// Number of failed attempts spaced `period` seconds apart that cover
/// `delay` seconds, and never less than one
pub fn failure_threshold(delay: i32, period: i32) -> i32 {
    let period = i64::from(period.max(1));
    let delay = i64::from(delay);
    if delay <= period {
        return 1;
    }
    i32::try_from((delay + period - 1) / period).unwrap_or(i32::MAX)
}

fn threshold_unset(probe: &Probe) -> bool {
    probe.failure_threshold.unwrap_or(0) == 0
}

fn period_of(probe: &Probe) -> i32 {
    probe
        .period_seconds
        .unwrap_or(DEFAULT_PROBE_PERIOD_SECONDS)
}

fn http_probe(path: &str) -> Probe {
    Probe {
        http_get: Some(HTTPGetAction {
            path: Some(path.to_string()),
            port: IntOrString::Int(STATUS_PORT),
            ..Default::default()
        }),
        period_seconds: Some(DEFAULT_PROBE_PERIOD_SECONDS),
        timeout_seconds: Some(DEFAULT_PROBE_TIMEOUT_SECONDS),
        ..Default::default()
    }
}

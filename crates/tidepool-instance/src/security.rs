//! Pod and container security contexts

use k8s_openapi::api::core::v1::{Capabilities, PodSecurityContext, SeccompProfile, SecurityContext};
use tidepool_common::crd::Cluster;
use tidepool_common::Platform;

/// Pod-level security context, or `None` when the platform supplies its own
pub fn create_pod_security_context(
    seccomp_profile: SeccompProfile,
    user: i64,
    group: i64,
    platform: &Platform,
) -> Option<PodSecurityContext> {
    if platform.enforces_security_policy() {
        return None;
    }

    Some(PodSecurityContext {
        run_as_non_root: Some(true),
        run_as_user: Some(user),
        run_as_group: Some(group),
        fs_group: Some(group),
        seccomp_profile: Some(seccomp_profile),
        ..Default::default()
    })
}

/// Pod-level security context of an instance of `cluster`
pub fn pod_security_context_for(
    cluster: &Cluster,
    platform: &Platform,
) -> Option<PodSecurityContext> {
    create_pod_security_context(
        cluster.seccomp_profile(),
        cluster.postgres_uid(),
        cluster.postgres_gid(),
        platform,
    )
}

/// Container-level security context shared by every instance container
pub fn create_container_security_context(seccomp_profile: SeccompProfile) -> SecurityContext {
    SecurityContext {
        capabilities: Some(Capabilities {
            drop: Some(vec!["ALL".to_string()]),
            add: None,
        }),
        privileged: Some(false),
        run_as_non_root: Some(true),
        read_only_root_filesystem: Some(true),
        allow_privilege_escalation: Some(false),
        seccomp_profile: Some(seccomp_profile),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use tidepool_common::PlatformSecurityPolicy;

    use super::*;
    use crate::test_support::sample_cluster;

    fn localhost_profile() -> SeccompProfile {
        SeccompProfile {
            type_: "Localhost".to_string(),
            localhost_profile: Some("profiles/pg.json".to_string()),
        }
    }

    #[test]
    fn story_restricted_platform_gets_no_pod_context() {
        let platform = Platform {
            security_policy: PlatformSecurityPolicy::Restricted,
            ..Default::default()
        };
        assert!(create_pod_security_context(localhost_profile(), 26, 26, &platform).is_none());
    }

    #[test]
    fn story_unrestricted_platform_runs_as_postgres_ids() {
        let ctx = create_pod_security_context(localhost_profile(), 1001, 1002, &Platform::default())
            .expect("pod security context");

        assert_eq!(ctx.run_as_non_root, Some(true));
        assert_eq!(ctx.run_as_user, Some(1001));
        assert_eq!(ctx.run_as_group, Some(1002));
        assert_eq!(ctx.fs_group, Some(1002));
        assert_eq!(ctx.seccomp_profile, Some(localhost_profile()));
    }

    #[test]
    fn story_cluster_defaults_flow_into_pod_context() {
        let ctx = pod_security_context_for(&sample_cluster(), &Platform::default())
            .expect("pod security context");
        assert_eq!(ctx.run_as_user, Some(26));
        assert_eq!(
            ctx.seccomp_profile.map(|p| p.type_),
            Some("RuntimeDefault".to_string())
        );
    }

    #[test]
    fn story_container_context_is_locked_down() {
        let ctx = create_container_security_context(localhost_profile());

        let caps = ctx.capabilities.expect("capabilities");
        assert_eq!(caps.drop, Some(vec!["ALL".to_string()]));
        assert_eq!(caps.add, None);
        assert_eq!(ctx.privileged, Some(false));
        assert_eq!(ctx.run_as_non_root, Some(true));
        assert_eq!(ctx.read_only_root_filesystem, Some(true));
        assert_eq!(ctx.allow_privilege_escalation, Some(false));
        assert_eq!(ctx.seccomp_profile, Some(localhost_profile()));
    }
}

//! AppArmor profiles declared on the cluster
//!
//! Profiles are declared with the beta annotation
//! `container.apparmor.security.beta.kubernetes.io/<container>: <profile>`
//! on the cluster and copied onto each instance.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::PodSpec;
use kube::ResourceExt;
use tidepool_common::crd::Cluster;
use tidepool_common::{Platform, APPARMOR_ANNOTATION_PREFIX};
use tracing::trace;

use crate::error::BaseBuildError;

/// AppArmor annotations to copy onto an instance with pod spec `spec`.
///
/// Returns nothing when the platform has no AppArmor support. Annotations
/// naming a container the pod does not have are skipped; the others must
/// carry a loadable profile.
pub fn apparmor_annotations(
    cluster: &Cluster,
    spec: &PodSpec,
    platform: &Platform,
) -> Result<BTreeMap<String, String>, BaseBuildError> {
    let mut annotations = BTreeMap::new();
    if !platform.apparmor_supported {
        return Ok(annotations);
    }

    for (key, profile) in cluster.annotations() {
        let Some(container) = key.strip_prefix(APPARMOR_ANNOTATION_PREFIX) else {
            continue;
        };

        if !has_container(spec, container) {
            trace!(container, "skipping AppArmor annotation for container not in pod");
            continue;
        }
        if !is_valid_profile(profile) {
            return Err(BaseBuildError::InvalidAppArmorProfile {
                container: container.to_string(),
                profile: profile.clone(),
            });
        }

        annotations.insert(key.clone(), profile.clone());
    }

    Ok(annotations)
}

fn has_container(spec: &PodSpec, name: &str) -> bool {
    let init = spec.init_containers.iter().flatten();
    init.chain(spec.containers.iter()).any(|c| c.name == name)
}

fn is_valid_profile(profile: &str) -> bool {
    match profile {
        "runtime/default" | "unconfined" => true,
        other => other
            .strip_prefix("localhost/")
            .is_some_and(|name| !name.is_empty()),
    }
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::core::v1::Container;
    use rstest::rstest;

    use super::*;
    use crate::test_support::sample_cluster;

    fn spec() -> PodSpec {
        PodSpec {
            init_containers: Some(vec![Container {
                name: "bootstrap-controller".to_string(),
                ..Default::default()
            }]),
            containers: vec![Container {
                name: "postgres".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn supported() -> Platform {
        Platform {
            apparmor_supported: true,
            ..Default::default()
        }
    }

    fn cluster_with(annotations: &[(&str, &str)]) -> Cluster {
        let mut cluster = sample_cluster();
        for (container, profile) in annotations {
            cluster.annotations_mut().insert(
                format!("{APPARMOR_ANNOTATION_PREFIX}{container}"),
                profile.to_string(),
            );
        }
        cluster
            .annotations_mut()
            .insert("unrelated".to_string(), "x".to_string());
        cluster
    }

    #[rstest]
    #[case::runtime_default("runtime/default", true)]
    #[case::unconfined("unconfined", true)]
    #[case::localhost("localhost/pg-profile", true)]
    #[case::empty_localhost("localhost/", false)]
    #[case::unknown("docker-default", false)]
    #[case::empty("", false)]
    fn profile_validation(#[case] profile: &str, #[case] valid: bool) {
        assert_eq!(is_valid_profile(profile), valid);
    }

    #[test]
    fn story_profiles_are_copied_when_supported() {
        let cluster = cluster_with(&[
            ("postgres", "runtime/default"),
            ("bootstrap-controller", "localhost/boot"),
        ]);

        let annotations =
            apparmor_annotations(&cluster, &spec(), &supported()).expect("valid annotations");

        assert_eq!(annotations.len(), 2);
        assert_eq!(
            annotations.get(&format!("{APPARMOR_ANNOTATION_PREFIX}postgres")),
            Some(&"runtime/default".to_string())
        );
        assert!(!annotations.contains_key("unrelated"));
    }

    #[test]
    fn story_unsupported_platform_ignores_annotations() {
        let cluster = cluster_with(&[("sidecar", "bogus")]);
        let annotations = apparmor_annotations(&cluster, &spec(), &Platform::default())
            .expect("annotations are ignored");
        assert!(annotations.is_empty());
    }

    #[test]
    fn story_annotations_for_absent_containers_are_skipped() {
        let cluster = cluster_with(&[
            ("postgres", "runtime/default"),
            ("exporter", "runtime/default"),
        ]);
        let annotations =
            apparmor_annotations(&cluster, &spec(), &supported()).expect("exporter is skipped");

        assert_eq!(annotations.len(), 1);
        assert!(annotations.contains_key(&format!("{APPARMOR_ANNOTATION_PREFIX}postgres")));
        assert!(!annotations.contains_key(&format!("{APPARMOR_ANNOTATION_PREFIX}exporter")));
    }

    #[test]
    fn story_absent_container_profile_is_not_validated() {
        let cluster = cluster_with(&[("exporter", "docker-default")]);
        let annotations =
            apparmor_annotations(&cluster, &spec(), &supported()).expect("exporter is skipped");
        assert!(annotations.is_empty());
    }

    #[test]
    fn story_invalid_profile_is_rejected() {
        let cluster = cluster_with(&[("postgres", "localhost/")]);
        let err = apparmor_annotations(&cluster, &spec(), &supported())
            .expect_err("empty localhost profile");
        assert!(matches!(err, BaseBuildError::InvalidAppArmorProfile { .. }));
    }
}

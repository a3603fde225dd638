//! Scheduling affinity of an instance
//!
//! A generated anti-affinity rule keeps instances of the same cluster apart;
//! the cluster's own affinity fragments are layered on top of it.

use k8s_openapi::api::core::v1::{
    Affinity, PodAffinityTerm, PodAntiAffinity, WeightedPodAffinityTerm,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};
use tidepool_common::crd::{AffinityConfiguration, PodAntiAffinityType};
use tidepool_common::{CLUSTER_LABEL, POD_ROLE_INSTANCE, POD_ROLE_LABEL};

/// Weight of the generated preferred anti-affinity term
pub const GENERATED_ANTI_AFFINITY_WEIGHT: i32 = 100;

/// Anti-affinity keeping instances of `cluster_name` on distinct topology
/// domains, or `None` when the cluster disabled it
pub fn create_generated_anti_affinity(
    cluster_name: &str,
    config: &AffinityConfiguration,
) -> Option<Affinity> {
    if !config.pod_anti_affinity_enabled() {
        return None;
    }

    let term = PodAffinityTerm {
        label_selector: Some(LabelSelector {
            match_expressions: Some(vec![
                in_requirement(CLUSTER_LABEL, cluster_name),
                in_requirement(POD_ROLE_LABEL, POD_ROLE_INSTANCE),
            ]),
            match_labels: None,
        }),
        topology_key: config.topology_key().to_string(),
        ..Default::default()
    };

    let anti_affinity = match config.anti_affinity_type() {
        PodAntiAffinityType::Required => PodAntiAffinity {
            required_during_scheduling_ignored_during_execution: Some(vec![term]),
            ..Default::default()
        },
        PodAntiAffinityType::Preferred => PodAntiAffinity {
            preferred_during_scheduling_ignored_during_execution: Some(vec![
                WeightedPodAffinityTerm {
                    weight: GENERATED_ANTI_AFFINITY_WEIGHT,
                    pod_affinity_term: term,
                },
            ]),
            ..Default::default()
        },
    };

    Some(Affinity {
        pod_anti_affinity: Some(anti_affinity),
        ..Default::default()
    })
}

/// Full affinity section of an instance of `cluster_name`.
///
/// The additional pod affinity and the node affinity replace whatever was
/// generated. Additional anti-affinity terms are appended after the generated
/// ones. Returns `None` rather than an empty object.
pub fn create_affinity_section(
    cluster_name: &str,
    config: &AffinityConfiguration,
) -> Option<Affinity> {
    let generated = create_generated_anti_affinity(cluster_name, config);

    let has_extensions = config.additional_pod_affinity.is_some()
        || config.additional_pod_anti_affinity.is_some()
        || config.node_affinity.is_some();
    if generated.is_none() && !has_extensions {
        return None;
    }

    let mut affinity = generated.unwrap_or_default();

    if let Some(pod_affinity) = &config.additional_pod_affinity {
        affinity.pod_affinity = Some(pod_affinity.clone());
    }

    if let Some(additional) = &config.additional_pod_anti_affinity {
        let anti_affinity = affinity.pod_anti_affinity.get_or_insert_with(Default::default);
        append_terms(
            &mut anti_affinity.required_during_scheduling_ignored_during_execution,
            &additional.required_during_scheduling_ignored_during_execution,
        );
        append_terms(
            &mut anti_affinity.preferred_during_scheduling_ignored_during_execution,
            &additional.preferred_during_scheduling_ignored_during_execution,
        );
    }

    if let Some(node_affinity) = &config.node_affinity {
        affinity.node_affinity = Some(node_affinity.clone());
    }

    Some(affinity)
}

fn append_terms<T: Clone>(target: &mut Option<Vec<T>>, extra: &Option<Vec<T>>) {
    if let Some(extra) = extra.as_ref().filter(|e| !e.is_empty()) {
        target.get_or_insert_with(Vec::new).extend(extra.iter().cloned());
    }
}

fn in_requirement(key: &str, value: &str) -> LabelSelectorRequirement {
    LabelSelectorRequirement {
        key: key.to_string(),
        operator: "In".to_string(),
        values: Some(vec![value.to_string()]),
    }
}

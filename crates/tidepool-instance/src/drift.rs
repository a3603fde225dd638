//! Reading back the spec stamped on an instance

use k8s_openapi::api::core::v1::{Pod, PodSpec};
use kube::ResourceExt;
use tidepool_common::POD_SPEC_ANNOTATION;

/// The `PodSpec` recorded on `pod` when it was synthesized.
///
/// Returns `None` for pods created before the annotation existed.
pub fn stored_pod_spec(pod: &Pod) -> Result<Option<PodSpec>, serde_json::Error> {
    pod.annotations()
        .get(POD_SPEC_ANNOTATION)
        .map(|raw| serde_json::from_str(raw))
        .transpose()
}

//! Volumes of an instance and where the containers mount them

use k8s_openapi::api::core::v1::{
    EmptyDirVolumeSource, PersistentVolumeClaimVolumeSource, Volume, VolumeMount,
};
use tidepool_common::crd::Cluster;

use crate::{PG_DATA_MOUNT_PATH, PG_WAL_MOUNT_PATH};

/// Data volume, backed by a claim named after the instance
pub const PG_DATA_VOLUME: &str = "pgdata";

/// WAL volume, backed by a claim named `<instance>-wal`
pub const PG_WAL_VOLUME: &str = "pg-wal";

/// Scratch volume shared by the instance manager and PostgreSQL
pub const SCRATCH_DATA_VOLUME: &str = "scratch-data";

/// Memory-backed volume for dynamic shared memory
pub const SHM_VOLUME: &str = "shm";

/// Name of the WAL claim of instance `pod_name`
pub fn wal_claim_name(pod_name: &str) -> String {
    format!("{pod_name}-wal")
}

fn has_wal_storage(cluster: &Cluster) -> bool {
    cluster.spec.wal_storage.is_some()
}

/// Volumes of instance `pod_name`
pub fn create_instance_volumes(cluster: &Cluster, pod_name: &str) -> Vec<Volume> {
    let limits = cluster.spec.ephemeral_volumes_size_limit.as_ref();

    let mut volumes = vec![
        claim_volume(PG_DATA_VOLUME, pod_name),
        Volume {
            name: SCRATCH_DATA_VOLUME.to_string(),
            empty_dir: Some(EmptyDirVolumeSource {
                medium: None,
                size_limit: limits.and_then(|l| l.temporary_data.clone()),
            }),
            ..Default::default()
        },
        Volume {
            name: SHM_VOLUME.to_string(),
            empty_dir: Some(EmptyDirVolumeSource {
                medium: Some("Memory".to_string()),
                size_limit: limits.and_then(|l| l.shm.clone()),
            }),
            ..Default::default()
        },
    ];

    if has_wal_storage(cluster) {
        volumes.push(claim_volume(PG_WAL_VOLUME, &wal_claim_name(pod_name)));
    }

    volumes
}

/// Mounts shared by the bootstrap and PostgreSQL containers
pub fn create_instance_volume_mounts(cluster: &Cluster) -> Vec<VolumeMount> {
    let mut mounts = vec![
        mount(PG_DATA_VOLUME, PG_DATA_MOUNT_PATH),
        mount(SCRATCH_DATA_VOLUME, "/run"),
        mount(SCRATCH_DATA_VOLUME, "/controller"),
        mount(SHM_VOLUME, "/dev/shm"),
    ];

    if has_wal_storage(cluster) {
        mounts.push(mount(PG_WAL_VOLUME, PG_WAL_MOUNT_PATH));
    }

    mounts
}

fn claim_volume(name: &str, claim_name: &str) -> Volume {
    Volume {
        name: name.to_string(),
        persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
            claim_name: claim_name.to_string(),
            read_only: None,
        }),
        ..Default::default()
    }
}

fn mount(name: &str, path: &str) -> VolumeMount {
    VolumeMount {
        name: name.to_string(),
        mount_path: path.to_string(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use tidepool_common::crd::{EphemeralVolumesSizeLimit, StorageConfiguration};

    use super::*;
    use crate::test_support::sample_cluster;

    fn volume_names(volumes: &[Volume]) -> Vec<&str> {
        volumes.iter().map(|v| v.name.as_str()).collect()
    }

    #[test]
    fn story_default_layout_has_no_wal_volume() {
        let cluster = sample_cluster();
        let volumes = create_instance_volumes(&cluster, "pg-1");

        assert_eq!(volume_names(&volumes), vec!["pgdata", "scratch-data", "shm"]);
        let claim = volumes[0]
            .persistent_volume_claim
            .as_ref()
            .expect("data volume is a claim");
        assert_eq!(claim.claim_name, "pg-1");

        let shm = volumes[2].empty_dir.as_ref().expect("shm is an emptyDir");
        assert_eq!(shm.medium.as_deref(), Some("Memory"));
        assert_eq!(shm.size_limit, None);

        let mounts = create_instance_volume_mounts(&cluster);
        let paths: Vec<_> = mounts
            .iter()
            .map(|m| (m.name.as_str(), m.mount_path.as_str()))
            .collect();
        assert_eq!(
            paths,
            vec![
                ("pgdata", "/var/lib/postgresql/data"),
                ("scratch-data", "/run"),
                ("scratch-data", "/controller"),
                ("shm", "/dev/shm"),
            ]
        );
    }

    #[test]
    fn story_wal_storage_adds_claim_and_mount() {
        let mut cluster = sample_cluster();
        cluster.spec.wal_storage = Some(StorageConfiguration {
            size: Some("1Gi".to_string()),
            storage_class: None,
        });

        let volumes = create_instance_volumes(&cluster, "pg-2");
        let wal = volumes.last().expect("wal volume");
        assert_eq!(wal.name, PG_WAL_VOLUME);
        assert_eq!(
            wal.persistent_volume_claim.as_ref().map(|c| c.claim_name.as_str()),
            Some("pg-2-wal")
        );

        let mounts = create_instance_volume_mounts(&cluster);
        let last = mounts.last().expect("wal mount");
        assert_eq!(last.mount_path, PG_WAL_MOUNT_PATH);
    }

    #[test]
    fn story_size_limits_are_applied() {
        let mut cluster = sample_cluster();
        cluster.spec.ephemeral_volumes_size_limit = Some(EphemeralVolumesSizeLimit {
            shm: Some(Quantity("256Mi".to_string())),
            temporary_data: Some(Quantity("1Gi".to_string())),
        });

        let volumes = create_instance_volumes(&cluster, "pg-1");
        let scratch = volumes[1].empty_dir.as_ref().expect("scratch emptyDir");
        let shm = volumes[2].empty_dir.as_ref().expect("shm emptyDir");
        assert_eq!(scratch.size_limit, Some(Quantity("1Gi".to_string())));
        assert_eq!(shm.size_limit, Some(Quantity("256Mi".to_string())));
    }
}

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the import decision engine.

#[cfg(test)]
mod tests {
    use crate::crd::{ClusterDeployment, ClusterDeploymentSpec};
    use crate::import::{decide_import, is_offline, parse_bool, ImportDecision};
    use crate::import_errors::ImportError;
    use crate::testing::{
        managed_cluster, secret, with_available, with_labels, with_unknown_availability,
        FakeStore,
    };

    fn cluster_deployment(name: &str) -> ClusterDeployment {
        let mut cd = ClusterDeployment::new(
            name,
            ClusterDeploymentSpec {
                cluster_name: name.to_string(),
                ..Default::default()
            },
        );
        cd.metadata.namespace = Some(name.to_string());
        cd
    }

    #[test]
    fn test_offline_unless_available_true() {
        assert!(is_offline(&managed_cluster("c1")));
        assert!(is_offline(&with_available(managed_cluster("c1"), Some(false))));
        assert!(is_offline(&with_unknown_availability(managed_cluster("c1"))));
        assert!(!is_offline(&with_available(managed_cluster("c1"), Some(true))));
    }

    #[test]
    fn test_offline_without_status() {
        let mut cluster = managed_cluster("c1");
        cluster.status = None;
        assert!(is_offline(&cluster));
    }

    #[test]
    fn test_parse_bool_forms() {
        for v in ["1", "t", "T", "TRUE", "true", "True"] {
            assert_eq!(parse_bool(v), Some(true), "{v}");
        }
        for v in ["0", "f", "F", "FALSE", "false", "False"] {
            assert_eq!(parse_bool(v), Some(false), "{v}");
        }
        assert_eq!(parse_bool("yes"), None);
        assert_eq!(parse_bool(""), None);
    }

    #[tokio::test]
    async fn test_self_managed_label_performs_no_lookups() {
        let store = FakeStore::new();
        store.insert(cluster_deployment("c1"));
        store.insert(secret("c1", "auto-import-secret", &[("token", "t")]));
        let cluster = with_labels(managed_cluster("c1"), &[("local-cluster", "true")]);

        let decision = decide_import(&store, &cluster).await.unwrap();

        assert!(matches!(decision, ImportDecision::SelfManaged(true)));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_self_managed_false_overrides_other_evidence() {
        let store = FakeStore::new();
        store.insert(cluster_deployment("c1"));
        let cluster = with_labels(managed_cluster("c1"), &[("local-cluster", "false")]);

        let decision = decide_import(&store, &cluster).await.unwrap();

        assert!(matches!(decision, ImportDecision::SelfManaged(false)));
        assert!(!decision.should_import());
    }

    #[tokio::test]
    async fn test_malformed_self_managed_label_is_fatal() {
        let store = FakeStore::new();
        store.insert(cluster_deployment("c1"));
        let cluster = with_labels(managed_cluster("c1"), &[("local-cluster", "maybe")]);

        let err = decide_import(&store, &cluster).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ImportError>(),
            Some(ImportError::MalformedSelfManagedLabel { .. })
        ));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cluster_deployment_wins_over_retry_secret() {
        let store = FakeStore::new();
        store.insert(cluster_deployment("c1"));
        store.insert(secret("c1", "auto-import-secret", &[("token", "t")]));

        let decision = decide_import(&store, &managed_cluster("c1")).await.unwrap();

        match decision {
            ImportDecision::ExternallyProvisioned(cd) => {
                assert_eq!(cd.metadata.name.as_deref(), Some("c1"));
            }
            other => panic!("unexpected decision {other:?}"),
        }
        assert_eq!(store.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_retry_secret_selected_when_no_deployment() {
        let store = FakeStore::new();
        store.insert(secret("c1", "auto-import-secret", &[("token", "t")]));

        let decision = decide_import(&store, &managed_cluster("c1")).await.unwrap();

        assert!(matches!(decision, ImportDecision::AutoImportCandidate(_)));
        assert!(decision.should_import());
    }

    #[tokio::test]
    async fn test_no_evidence_declines() {
        let store = FakeStore::new();

        let decision = decide_import(&store, &managed_cluster("c1")).await.unwrap();

        assert!(matches!(decision, ImportDecision::NoImport));
        assert!(!decision.should_import());
        assert_eq!(store.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_deployment_lookup_failure_is_fatal() {
        let store = FakeStore::new();
        store.fail_on::<ClusterDeployment>(crate::testing::Verb::Get);
        store.insert(secret("c1", "auto-import-secret", &[("token", "t")]));

        assert!(decide_import(&store, &managed_cluster("c1")).await.is_err());
        assert_eq!(store.calls().len(), 1);
    }

    #[test]
    fn test_awaiting_install_only_for_uninstalled_deployment() {
        let deployment = |installed| {
            ClusterDeployment::new(
                "c1",
                ClusterDeploymentSpec {
                    installed,
                    ..Default::default()
                },
            )
        };

        assert!(ImportDecision::ExternallyProvisioned(deployment(false)).awaiting_install());
        assert!(!ImportDecision::ExternallyProvisioned(deployment(true)).awaiting_install());
        assert!(!ImportDecision::SelfManaged(true).awaiting_install());
        assert!(!ImportDecision::NoImport.awaiting_install());
    }
}

// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `watch.rs`

#[cfg(test)]
mod tests {
    use crate::crd::{ManifestWork, ManifestWorkSpec, ManifestsTemplate};
    use crate::watch::{manifest_work_spec, owning_cluster, SpecChangeFilter};
    use kube::runtime::watcher::Event;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn work(namespace: &str, manifests: Vec<serde_json::Value>) -> ManifestWork {
        let mut work = ManifestWork::new(
            &format!("{namespace}-klusterlet"),
            ManifestWorkSpec {
                workload: ManifestsTemplate { manifests },
            },
        );
        work.metadata.namespace = Some(namespace.to_string());
        work
    }

    fn filter() -> SpecChangeFilter<ManifestWork, fn(&ManifestWork) -> serde_json::Value> {
        SpecChangeFilter::new(manifest_work_spec as fn(&ManifestWork) -> serde_json::Value)
    }

    fn names(admitted: &[ManifestWork]) -> Vec<String> {
        admitted
            .iter()
            .map(|w| w.metadata.namespace.clone().unwrap_or_default())
            .collect()
    }

    #[test]
    fn test_initial_listing_is_ignored() {
        let mut filter = filter();

        assert!(filter.admit(Event::Init).is_empty());
        assert!(filter
            .admit(Event::InitApply(work("c1", vec![json!({"kind": "A"})])))
            .is_empty());
        assert!(filter.admit(Event::InitDone).is_empty());
        assert_eq!(filter.tracked(), 1);
    }

    #[test]
    fn test_creation_is_ignored() {
        let mut filter = filter();

        assert!(filter.admit(Event::Apply(work("c1", vec![]))).is_empty());
        assert_eq!(filter.tracked(), 1);
    }

    #[test]
    fn test_metadata_only_update_is_ignored() {
        let mut filter = filter();
        let original = work("c1", vec![json!({"kind": "A"})]);
        filter.admit(Event::InitApply(original.clone()));

        let mut relabeled = original;
        relabeled.metadata.labels = Some(BTreeMap::from([("x".to_string(), "y".to_string())]));
        relabeled.metadata.resource_version = Some("42".to_string());

        assert!(filter.admit(Event::Apply(relabeled)).is_empty());
    }

    #[test]
    fn test_status_update_is_ignored() {
        let mut filter = filter();
        let original = work("c1", vec![json!({"kind": "A"})]);
        filter.admit(Event::Apply(original.clone()));

        let mut reported = original;
        reported.status = Some(Default::default());

        assert!(filter.admit(Event::Apply(reported)).is_empty());
    }

    #[test]
    fn test_spec_change_is_admitted_once() {
        let mut filter = filter();
        filter.admit(Event::InitApply(work("c1", vec![json!({"kind": "A"})])));

        let edited = work("c1", vec![json!({"kind": "B"})]);
        let admitted = filter.admit(Event::Apply(edited.clone()));

        assert_eq!(admitted.len(), 1);
        assert_eq!(admitted[0].spec, edited.spec);
        assert!(filter.admit(Event::Apply(edited)).is_empty());
    }

    #[test]
    fn test_deletion_is_admitted_and_forgotten() {
        let mut filter = filter();
        let existing = work("c1", vec![]);
        filter.admit(Event::InitApply(existing.clone()));

        assert_eq!(filter.admit(Event::Delete(existing.clone())).len(), 1);
        assert_eq!(filter.tracked(), 0);

        // Recreated afterwards: a creation again
        assert!(filter.admit(Event::Apply(existing)).is_empty());
    }

    #[test]
    fn test_deletion_of_unknown_object_is_admitted() {
        let mut filter = filter();

        assert_eq!(filter.admit(Event::Delete(work("c9", vec![]))).len(), 1);
    }

    #[test]
    fn test_objects_tracked_independently() {
        let mut filter = filter();
        filter.admit(Event::InitApply(work("c1", vec![])));
        filter.admit(Event::InitApply(work("c2", vec![])));

        assert_eq!(
            names(&filter.admit(Event::Apply(work("c2", vec![json!({"kind": "B"})])))),
            vec!["c2".to_string()]
        );
        assert!(filter.admit(Event::Apply(work("c1", vec![]))).is_empty());
    }

    #[test]
    fn test_relist_admits_spec_changed_during_gap() {
        let mut filter = filter();
        filter.admit(Event::Init);
        filter.admit(Event::InitApply(work("c1", vec![json!({"kind": "A"})])));
        filter.admit(Event::InitDone);

        assert!(filter.admit(Event::Init).is_empty());
        let admitted = filter.admit(Event::InitApply(work("c1", vec![json!({"kind": "B"})])));
        assert!(filter.admit(Event::InitDone).is_empty());

        assert_eq!(names(&admitted), vec!["c1".to_string()]);
    }

    #[test]
    fn test_relist_ignores_unchanged_and_new_objects() {
        let mut filter = filter();
        filter.admit(Event::Init);
        filter.admit(Event::InitApply(work("c1", vec![])));
        filter.admit(Event::InitDone);

        filter.admit(Event::Init);
        assert!(filter.admit(Event::InitApply(work("c1", vec![]))).is_empty());
        assert!(filter.admit(Event::InitApply(work("c2", vec![]))).is_empty());
        assert!(filter.admit(Event::InitDone).is_empty());
        assert_eq!(filter.tracked(), 2);
    }

    #[test]
    fn test_relist_admits_deletions_missed_during_gap() {
        let mut filter = filter();
        filter.admit(Event::Init);
        filter.admit(Event::InitApply(work("c1", vec![])));
        filter.admit(Event::InitApply(work("c2", vec![])));
        filter.admit(Event::InitDone);

        filter.admit(Event::Init);
        filter.admit(Event::InitApply(work("c2", vec![])));
        let deleted = filter.admit(Event::InitDone);

        assert_eq!(names(&deleted), vec!["c1".to_string()]);
        assert_eq!(filter.tracked(), 1);
    }

    #[test]
    fn test_relist_with_everything_gone_forgets_all() {
        let mut filter = filter();
        filter.admit(Event::InitApply(work("c1", vec![json!({"kind": "A"})])));

        filter.admit(Event::Init);
        assert_eq!(filter.admit(Event::InitDone).len(), 1);
        assert_eq!(filter.tracked(), 0);

        // Recreated after the gap with another spec: a creation, not an update
        assert!(filter
            .admit(Event::Apply(work("c1", vec![json!({"kind": "B"})])))
            .is_empty());
    }

    #[test]
    fn test_owning_cluster_is_named_after_namespace() {
        let owner = owning_cluster(&work("prod-east", vec![])).unwrap();

        assert_eq!(owner.name, "prod-east");
        assert_eq!(owner.namespace, None);
    }

    #[test]
    fn test_work_without_namespace_has_no_owner() {
        let mut orphan = work("c1", vec![]);
        orphan.metadata.namespace = None;

        assert!(owning_cluster(&orphan).is_none());
    }
}

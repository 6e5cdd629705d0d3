//! Duplicate-identity reconciliation
//!
//! When the host duplicates an entity it disambiguates the copy's name with a
//! numeric suffix ("Foo" -> "Foo.001"), and the copy may or may not inherit the
//! original's UID. This pass groups top-level entities by base name, picks an
//! original per group and brings the rest of the group in line with it.
//!
//! It runs on low-frequency lifecycle events only and is linear in the number
//! of entities: one pass to group, one pass per group.

use crate::uid::{generate_uid, Uid};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// A host entity that has a display name and may carry a UID
pub trait NamedEntity {
    fn name(&self) -> &str;

    fn uid(&self) -> Option<Uid>;

    fn set_uid(&mut self, uid: Uid);
}

/// Split the host's numeric disambiguation suffix off a name.
///
/// `"Material.001"` gives `("Material", Some(1))`, `"Material"` gives
/// `("Material", None)`. Only an all-digit tail after the last `.` counts.
pub fn split_base_name(name: &str) -> (&str, Option<u64>) {
    match name.rsplit_once('.') {
        Some((base, suffix))
            if !base.is_empty()
                && !suffix.is_empty()
                && suffix.bytes().all(|b| b.is_ascii_digit()) =>
        {
            (base, Some(suffix.parse().unwrap_or(u64::MAX)))
        }
        _ => (name, None),
    }
}

/// One entity inside a [`DuplicateGroup`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMember {
    /// Position of the entity in the slice being reconciled
    pub index: usize,
    pub name: String,
    /// Numeric suffix, `None` for the bare base name
    pub suffix: Option<u64>,
    pub uid: Option<Uid>,
}

impl GroupMember {
    /// Text of the suffix, used to order "Mat.1" against "Mat.001"
    pub fn suffix_text(&self) -> &str {
        match self.suffix {
            Some(_) => self.name.rsplit_once('.').map_or("", |(_, tail)| tail),
            None => "",
        }
    }
}

/// Entities sharing a base name. Transient: built for one pass, never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub base_name: String,
    pub members: Vec<GroupMember>,
}

impl DuplicateGroup {
    pub fn has_unsuffixed_member(&self) -> bool {
        self.members.iter().any(|m| m.suffix.is_none())
    }
}

/// Result of classifying a group: positions into [`DuplicateGroup::members`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub original: usize,
    /// Remaining members, best candidate first
    pub others: Vec<usize>,
}

/// Decides which member of a duplicate group is the original
pub trait DuplicateClassifier {
    fn classify(&self, group: &DuplicateGroup) -> Classification;
}

impl<F> DuplicateClassifier for F
where
    F: Fn(&DuplicateGroup) -> Classification,
{
    fn classify(&self, group: &DuplicateGroup) -> Classification {
        self(group)
    }
}

/// The host naming heuristic: the unsuffixed member is the original, else
/// the lowest suffix (then suffix text, then host order).
#[derive(Debug, Clone, Copy, Default)]
pub struct NameSuffixClassifier;

impl DuplicateClassifier for NameSuffixClassifier {
    fn classify(&self, group: &DuplicateGroup) -> Classification {
        let mut ranked: Vec<usize> = (0..group.members.len()).collect();
        ranked.sort_by(|&a, &b| {
            let (a, b) = (&group.members[a], &group.members[b]);
            (a.suffix.is_some(), a.suffix, a.suffix_text(), a.index).cmp(&(
                b.suffix.is_some(),
                b.suffix,
                b.suffix_text(),
                b.index,
            ))
        });

        let original = ranked.first().copied().unwrap_or(0);
        Classification {
            original,
            others: ranked.into_iter().skip(1).collect(),
        }
    }
}

/// What to do with group members whose UID differs from the original's
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Treat every group member as a copy of the original and give it the
    /// original's UID
    #[default]
    ShareOriginal,

    /// Treat name collisions as unrelated entities: existing UIDs are left
    /// alone and only missing ones are filled in
    KeepDistinct,
}

/// Counts from one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub entities: usize,
    pub groups: usize,
    /// Groups with more than one member
    pub duplicate_groups: usize,
    /// Entities that had no UID and received one
    pub backfilled: usize,
    /// Entities whose existing UID was overwritten with the original's
    pub rewritten: usize,
    /// Groups whose original carries a suffix (the bare name is gone)
    pub promoted_originals: usize,
}

impl ReconcileReport {
    pub fn changed(&self) -> usize {
        self.backfilled + self.rewritten
    }
}

/// Runs the reconciliation pass with a configurable policy and classifier
pub struct Reconciler {
    policy: DuplicatePolicy,
    classifier: Box<dyn DuplicateClassifier + Send + Sync>,
    generate: fn() -> Uid,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reconciler {
    pub fn new() -> Self {
        Self {
            policy: DuplicatePolicy::default(),
            classifier: Box::new(NameSuffixClassifier),
            generate: generate_uid,
        }
    }

    pub fn with_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_classifier<C>(mut self, classifier: C) -> Self
    where
        C: DuplicateClassifier + Send + Sync + 'static,
    {
        self.classifier = Box::new(classifier);
        self
    }

    pub fn with_uid_source(mut self, generate: fn() -> Uid) -> Self {
        self.generate = generate;
        self
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// Reconcile UIDs across `entities`. Never fails; a second run over the
    /// result changes nothing.
    pub fn reconcile<E: NamedEntity>(&self, entities: &mut [E]) -> ReconcileReport {
        let groups = group_by_base_name(entities);
        let mut report = ReconcileReport {
            entities: entities.len(),
            groups: groups.len(),
            ..Default::default()
        };

        let mut updates: Vec<(usize, Uid)> = Vec::new();
        for group in &groups {
            self.plan_group(group, &mut updates, &mut report);
        }

        for (index, uid) in updates {
            if let Some(entity) = entities.get_mut(index) {
                debug!("Setting UID of {:?} to {}", entity.name(), uid);
                entity.set_uid(uid);
            }
        }

        info!(
            "Reconciled {} entities in {} groups: {} backfilled, {} rewritten",
            report.entities, report.groups, report.backfilled, report.rewritten
        );
        report
    }

    fn plan_group(
        &self,
        group: &DuplicateGroup,
        updates: &mut Vec<(usize, Uid)>,
        report: &mut ReconcileReport,
    ) {
        if let [only] = group.members.as_slice() {
            if only.uid.is_none() {
                updates.push((only.index, (self.generate)()));
                report.backfilled += 1;
            }
            return;
        }

        report.duplicate_groups += 1;
        if !group.has_unsuffixed_member() {
            report.promoted_originals += 1;
        }

        let classification = self.checked_classification(group);
        let original = &group.members[classification.original];
        let others: Vec<&GroupMember> = classification
            .others
            .iter()
            .map(|&position| &group.members[position])
            .collect();

        let original_uid = match (&original.uid, self.policy) {
            (Some(uid), _) => uid.clone(),
            (None, policy) => {
                let inherited = match policy {
                    DuplicatePolicy::ShareOriginal => {
                        others.iter().find_map(|member| member.uid.clone())
                    }
                    DuplicatePolicy::KeepDistinct => None,
                };
                let uid = inherited.unwrap_or_else(self.generate);
                updates.push((original.index, uid.clone()));
                report.backfilled += 1;
                uid
            }
        };

        for member in others {
            match (self.policy, &member.uid) {
                (DuplicatePolicy::ShareOriginal, Some(uid)) if uid == &original_uid => {}
                (DuplicatePolicy::ShareOriginal, Some(_)) => {
                    updates.push((member.index, original_uid.clone()));
                    report.rewritten += 1;
                }
                (DuplicatePolicy::ShareOriginal, None) => {
                    updates.push((member.index, original_uid.clone()));
                    report.backfilled += 1;
                }
                (DuplicatePolicy::KeepDistinct, Some(_)) => {}
                (DuplicatePolicy::KeepDistinct, None) => {
                    updates.push((member.index, (self.generate)()));
                    report.backfilled += 1;
                }
            }
        }
    }

    /// Run the classifier, falling back to the name heuristic if it returns
    /// positions outside the group. Members it does not mention are left alone.
    fn checked_classification(&self, group: &DuplicateGroup) -> Classification {
        let len = group.members.len();
        let classification = self.classifier.classify(group);
        if classification.original >= len {
            warn!(
                "Classifier picked member {} of {} in group {:?}; using name heuristic",
                classification.original, len, group.base_name
            );
            return NameSuffixClassifier.classify(group);
        }

        let original = classification.original;
        let mut seen = vec![false; len];
        seen[original] = true;
        let others = classification
            .others
            .into_iter()
            .filter(|&position| position < len && !std::mem::replace(&mut seen[position], true))
            .collect();

        Classification { original, others }
    }
}

/// Reconcile with the default policy and name heuristic
pub fn reconcile_duplicates<E: NamedEntity>(entities: &mut [E]) -> ReconcileReport {
    Reconciler::default().reconcile(entities)
}

/// Group entities by base name, keeping groups in order of first appearance
pub fn group_by_base_name<E: NamedEntity>(entities: &[E]) -> Vec<DuplicateGroup> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<DuplicateGroup> = Vec::new();

    for (index, entity) in entities.iter().enumerate() {
        let name = entity.name();
        let (base, suffix) = split_base_name(name);
        let member = GroupMember {
            index,
            name: name.to_string(),
            suffix,
            uid: entity.uid(),
        };

        match positions.get(base) {
            Some(&position) => groups[position].members.push(member),
            None => {
                positions.insert(base.to_string(), groups.len());
                groups.push(DuplicateGroup {
                    base_name: base.to_string(),
                    members: vec![member],
                });
            }
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Material {
        name: String,
        uid: Option<Uid>,
    }

    impl NamedEntity for Material {
        fn name(&self) -> &str {
            &self.name
        }

        fn uid(&self) -> Option<Uid> {
            self.uid.clone()
        }

        fn set_uid(&mut self, uid: Uid) {
            self.uid = Some(uid);
        }
    }

    fn materials(specs: &[(&str, Option<&str>)]) -> Vec<Material> {
        specs
            .iter()
            .map(|(name, uid)| Material {
                name: name.to_string(),
                uid: uid.and_then(Uid::from_persisted),
            })
            .collect()
    }

    fn uid_of(materials: &[Material], index: usize) -> &str {
        materials[index].uid.as_ref().map_or("", |uid| uid.as_str())
    }

    #[test]
    fn test_split_base_name() {
        assert_eq!(split_base_name("Material.001"), ("Material", Some(1)));
        assert_eq!(split_base_name("Material"), ("Material", None));
        assert_eq!(split_base_name("Mat.v2"), ("Mat.v2", None));
        assert_eq!(split_base_name("Mat.v2.010"), ("Mat.v2", Some(10)));
        assert_eq!(split_base_name("Mat."), ("Mat.", None));
        assert_eq!(split_base_name(".001"), (".001", None));
        assert_eq!(split_base_name("Material1"), ("Material1", None));
    }

    #[test]
    fn test_duplicates_share_original_uid() {
        let mut mats = materials(&[
            ("Material", Some("u0")),
            ("Material.001", Some("u1")),
            ("Material.002", Some("u2")),
        ]);

        let report = reconcile_duplicates(&mut mats);

        assert_eq!(uid_of(&mats, 0), "u0");
        assert_eq!(uid_of(&mats, 1), "u0");
        assert_eq!(uid_of(&mats, 2), "u0");
        assert_eq!(report.rewritten, 2);
        assert_eq!(report.duplicate_groups, 1);
    }

    #[test]
    fn test_lowest_suffix_becomes_original() {
        let mut mats = materials(&[("Mat.007", Some("ub")), ("Mat.003", Some("ua"))]);

        let report = reconcile_duplicates(&mut mats);

        assert_eq!(uid_of(&mats, 0), "ua");
        assert_eq!(uid_of(&mats, 1), "ua");
        assert_eq!(report.promoted_originals, 1);
    }

    #[test]
    fn test_second_run_is_a_fixpoint() {
        let mut mats = materials(&[
            ("Wood", None),
            ("Wood.001", Some("w1")),
            ("Metal.004", None),
            ("Metal.002", None),
            ("Glass", None),
            ("Stone", Some("s0")),
        ]);

        let first = reconcile_duplicates(&mut mats);
        assert!(first.changed() > 0);
        let snapshot: Vec<Option<Uid>> = mats.iter().map(|m| m.uid.clone()).collect();

        let second = reconcile_duplicates(&mut mats);
        assert_eq!(second.changed(), 0);
        let after: Vec<Option<Uid>> = mats.iter().map(|m| m.uid.clone()).collect();
        assert_eq!(snapshot, after);
    }

    #[test]
    fn test_original_without_uid_inherits_from_duplicate() {
        let mut mats = materials(&[("Wood", None), ("Wood.001", Some("w1"))]);

        reconcile_duplicates(&mut mats);

        assert_eq!(uid_of(&mats, 0), "w1");
        assert_eq!(uid_of(&mats, 1), "w1");
    }

    #[test]
    fn test_group_without_any_uid_gets_one_fresh_uid() {
        let mut mats = materials(&[("Metal.004", None), ("Metal.002", None)]);

        let report = reconcile_duplicates(&mut mats);

        let shared = mats[1].uid.clone().unwrap();
        assert!(shared.is_well_formed());
        assert_eq!(mats[0].uid, Some(shared));
        assert_eq!(report.backfilled, 2);
    }

    #[test]
    fn test_unrelated_names_keep_their_uids() {
        let mut mats = materials(&[
            ("Material1", Some("aaaaaaaaaa")),
            ("Material2", Some("bbbbbbbbbb")),
            ("Material3", Some("cccccccccc")),
        ]);

        let report = reconcile_duplicates(&mut mats);

        assert_eq!(report.changed(), 0);
        assert_eq!(report.duplicate_groups, 0);
        assert_eq!(uid_of(&mats, 2), "cccccccccc");
    }

    #[test]
    fn test_singletons_are_backfilled() {
        let mut mats = materials(&[("Glass", None), ("Stone", Some(""))]);

        let report = reconcile_duplicates(&mut mats);

        assert!(mats.iter().all(|m| m.uid.as_ref().is_some_and(Uid::is_well_formed)));
        assert_ne!(mats[0].uid, mats[1].uid);
        assert_eq!(report.backfilled, 2);
    }

    #[test]
    fn test_keep_distinct_policy() {
        let mut mats = materials(&[
            ("Material", Some("u0")),
            ("Material.001", Some("u1")),
            ("Material.002", None),
        ]);

        let report = Reconciler::new()
            .with_policy(DuplicatePolicy::KeepDistinct)
            .reconcile(&mut mats);

        assert_eq!(uid_of(&mats, 0), "u0");
        assert_eq!(uid_of(&mats, 1), "u1");
        let fresh = mats[2].uid.clone().unwrap();
        assert!(fresh.is_well_formed());
        assert_eq!(report.rewritten, 0);
        assert_eq!(report.backfilled, 1);
    }

    #[test]
    fn test_custom_classifier() {
        // Prefer the highest suffix as the original
        let newest_wins = |group: &DuplicateGroup| {
            let mut ranked: Vec<usize> = (0..group.members.len()).collect();
            ranked.sort_by_key(|&i| std::cmp::Reverse(group.members[i].suffix.unwrap_or(0)));
            Classification {
                original: ranked[0],
                others: ranked[1..].to_vec(),
            }
        };

        let mut mats = materials(&[
            ("Material", Some("u0")),
            ("Material.001", Some("u1")),
            ("Material.002", Some("u2")),
        ]);

        Reconciler::new().with_classifier(newest_wins).reconcile(&mut mats);

        assert!(mats.iter().all(|m| m.uid.as_ref().map(Uid::as_str) == Some("u2")));
    }

    #[test]
    fn test_out_of_range_classifier_falls_back() {
        let broken = |_: &DuplicateGroup| Classification {
            original: 99,
            others: vec![],
        };
        let mut mats = materials(&[("Material.001", Some("u1")), ("Material", Some("u0"))]);

        Reconciler::new().with_classifier(broken).reconcile(&mut mats);

        assert_eq!(uid_of(&mats, 0), "u0");
        assert_eq!(uid_of(&mats, 1), "u0");
    }

    #[test]
    fn test_empty_input() {
        let mut mats: Vec<Material> = Vec::new();
        assert_eq!(reconcile_duplicates(&mut mats), ReconcileReport::default());
    }

    #[test]
    fn test_group_by_base_name_keeps_first_appearance_order() {
        let mats = materials(&[("B.001", None), ("A", None), ("B", None)]);
        let groups = group_by_base_name(&mats);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].base_name, "B");
        assert_eq!(groups[0].members.len(), 2);
        assert_eq!(groups[1].base_name, "A");
    }

    #[test]
    fn test_suffix_text_breaks_numeric_ties() {
        let mut mats = materials(&[("Mat.1", Some("u1")), ("Mat.001", Some("u001"))]);

        reconcile_duplicates(&mut mats);

        // "001" sorts before "1"
        assert_eq!(uid_of(&mats, 0), "u001");
        assert_eq!(uid_of(&mats, 1), "u001");
    }
}

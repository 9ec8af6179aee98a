//! Merge fresh user intent with the last-known representation
//!
//! Intent is re-read from disk on every create/update and knows nothing about
//! what the server computed. This module carries those computed fields over so
//! the encoder sees stable reference ids and the untouched other-group list.

use std::collections::HashSet;

use tracing::{debug, warn};

use super::{GroupKind, Perspective};

/// Build the model for an update from `intent` plus `last_known` computed fields
///
/// **Carried over:**
/// - group `ref_id` when intent omits it (matched by name, first unclaimed match)
/// - categorize `dynamic_groups` for the matched group
/// - `other_groups` whose `blk_id` still resolves in the merged groups
/// - the reference-id watermark (never decreases)
pub fn merge_computed(intent: &Perspective, last_known: &Perspective) -> Perspective {
    let mut merged = intent.clone();
    let mut claimed = vec![false; last_known.groups.len()];

    // Ids the user wrote down claim their prior group before any name matching
    for group in &merged.groups {
        if let Some(id) = group.ref_id() {
            if let Some(idx) = last_known.groups.iter().position(|g| g.ref_id() == Some(id)) {
                claimed[idx] = true;
            }
        }
    }

    for group in &mut merged.groups {
        let prior_idx = match group.ref_id() {
            Some(id) => last_known.groups.iter().position(|g| g.ref_id() == Some(id)),
            None => {
                let idx = last_known
                    .groups
                    .iter()
                    .enumerate()
                    .position(|(i, g)| !claimed[i] && g.name == group.name);
                if let Some(i) = idx {
                    claimed[i] = true;
                }
                idx
            }
        };

        let Some(prior) = prior_idx.map(|i| &last_known.groups[i]) else {
            debug!(group = %group.name, "No prior state for group");
            continue;
        };

        if group.ref_id().is_none() {
            group.ref_id = prior.ref_id().map(str::to_string);
        }

        if let (
            GroupKind::Categorize { dynamic_groups },
            GroupKind::Categorize {
                dynamic_groups: prior_dynamic,
            },
        ) = (&mut group.kind, &prior.kind)
        {
            if dynamic_groups.is_empty() {
                *dynamic_groups = prior_dynamic.clone();
            }
        }
    }

    let live: HashSet<&str> = merged.groups.iter().filter_map(|g| g.ref_id()).collect();
    let other_groups: Vec<_> = last_known
        .other_groups
        .iter()
        .filter(|entry| match entry.blk_id() {
            Some(blk_id) if !live.contains(blk_id) => {
                warn!(
                    blk_id = %blk_id,
                    "Dropping other_group entry whose owning group was removed"
                );
                false
            }
            _ => true,
        })
        .cloned()
        .collect();
    merged.other_groups = other_groups;

    merged.ref_id_watermark = intent.ref_id_watermark.max(last_known.ref_id_watermark);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Condition, DynamicGroup, Group, OtherGroupEntry, Rule};

    fn other_entry(ref_id: &str, blk_id: &str) -> OtherGroupEntry {
        serde_json::from_value(serde_json::json!({
            "constant_type": "Dynamic Group Block",
            "ref_id": ref_id,
            "blk_id": blk_id,
            "name": "Other",
            "is_other": "true"
        }))
        .unwrap()
    }

    fn last_known() -> Perspective {
        let mut env = Group::categorize("Environment").with_ref_id("20");
        env.kind = GroupKind::Categorize {
            dynamic_groups: vec![DynamicGroup {
                ref_id: Some("21".into()),
                name: Some("prod".into()),
                val: Some("prod".into()),
            }],
        };
        let mut p = Perspective::new("Cost by Team", true)
            .with_group(Group::filter("Team", vec![Rule::new("AwsInstance")]).with_ref_id("10"))
            .with_group(env);
        p.other_groups.push(other_entry("30", "20"));
        p.ref_id_watermark = 30;
        p
    }

    #[test]
    fn test_carries_ref_ids_and_dynamic_groups_by_name() {
        let intent = Perspective::new("Cost by Team", true)
            .with_group(Group::categorize("Environment"))
            .with_group(Group::filter(
                "Team",
                vec![Rule::new("AwsInstance").with_condition(Condition::tag(["Team"], "=", "infra"))],
            ));

        let merged = merge_computed(&intent, &last_known());

        assert_eq!(merged.groups[0].ref_id(), Some("20"));
        assert_eq!(merged.groups[0].kind.dynamic_groups().len(), 1);
        assert_eq!(merged.groups[1].ref_id(), Some("10"));
        // Authored rules come from intent
        assert_eq!(merged.groups[1].kind.rules()[0].conditions.len(), 1);
        assert_eq!(merged.other_groups.len(), 1);
        assert_eq!(merged.ref_id_watermark, 30);
    }

    #[test]
    fn test_drops_other_groups_of_removed_group() {
        let intent = Perspective::new("Cost by Team", true)
            .with_group(Group::filter("Team", vec![Rule::new("AwsInstance")]));

        let merged = merge_computed(&intent, &last_known());

        assert_eq!(merged.groups.len(), 1);
        assert!(merged.other_groups.is_empty());
    }

    #[test]
    fn test_type_change_does_not_carry_dynamic_groups() {
        let intent = Perspective::new("Cost by Team", true)
            .with_group(Group::filter("Environment", vec![Rule::new("AwsInstance")]));

        let merged = merge_computed(&intent, &last_known());

        assert_eq!(merged.groups[0].ref_id(), Some("20"));
        assert!(merged.groups[0].kind.dynamic_groups().is_empty());
    }

    #[test]
    fn test_explicit_ref_id_is_not_duplicated_by_name_match() {
        // "Team" explicitly takes the id that "Environment" held before
        let intent = Perspective::new("Cost by Team", true)
            .with_group(Group::filter("Team", vec![Rule::new("AwsInstance")]).with_ref_id("20"))
            .with_group(Group::categorize("Environment"));

        let merged = merge_computed(&intent, &last_known());

        assert_eq!(merged.groups[0].ref_id(), Some("20"));
        assert_eq!(merged.groups[1].ref_id(), None);
    }

    #[test]
    fn test_duplicate_names_pair_in_order() {
        let prior = Perspective::new("P", false)
            .with_group(Group::categorize("Dup").with_ref_id("1"))
            .with_group(Group::categorize("Dup").with_ref_id("2"));
        let intent = Perspective::new("P", false)
            .with_group(Group::categorize("Dup"))
            .with_group(Group::categorize("Dup"))
            .with_group(Group::categorize("Dup"));

        let merged = merge_computed(&intent, &prior);

        assert_eq!(merged.groups[0].ref_id(), Some("1"));
        assert_eq!(merged.groups[1].ref_id(), Some("2"));
        assert_eq!(merged.groups[2].ref_id(), None);
    }
}

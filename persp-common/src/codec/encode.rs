//! Model -> server JSON

use std::collections::HashMap;

use tracing::debug;

use super::ref_ids;
use super::wire::{non_empty, WireCondition, WireGroup, WirePerspective, WireRule};
use crate::model::{Condition, Group, GroupKind, Perspective, Rule};
use crate::{Error, Result};

/// Encode a perspective as the server's schema JSON
///
/// **Algorithm:**
/// 1. Validate structure (rule assets, duplicate ref ids, `blk_id` links)
/// 2. Assign ref ids to groups lacking one (mutates `perspective` in place)
/// 3. Emit groups in order: filter groups with their rules, categorize groups bare
/// 4. Pass `other_group` through unchanged
///
/// Nothing is mutated unless encoding succeeds up to serialization.
pub fn encode(perspective: &mut Perspective) -> Result<Vec<u8>> {
    validate(perspective)?;
    let assigned = ref_ids::assign_missing(perspective)?;

    debug!(
        perspective = %perspective.name,
        groups = perspective.groups.len(),
        assigned = assigned.len(),
        other_groups = perspective.other_groups.len(),
        "Encoding perspective"
    );

    let wire = WirePerspective {
        name: perspective.name.clone(),
        include_in_reports: Some(perspective.include_in_reports),
        group: non_empty(perspective.groups.iter().map(encode_group).collect()),
        other_group: Some(perspective.other_groups.clone()),
    };

    serde_json::to_vec(&wire).map_err(|e| Error::malformed("$", e.to_string()))
}

fn validate(perspective: &Perspective) -> Result<()> {
    let mut seen: HashMap<&str, usize> = HashMap::new();

    for (g, group) in perspective.groups.iter().enumerate() {
        if let Some(id) = group.ref_id() {
            if let Some(first) = seen.insert(id, g) {
                return Err(Error::malformed(
                    format!("group[{}].ref_id", g),
                    format!("`{}` already used by group[{}]", id, first),
                ));
            }
        }

        for (r, rule) in group.kind.rules().iter().enumerate() {
            if rule.asset.trim().is_empty() {
                return Err(Error::malformed(
                    format!("group[{}].rule[{}].asset", g, r),
                    format!("rule of filter group `{}` has no asset", group.name),
                ));
            }
        }
    }

    // New groups have no id yet, so a link can only point at an existing one
    for (o, entry) in perspective.other_groups.iter().enumerate() {
        if let Some(blk_id) = entry.blk_id() {
            if !seen.contains_key(blk_id) {
                return Err(Error::malformed(
                    format!("other_group[{}].blk_id", o),
                    format!("`{}` does not match any group ref_id", blk_id),
                ));
            }
        }
    }

    Ok(())
}

fn encode_group(group: &Group) -> WireGroup {
    // Dynamic groups are derived server-side and never sent back
    let rule = match &group.kind {
        GroupKind::Filter { rules } => non_empty(rules.iter().map(encode_rule).collect()),
        GroupKind::Categorize { .. } => None,
    };

    WireGroup {
        name: Some(group.name.clone()),
        ref_id: group.ref_id().map(str::to_string),
        group_type: Some(group.group_type().as_str().to_string()),
        rule,
        dynamic_group: None,
    }
}

fn encode_rule(rule: &Rule) -> WireRule {
    WireRule {
        asset: Some(rule.asset.clone()),
        tag_field: non_empty(rule.tag_field.clone()),
        field: non_empty(rule.field.clone()),
        combine_with: rule.combine_with.clone(),
        condition: non_empty(rule.conditions.iter().map(encode_condition).collect()),
    }
}

fn encode_condition(condition: &Condition) -> WireCondition {
    WireCondition {
        tag_field: non_empty(condition.tag_field.clone()),
        field: non_empty(condition.field.clone()),
        op: Some(condition.op.clone()),
        val: condition.val.clone(),
    }
}

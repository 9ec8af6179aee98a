//! Server JSON -> model

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use tracing::debug;

use super::ref_ids;
use super::wire::{WireCondition, WireGroup, WirePerspective, WireRule};
use crate::model::{Condition, Group, GroupKind, GroupType, Perspective, Rule, DEFAULT_OP};
use crate::{Error, Result};

/// Key the live API wraps perspective documents in
const SCHEMA_ENVELOPE: &str = "schema";

/// Decode a server payload into the configuration model
///
/// Order of groups, rules and conditions is taken verbatim from the payload.
/// Dynamic groups and other-group entries are kept as received; the watermark
/// is set to the largest numeric id in the document.
pub fn decode(bytes: &[u8]) -> Result<Perspective> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| Error::unparseable("$", format!("invalid JSON: {}", e)))?;
    let value = unwrap_envelope(value);

    match value.get("name") {
        Some(Value::String(_)) => {}
        Some(other) => {
            return Err(Error::unparseable("name", format!("expected string, got {}", other)))
        }
        None => return Err(Error::unparseable("name", "missing required key")),
    }

    let wire: WirePerspective = serde_path_to_error::deserialize(value).map_err(|e| {
        let path = match e.path().to_string() {
            root if root == "." => "$".to_string(),
            path => path,
        };
        Error::unparseable(path, e.into_inner().to_string())
    })?;

    let groups = wire
        .group
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(g, group)| decode_group(g, group))
        .collect::<Result<Vec<_>>>()?;

    let mut perspective = Perspective {
        name: wire.name,
        include_in_reports: wire.include_in_reports.unwrap_or(false),
        groups,
        other_groups: wire.other_group.unwrap_or_default(),
        ref_id_watermark: 0,
    };

    check_links(&perspective)?;
    perspective.ref_id_watermark = ref_ids::highest_numeric(&perspective);

    debug!(
        perspective = %perspective.name,
        groups = perspective.groups.len(),
        other_groups = perspective.other_groups.len(),
        "Decoded perspective"
    );

    Ok(perspective)
}

fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut map) if !map.contains_key("name") && map.contains_key(SCHEMA_ENVELOPE) => {
            map.remove(SCHEMA_ENVELOPE).unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn decode_group(g: usize, group: WireGroup) -> Result<Group> {
    let name = group
        .name
        .ok_or_else(|| Error::unparseable(format!("group[{}].name", g), "missing required key"))?;

    let group_type = match group.group_type.as_deref() {
        None => GroupType::Filter,
        Some(raw) => GroupType::parse(raw).ok_or_else(|| {
            Error::unparseable(
                format!("group[{}].type", g),
                format!("unknown group type `{}`", raw),
            )
        })?,
    };

    let kind = match group_type {
        GroupType::Filter => {
            if group.dynamic_group.as_ref().is_some_and(|d| !d.is_empty()) {
                debug!(group = %name, "Ignoring dynamic_group entries on filter group");
            }
            let rules = group
                .rule
                .unwrap_or_default()
                .into_iter()
                .enumerate()
                .map(|(r, rule)| decode_rule(g, r, rule))
                .collect::<Result<Vec<_>>>()?;
            GroupKind::Filter { rules }
        }
        GroupType::Categorize => {
            if group.rule.as_ref().is_some_and(|r| !r.is_empty()) {
                debug!(group = %name, "Ignoring rule entries on categorize group");
            }
            GroupKind::Categorize {
                dynamic_groups: group.dynamic_group.unwrap_or_default(),
            }
        }
    };

    Ok(Group {
        name,
        ref_id: group.ref_id,
        kind,
    })
}

fn decode_rule(g: usize, r: usize, rule: WireRule) -> Result<Rule> {
    let asset = rule
        .asset
        .filter(|a| !a.trim().is_empty())
        .ok_or_else(|| {
            Error::unparseable(format!("group[{}].rule[{}].asset", g, r), "missing required key")
        })?;

    Ok(Rule {
        asset,
        tag_field: rule.tag_field.unwrap_or_default(),
        field: rule.field.unwrap_or_default(),
        combine_with: rule.combine_with,
        conditions: rule
            .condition
            .unwrap_or_default()
            .into_iter()
            .map(decode_condition)
            .collect(),
    })
}

fn decode_condition(condition: WireCondition) -> Condition {
    Condition {
        tag_field: condition.tag_field.unwrap_or_default(),
        field: condition.field.unwrap_or_default(),
        op: condition.op.unwrap_or_else(|| DEFAULT_OP.to_string()),
        val: condition.val,
    }
}

/// Group ref ids must be unique and every `blk_id` must name one of them
fn check_links(perspective: &Perspective) -> Result<()> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for (g, group) in perspective.groups.iter().enumerate() {
        if let Some(id) = group.ref_id() {
            if let Some(first) = seen.insert(id, g) {
                return Err(Error::unparseable(
                    format!("group[{}].ref_id", g),
                    format!("`{}` already used by group[{}]", id, first),
                ));
            }
        }
    }

    let group_ids: HashSet<&str> = seen.into_keys().collect();
    for (o, entry) in perspective.other_groups.iter().enumerate() {
        if let Some(blk_id) = entry.blk_id() {
            if !group_ids.contains(blk_id) {
                return Err(Error::unparseable(
                    format!("other_group[{}].blk_id", o),
                    format!("`{}` does not match any group ref_id", blk_id),
                ));
            }
        }
    }

    Ok(())
}

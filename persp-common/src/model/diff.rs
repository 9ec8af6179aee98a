//! Drift detection between intent and a remote perspective
//!
//! Only user-authored fields are compared. Dynamic groups, other-group entries
//! and server-assigned ref ids never show up as drift, so refreshing right
//! after a write reports nothing.

use super::{Group, Perspective, Rule};

/// List differences in user-authored fields, in document order
pub fn authored_diff(intent: &Perspective, remote: &Perspective) -> Vec<String> {
    let mut changes = Vec::new();

    if intent.name != remote.name {
        changes.push(format!("name: {:?} -> {:?}", remote.name, intent.name));
    }
    if intent.include_in_reports != remote.include_in_reports {
        changes.push(format!(
            "include_in_reports: {} -> {}",
            remote.include_in_reports, intent.include_in_reports
        ));
    }

    let shared = intent.groups.len().min(remote.groups.len());
    for i in 0..shared {
        diff_group(i, &intent.groups[i], &remote.groups[i], &mut changes);
    }
    for (i, group) in intent.groups.iter().enumerate().skip(shared) {
        changes.push(format!("group[{}]: add {:?}", i, group.name));
    }
    for (i, group) in remote.groups.iter().enumerate().skip(shared) {
        changes.push(format!("group[{}]: remove {:?}", i, group.name));
    }

    changes
}

fn diff_group(index: usize, intent: &Group, remote: &Group, changes: &mut Vec<String>) {
    let path = format!("group[{}]", index);

    if intent.name != remote.name {
        changes.push(format!("{}.name: {:?} -> {:?}", path, remote.name, intent.name));
    }
    if intent.group_type() != remote.group_type() {
        changes.push(format!(
            "{}.type: {} -> {}",
            path,
            remote.group_type(),
            intent.group_type()
        ));
        return;
    }
    // An omitted ref_id means "whatever the server has"
    if let Some(id) = intent.ref_id() {
        if remote.ref_id() != Some(id) {
            changes.push(format!(
                "{}.ref_id: {:?} -> {:?}",
                path,
                remote.ref_id().unwrap_or(""),
                id
            ));
        }
    }

    diff_rules(&path, intent.kind.rules(), remote.kind.rules(), changes);
}

fn diff_rules(path: &str, intent: &[Rule], remote: &[Rule], changes: &mut Vec<String>) {
    if intent.len() != remote.len() {
        changes.push(format!(
            "{}.rule: {} rule(s) -> {} rule(s)",
            path,
            remote.len(),
            intent.len()
        ));
        return;
    }
    for (i, (mine, theirs)) in intent.iter().zip(remote).enumerate() {
        if mine != theirs {
            changes.push(format!("{}.rule[{}]: changed", path, i));
        }
    }
}

//! Configuration model for perspectives
//!
//! In-memory tree of user intent plus the server-computed entries that ride
//! along with it. The same serde shape is used for hand-authored TOML intent
//! and for the JSON state file, so block names follow the server's wire names
//! (`group`, `rule`, `condition`, `dynamic_group`, `other_group`).
//!
//! # Ownership
//!
//! - **User-authored**: perspective name, `include_in_reports`, groups, rules, conditions
//! - **Server-computed**: `DynamicGroup` entries of categorize groups, `OtherGroupEntry` list
//! - **Either**: group `ref_id` (assigned by the encoder when absent, then stable)

mod diff;
mod merge;

pub use diff::authored_diff;
pub use merge::merge_computed;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Default comparison operator for conditions
pub const DEFAULT_OP: &str = "=";

/// Root entity: a named classification schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Perspective {
    pub name: String,

    pub include_in_reports: bool,

    /// Groups in evaluation/display order
    #[serde(rename = "group", default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<Group>,

    /// Server-maintained catch-all entries (never authored locally)
    #[serde(rename = "other_group", default, skip_serializing_if = "Vec::is_empty")]
    pub other_groups: Vec<OtherGroupEntry>,

    /// Highest numeric reference id ever observed or handed out.
    ///
    /// Not part of the wire document; persisted with local state so freed ids
    /// are never reissued to a different group.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub ref_id_watermark: u64,
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

impl Perspective {
    pub fn new(name: impl Into<String>, include_in_reports: bool) -> Self {
        Self {
            name: name.into(),
            include_in_reports,
            groups: Vec::new(),
            other_groups: Vec::new(),
            ref_id_watermark: 0,
        }
    }

    /// Builder-style helper for appending a group
    pub fn with_group(mut self, group: Group) -> Self {
        self.groups.push(group);
        self
    }

    /// Lookup table from `ref_id` to group, built on demand
    pub fn groups_by_ref_id(&self) -> HashMap<&str, &Group> {
        self.groups
            .iter()
            .filter_map(|g| g.ref_id().map(|id| (id, g)))
            .collect()
    }

    /// Find the group owning `ref_id`
    pub fn group_by_ref_id(&self, ref_id: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.ref_id() == Some(ref_id))
    }

    /// Copy of this perspective with server-computed content removed.
    ///
    /// What the encoder actually sends: dynamic groups and the watermark do
    /// not survive a trip through the wire document.
    pub fn authored(&self) -> Perspective {
        let mut copy = self.clone();
        for group in &mut copy.groups {
            if let GroupKind::Categorize { dynamic_groups } = &mut group.kind {
                dynamic_groups.clear();
            }
        }
        copy.ref_id_watermark = 0;
        copy
    }
}

/// Group discriminator as it appears in the `type` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupType {
    #[default]
    Filter,
    Categorize,
}

impl GroupType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupType::Filter => "filter",
            GroupType::Categorize => "categorize",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "filter" => Some(GroupType::Filter),
            "categorize" => Some(GroupType::Categorize),
            _ => None,
        }
    }
}

impl std::fmt::Display for GroupType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type-specific content of a group
///
/// Filter groups carry authored rules; categorize groups carry the dynamic
/// groups the server enumerated. Neither shape can hold the other's content.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupKind {
    Filter { rules: Vec<Rule> },
    Categorize { dynamic_groups: Vec<DynamicGroup> },
}

impl GroupKind {
    pub fn group_type(&self) -> GroupType {
        match self {
            GroupKind::Filter { .. } => GroupType::Filter,
            GroupKind::Categorize { .. } => GroupType::Categorize,
        }
    }

    pub fn rules(&self) -> &[Rule] {
        match self {
            GroupKind::Filter { rules } => rules,
            GroupKind::Categorize { .. } => &[],
        }
    }

    pub fn dynamic_groups(&self) -> &[DynamicGroup] {
        match self {
            GroupKind::Filter { .. } => &[],
            GroupKind::Categorize { dynamic_groups } => dynamic_groups,
        }
    }
}

/// A named classification bucket within a perspective
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GroupRecord", into = "GroupRecord")]
pub struct Group {
    pub name: String,
    pub ref_id: Option<String>,
    pub kind: GroupKind,
}

impl Group {
    pub fn filter(name: impl Into<String>, rules: Vec<Rule>) -> Self {
        Self {
            name: name.into(),
            ref_id: None,
            kind: GroupKind::Filter { rules },
        }
    }

    pub fn categorize(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ref_id: None,
            kind: GroupKind::Categorize {
                dynamic_groups: Vec::new(),
            },
        }
    }

    pub fn with_ref_id(mut self, ref_id: impl Into<String>) -> Self {
        self.ref_id = Some(ref_id.into());
        self
    }

    /// Assigned reference id; blank ids count as unassigned
    pub fn ref_id(&self) -> Option<&str> {
        self.ref_id.as_deref().filter(|id| !id.trim().is_empty())
    }

    pub fn group_type(&self) -> GroupType {
        self.kind.group_type()
    }
}

/// Flat serde shape of a group, shared by TOML intent and JSON state
#[derive(Debug, Clone, Serialize, Deserialize)]
struct GroupRecord {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ref_id: Option<String>,
    #[serde(rename = "type", default)]
    group_type: GroupType,
    #[serde(rename = "rule", default, skip_serializing_if = "Vec::is_empty")]
    rules: Vec<Rule>,
    #[serde(rename = "dynamic_group", default, skip_serializing_if = "Vec::is_empty")]
    dynamic_groups: Vec<DynamicGroup>,
}

impl TryFrom<GroupRecord> for Group {
    type Error = String;

    fn try_from(record: GroupRecord) -> std::result::Result<Self, Self::Error> {
        let kind = match record.group_type {
            GroupType::Filter => {
                if !record.dynamic_groups.is_empty() {
                    return Err(format!(
                        "filter group `{}` cannot carry dynamic_group entries",
                        record.name
                    ));
                }
                GroupKind::Filter {
                    rules: record.rules,
                }
            }
            GroupType::Categorize => {
                if !record.rules.is_empty() {
                    return Err(format!(
                        "categorize group `{}` cannot carry rule blocks",
                        record.name
                    ));
                }
                GroupKind::Categorize {
                    dynamic_groups: record.dynamic_groups,
                }
            }
        };

        Ok(Group {
            name: record.name,
            ref_id: record.ref_id,
            kind,
        })
    }
}

impl From<Group> for GroupRecord {
    fn from(group: Group) -> Self {
        let group_type = group.group_type();
        let (rules, dynamic_groups) = match group.kind {
            GroupKind::Filter { rules } => (rules, Vec::new()),
            GroupKind::Categorize { dynamic_groups } => (Vec::new(), dynamic_groups),
        };
        GroupRecord {
            name: group.name,
            ref_id: group.ref_id,
            group_type,
            rules,
            dynamic_groups,
        }
    }
}

/// A single inclusion condition-set within a filter group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Asset type the rule applies to (e.g. `AwsInstance`)
    pub asset: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tag_field: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub field: Vec<String>,

    /// Combinator for `conditions` (e.g. `AND`, `OR`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub combine_with: Option<String>,

    #[serde(rename = "condition", default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl Rule {
    pub fn new(asset: impl Into<String>) -> Self {
        Self {
            asset: asset.into(),
            tag_field: Vec::new(),
            field: Vec::new(),
            combine_with: None,
            conditions: Vec::new(),
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }
}

/// A leaf predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tag_field: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub field: Vec<String>,

    #[serde(default = "default_op")]
    pub op: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub val: Option<String>,
}

fn default_op() -> String {
    DEFAULT_OP.to_string()
}

impl Condition {
    /// Condition on a native field path
    pub fn field<I, S>(path: I, op: impl Into<String>, val: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tag_field: Vec::new(),
            field: path.into_iter().map(Into::into).collect(),
            op: op.into(),
            val: Some(val.into()),
        }
    }

    /// Condition on a tag path
    pub fn tag<I, S>(path: I, op: impl Into<String>, val: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tag_field: path.into_iter().map(Into::into).collect(),
            field: Vec::new(),
            op: op.into(),
            val: Some(val.into()),
        }
    }
}

/// Server-computed leaf under a categorize group, round-tripped opaquely
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub val: Option<String>,
}

/// Server-maintained catch-all classification
///
/// Held as the raw JSON object the server sent so it goes back out exactly as
/// received: explicit `null`s, non-string scalars and unknown keys included.
/// Only `ref_id` and `blk_id` are ever interpreted, and only when they are
/// strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OtherGroupEntry(pub Map<String, Value>);

impl OtherGroupEntry {
    pub fn ref_id(&self) -> Option<&str> {
        self.str_field("ref_id")
    }

    /// `ref_id` of the owning group
    pub fn blk_id(&self) -> Option<&str> {
        self.str_field("blk_id")
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }
}

impl From<Map<String, Value>> for OtherGroupEntry {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

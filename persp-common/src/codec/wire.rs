//! Server-facing JSON shapes
//!
//! Every array is optional: absent and `null` decode as empty, and the encoder
//! omits empty arrays instead of sending `[]` (except `other_group`).

use serde::{Deserialize, Serialize};

use crate::model::{DynamicGroup, OtherGroupEntry};

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct WirePerspective {
    pub name: String,
    #[serde(default)]
    pub include_in_reports: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<Vec<WireGroup>>,
    #[serde(default)]
    pub other_group: Option<Vec<OtherGroupEntry>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct WireGroup {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub group_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<Vec<WireRule>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic_group: Option<Vec<DynamicGroup>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct WireRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_field: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub combine_with: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Vec<WireCondition>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct WireCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_field: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub val: Option<String>,
}

/// `Some(vec)` for non-empty input, `None` otherwise
pub(crate) fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

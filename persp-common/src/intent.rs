//! Loading hand-authored perspective intent from TOML
//!
//! ```toml
//! name = "Cost by Team"
//! include_in_reports = true
//!
//! [[group]]
//! name = "Team"
//! type = "filter"
//!
//! [[group.rule]]
//! asset = "AwsInstance"
//!
//! [[group.rule.condition]]
//! tag_field = ["Team"]
//! op = "="
//! val = "infra"
//! ```
//!
//! Server-owned content (`other_group`, `dynamic_group`) is rejected here:
//! it only ever arrives by decoding a server response.

use std::path::Path;

use crate::model::Perspective;
use crate::{Error, Result};

/// Parse intent from TOML text
pub fn parse_intent(content: &str) -> Result<Perspective> {
    let intent: Perspective =
        toml::from_str(content).map_err(|e| Error::malformed("$", e.to_string()))?;

    if !intent.other_groups.is_empty() {
        return Err(Error::malformed(
            "other_group",
            "other_group entries are maintained by the server and cannot be authored",
        ));
    }

    for (g, group) in intent.groups.iter().enumerate() {
        if !group.kind.dynamic_groups().is_empty() {
            return Err(Error::malformed(
                format!("group[{}].dynamic_group", g),
                "dynamic groups are computed by the server and cannot be authored",
            ));
        }
    }

    if intent.ref_id_watermark != 0 {
        return Err(Error::malformed(
            "ref_id_watermark",
            "watermark is tracked in local state and cannot be authored",
        ));
    }

    Ok(intent)
}

/// Read and parse an intent file
pub fn load_intent(path: &Path) -> Result<Perspective> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read intent {} failed: {}", path.display(), e)))?;
    parse_intent(&content).map_err(|e| match e {
        Error::MalformedConfig { path: field, reason } => Error::MalformedConfig {
            path: format!("{}:{}", path.display(), field),
            reason,
        },
        other => other,
    })
}

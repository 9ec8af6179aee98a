//! Reference-identifier allocation
//!
//! Ids are decimal strings. A new group gets one more than the largest numeric
//! id seen anywhere in the document or recorded in the perspective's watermark,
//! walking groups in order. Allocation is therefore deterministic for a given
//! input, and since the watermark only grows, an id freed by deleting a group
//! is never handed to a different group later.

use std::collections::HashSet;

use tracing::debug;

use crate::model::Perspective;
use crate::{Error, Result};

/// Every id present in the document: group, dynamic-group and other-group
/// ref ids plus other-group `blk_id` links
pub fn referenced_ids(perspective: &Perspective) -> impl Iterator<Item = &str> {
    let groups = perspective.groups.iter().filter_map(|g| g.ref_id());
    let dynamic = perspective
        .groups
        .iter()
        .flat_map(|g| g.kind.dynamic_groups())
        .filter_map(|d| d.ref_id.as_deref());
    let others = perspective
        .other_groups
        .iter()
        .flat_map(|o| [o.ref_id(), o.blk_id()])
        .flatten();

    groups.chain(dynamic).chain(others)
}

/// Largest id in the document that parses as a plain decimal number
pub fn highest_numeric(perspective: &Perspective) -> u64 {
    referenced_ids(perspective)
        .filter_map(parse_numeric)
        .max()
        .unwrap_or(0)
}

fn parse_numeric(id: &str) -> Option<u64> {
    let id = id.trim();
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    id.parse().ok()
}

/// Hands out fresh ids for one perspective
#[derive(Debug)]
pub struct RefIdAllocator {
    taken: HashSet<String>,
    last: u64,
}

impl RefIdAllocator {
    pub fn for_perspective(perspective: &Perspective) -> Self {
        let taken = referenced_ids(perspective)
            .map(|id| id.trim().to_string())
            .collect();
        let last = highest_numeric(perspective).max(perspective.ref_id_watermark);
        Self { taken, last }
    }

    /// Next unused id
    ///
    /// A collision here means the allocator itself is broken; it is reported
    /// as `MalformedConfig` rather than silently skipped.
    pub fn allocate(&mut self) -> Result<String> {
        let next = self.last.checked_add(1).ok_or_else(|| {
            Error::malformed("ref_id", "reference id space exhausted")
        })?;
        let id = next.to_string();
        if !self.taken.insert(id.clone()) {
            return Err(Error::malformed(
                "ref_id",
                format!("allocated ref_id `{}` collides with an existing id", id),
            ));
        }
        self.last = next;
        Ok(id)
    }

    /// Highest id observed or allocated so far
    pub fn watermark(&self) -> u64 {
        self.last
    }
}

/// Assign ids to every group lacking one, in group order
///
/// All ids are allocated before the model is touched, so a failure leaves
/// `perspective` unchanged. Returns `(group index, id)` for each assignment.
pub fn assign_missing(perspective: &mut Perspective) -> Result<Vec<(usize, String)>> {
    let mut allocator = RefIdAllocator::for_perspective(perspective);

    let mut assigned = Vec::new();
    for (index, group) in perspective.groups.iter().enumerate() {
        if group.ref_id().is_none() {
            assigned.push((index, allocator.allocate()?));
        }
    }

    for (index, id) in &assigned {
        let group = &mut perspective.groups[*index];
        debug!(group = %group.name, ref_id = %id, "Assigned ref_id");
        group.ref_id = Some(id.clone());
    }
    perspective.ref_id_watermark = allocator.watermark();

    Ok(assigned)
}

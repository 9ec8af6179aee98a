//! Perspective codec
//!
//! Translates between the configuration model and the server's perspective
//! schema JSON. Pure data transformation: no I/O, no shared state.
//!
//! - [`encode`] assigns missing group ref ids in place, then serializes
//! - [`decode`] parses a server payload back into the model
//!
//! Field names on the wire are fixed:
//!
//! ```text
//! name, include_in_reports,
//! group[].{name, ref_id, type, rule[], dynamic_group[]}
//! rule[].{asset, tag_field[], field[], combine_with, condition[]}
//! condition[].{tag_field[], field[], op, val}
//! other_group[].{constant_type, ref_id, blk_id, name, val, is_other}
//! ```

mod decode;
mod encode;
pub mod ref_ids;
mod wire;

pub use decode::decode;
pub use encode::encode;

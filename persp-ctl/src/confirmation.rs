//! Parsing the server's create confirmation
//!
//! A successful POST answers with plain text like `Perspective 4821 created`;
//! the digits are the perspective's external id.

use once_cell::sync::Lazy;
use persp_common::{Error, Result};
use regex::Regex;

static CREATED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Perspective (\d+) created").expect("confirmation pattern is valid"));

/// Extract the external id from a create confirmation
pub fn parse_created_id(body: &str) -> Result<String> {
    CREATED
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|id| id.as_str().to_string())
        .ok_or_else(|| {
            Error::unparseable(
                "confirmation",
                format!("created perspective but could not extract id from: {}", body),
            )
        })
}

/// External ids are decimal numbers; anything else never reaches the API
pub fn validate_external_id(id: &str) -> Result<()> {
    if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Perspective id `{}` is not a decimal number",
            id
        )))
    }
}

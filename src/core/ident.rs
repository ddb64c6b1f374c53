//! Opaque 24-hex-character identifiers.
//!
//! Every entity in the system (accounts, transactions, monthly totals, line
//! items, payments) is keyed by a 24-character lowercase hex string, the
//! shape the upstream document store hands out. New ids are minted from the
//! leading twelve bytes of a v4 UUID, which keeps them unguessable without
//! needing a coordinated sequence.

use crate::errors::{Error, Result};
use std::fmt::Write;
use uuid::Uuid;

/// Length of every entity identifier in this crate.
pub const OBJECT_ID_LEN: usize = 24;

/// Mints a fresh 24-hex-character identifier.
#[must_use]
pub fn new_object_id() -> String {
    let uuid = Uuid::new_v4();
    let mut id = String::with_capacity(OBJECT_ID_LEN);
    for byte in &uuid.as_bytes()[..OBJECT_ID_LEN / 2] {
        // Writing to a String cannot fail.
        let _ = write!(id, "{byte:02x}");
    }
    id
}

/// Validates an identifier supplied by a caller or loaded from storage.
pub fn ensure_object_id(field: &str, id: &str) -> Result<()> {
    if id.len() != OBJECT_ID_LEN || !id.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::validation(format!(
            "{field} must be a {OBJECT_ID_LEN}-character hex identifier, got {id:?}"
        )));
    }
    Ok(())
}

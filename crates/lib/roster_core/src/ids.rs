//! Entity ids.
//!
//! Ids are UUIDv7, minted app-side so both stores hand out time-ordered ids.
//! Ids arrive from clients as strings; anything that does not parse names
//! nothing.

use uuid::Uuid;

/// A fresh time-ordered id.
pub fn new_id() -> Uuid {
    Uuid::now_v7()
}

/// Parse a client-supplied id. Surrounding whitespace is ignored.
pub fn parse_id(raw: &str) -> Option<Uuid> {
    Uuid::parse_str(raw.trim()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ids_sort_by_creation() {
        let a = new_id();
        let b = new_id();
        assert_eq!(a.get_version(), Some(uuid::Version::SortRand));
        assert!(b >= a);
    }

    #[test]
    fn parse_id_rejects_free_text() {
        let id = new_id();
        assert_eq!(parse_id(&format!(" {id} ")), Some(id));
        assert_eq!(parse_id("T1"), None);
        assert_eq!(parse_id(""), None);
    }
}

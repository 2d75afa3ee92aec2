//! Utility functions for display formatting and id minting.

pub mod format;

// Re-export commonly used functions at module level
pub use format::{age_display, coin_delta, truncate};

use rand::RngCore;

/// Length of a client-minted entity id in hex characters.
const ENTITY_ID_HEX_CHARS: usize = 32;

/// Mint an opaque entity id.
///
/// Ids are generated on the client so an optimistically inserted entity
/// already carries its final id when the backend confirms it; no
/// server-assigned-id reconciliation step exists anywhere in the data layer.
pub fn new_entity_id() -> String {
    let mut bytes = [0u8; ENTITY_ID_HEX_CHARS / 2];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entity_id_shape() {
        let id = new_entity_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_new_entity_ids_are_distinct() {
        assert_ne!(new_entity_id(), new_entity_id());
    }
}

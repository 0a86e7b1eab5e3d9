//! Key encoding for the object and type-index trees.

use crate::identity::ID_SIZE;

/// Separator between entity name and id in type-index keys.
const SEPARATOR: u8 = 0;

/// Encode a type-index key: `[entity name][0][id (16 bytes)]`.
///
/// All ids of one entity share the prefix returned by [`type_index_prefix`],
/// so a prefix scan lists the instances of that entity.
pub fn type_index_key(entity: &str, id: &[u8; ID_SIZE]) -> Vec<u8> {
    let mut key = type_index_prefix(entity);
    key.extend_from_slice(id);
    key
}

/// Prefix shared by every type-index key of an entity.
pub fn type_index_prefix(entity: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(entity.len() + 1 + ID_SIZE);
    prefix.extend_from_slice(entity.as_bytes());
    prefix.push(SEPARATOR);
    prefix
}

/// Extract the id from a type-index key with the given prefix length.
pub fn decode_index_id(key: &[u8], prefix_len: usize) -> Option<[u8; ID_SIZE]> {
    if key.len() != prefix_len + ID_SIZE {
        return None;
    }
    key[prefix_len..].try_into().ok()
}

/// Get current timestamp in microseconds since Unix epoch.
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or_default()
}

//! ID generation for triage records
//!
//! Hash-based IDs so that records created on different machines never
//! collide. Format: <prefix>-xxxxxxxx (8 lowercase alphanumeric chars).

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Generate a unique record ID for a collection prefix
///
/// Uses UUID + timestamp hash, encoded as base32 lowercase.
/// Format: prefix-xxxxxxxx where xxxxxxxx is 8 alphanumeric chars.
pub fn generate_id(prefix: &str) -> String {
    let uuid = Uuid::new_v4();
    let timestamp = chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0);

    let mut hasher = Sha256::new();
    hasher.update(uuid.as_bytes());
    hasher.update(timestamp.to_le_bytes());

    let hash = hasher.finalize();

    // Take first 5 bytes, encode as base32 lowercase, take first 8 chars
    let encoded = base32::encode(base32::Alphabet::Crockford, &hash[..5])
        .to_lowercase()
        .chars()
        .take(8)
        .collect::<String>();

    format!("{}-{}", prefix, encoded)
}

/// Parse a record ID to extract prefix and hash
pub fn parse_id(id: &str) -> Option<(&str, &str)> {
    let parts: Vec<&str> = id.splitn(2, '-').collect();
    if parts.len() == 2 {
        Some((parts[0], parts[1]))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id() {
        let id = generate_id("iss");
        assert!(id.starts_with("iss-"));
        assert_eq!(id.len(), 12); // iss- + 8 chars
    }

    #[test]
    fn test_generate_id_unique() {
        let a = generate_id("usr");
        let b = generate_id("usr");
        assert_ne!(a, b);
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("iss-abc12345"), Some(("iss", "abc12345")));
        assert_eq!(parse_id("nodash"), None);
    }
}

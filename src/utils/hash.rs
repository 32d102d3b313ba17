//! Hashing utilities.
//!
//! # Usage
//!
//! ```ignore
//! use crate::utils::hash;
//!
//! let fp = hash::version_fingerprint([("Browsing", "product", "2.0.0")]); // -> "a1b2c3d4e5f60718"
//! ```

/// Length of a version fingerprint in hex chars.
const FINGERPRINT_LEN: usize = 16;

/// Fingerprint of a set of effective fragment versions.
///
/// Entries are `(gateway, fragment, version)`; order does not matter.
pub fn version_fingerprint<'a, I>(versions: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str, &'a str)>,
{
    let mut entries: Vec<_> = versions.into_iter().collect();
    entries.sort_unstable();

    let mut hasher = blake3::Hasher::new();
    for (gateway, fragment, version) in entries {
        for part in [gateway, fragment, version] {
            hasher.update(part.as_bytes());
            hasher.update(&[0]);
        }
        hasher.update(b"\n");
    }

    let mut hex = hex::encode(hasher.finalize().as_bytes());
    hex.truncate(FINGERPRINT_LEN);
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_order_independent() {
        let a = version_fingerprint([("B", "product", "1"), ("B", "header", "2")]);
        let b = version_fingerprint([("B", "header", "2"), ("B", "product", "1")]);
        assert_eq!(a, b);
        assert_eq!(a.len(), FINGERPRINT_LEN);
    }

    #[test]
    fn test_fingerprint_changes_with_version() {
        let a = version_fingerprint([("B", "product", "1")]);
        let b = version_fingerprint([("B", "product", "2")]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_fingerprint_fields_do_not_bleed() {
        let a = version_fingerprint([("ab", "c", "1")]);
        let b = version_fingerprint([("a", "bc", "1")]);
        assert_ne!(a, b);
    }
}

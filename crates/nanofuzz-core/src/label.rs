//! Reference names: 1-8 characters, uppercase ASCII letters and digits only.

use crate::limits::MAX_LABEL_LEN;

/// `true` if `c` is a legal label character (`[A-Z0-9]`).
pub fn is_label_char(c: u8) -> bool {
    c.is_ascii_uppercase() || c.is_ascii_digit()
}

/// `true` if `label` is a well-formed name: 1-8 bytes, all `[A-Z0-9]`.
pub fn is_valid_label(label: &str) -> bool {
    !label.is_empty() && label.len() <= MAX_LABEL_LEN && label.bytes().all(is_label_char)
}

/// djb2 hash over the label's bytes, used as the primary key into the
/// reference table. Collisions are broken by comparing the label strings
/// themselves, so dispersion quality beyond "acceptable" does not matter.
pub fn djb2(label: &str) -> u32 {
    let mut hash: u32 = 5381;
    for &b in label.as_bytes() {
        hash = hash.wrapping_mul(33).wrapping_add(b as u32);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_labels() {
        assert!(is_valid_label("X"));
        assert!(is_valid_label("ABCDEFGH"));
        assert!(is_valid_label("A1B2"));
    }

    #[test]
    fn invalid_labels() {
        assert!(!is_valid_label(""));
        assert!(!is_valid_label("ABCDEFGHI"));
        assert!(!is_valid_label("abc"));
        assert!(!is_valid_label("A-B"));
    }

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(djb2("HELLO"), djb2("HELLO"));
        assert_ne!(djb2("HELLO"), djb2("WORLD"));
    }
}

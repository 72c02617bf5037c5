//! Short operator-facing device codes.

use rand::Rng;

/// Code alphabet: uppercase letters and digits without look-alikes (I, O, 0, 1).
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Number of characters in a device code.
pub const CODE_LENGTH: usize = 6;

/// Source of candidate device codes.
///
/// Candidates are not guaranteed unique; the store's unique index decides.
pub trait CodeGenerator: Send + Sync {
    fn next_code(&self) -> String;
}

/// Draws codes uniformly from [`CODE_ALPHABET`].
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomCodeGenerator;

impl CodeGenerator for RandomCodeGenerator {
    fn next_code(&self) -> String {
        generate_device_code()
    }
}

/// Generate a random 6-character device code.
pub fn generate_device_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Normalize a code typed by a human: trim and uppercase.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_use_alphabet_and_length() {
        for _ in 0..200 {
            let code = generate_device_code();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn alphabet_excludes_ambiguous_characters() {
        for c in [b'I', b'O', b'0', b'1'] {
            assert!(!CODE_ALPHABET.contains(&c));
        }
    }

    #[test]
    fn normalize_uppercases_and_trims() {
        assert_eq!(normalize_code("  ab3k9z "), "AB3K9Z");
    }
}

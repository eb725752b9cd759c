//! Password hashing for operator accounts.
//!
//! Hashes are stored as `sha256$<hex salt>$<hex digest>` so the scheme can
//! be swapped out later without rewriting stored state.

use rand::RngCore;
use sha2::{Digest, Sha256};

const SCHEME: &str = "sha256";
const SALT_LEN: usize = 16;

/// Hashes a plain text password with a freshly generated random salt.
pub fn hash_password(plain: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);

    let digest = digest_password(&salt, plain);
    format!("{SCHEME}${}${}", to_hex(&salt), to_hex(&digest))
}

/// Verifies a plain text password against a stored hash.
///
/// Returns `false` for malformed stored values rather than erroring, a
/// corrupt hash behaves like a wrong password.
pub fn verify_password(plain: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (scheme, salt, digest) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(salt), Some(digest), None) => (scheme, salt, digest),
        _ => return false,
    };

    if scheme != SCHEME {
        return false;
    }

    let salt = match from_hex(salt) {
        Some(salt) => salt,
        None => return false,
    };
    let expected = match from_hex(digest) {
        Some(digest) => digest,
        None => return false,
    };

    let actual = digest_password(&salt, plain);

    // Fixed time comparison, the compared values are digests of fixed length.
    if actual.len() != expected.len() {
        return false;
    }
    actual
        .iter()
        .zip(expected.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

fn digest_password(salt: &[u8], plain: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(plain.as_bytes());
    hasher.finalize().to_vec()
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn from_hex(value: &str) -> Option<Vec<u8>> {
    if value.len() % 2 != 0 {
        return None;
    }

    (0..value.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&value[i..i + 2], 16).ok())
        .collect()
}

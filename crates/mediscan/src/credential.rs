//! Password digests.
//!
//! **This is not a cryptographic hash and is not a security boundary.** The
//! digest is the 31-multiplier string hash over UTF-16 code units, kept so
//! that digests written by earlier installs still verify. It is cheap to
//! invert and collides easily; treat stored accounts as demo-grade.

/// Compute the digest of a password.
///
/// Accumulates `hash * 31 + unit` over the UTF-16 code units in a wrapping
/// 32-bit signed integer and renders the absolute value as lowercase hex.
#[must_use]
pub fn hash_password(password: &str) -> String {
    let hash = password
        .encode_utf16()
        .fold(0_i32, |acc, unit| {
            acc.wrapping_mul(31).wrapping_add(i32::from(unit))
        });
    format!("{:x}", hash.unsigned_abs())
}

/// Check a password against a stored digest.
#[must_use]
pub fn verify_password(password: &str, digest: &str) -> bool {
    hash_password(password) == digest
}

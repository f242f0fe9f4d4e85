use base64::engine::general_purpose::STANDARD_NO_PAD as B64;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use sha3::{Digest, Sha3_256};
use uuid::Uuid;

const SCHEME: &str = "pbkdf2-sha256";
pub const DEFAULT_PBKDF2_ITERATIONS: u32 = 200_000;

pub fn get_sha3_256_hash(data: &str) -> String {
    let mut hasher = Sha3_256::default();
    hasher.update(data);
    format!("{:X}", hasher.finalize())
}

fn derive_key(password: &str, salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key);
    key
}

/// Stored as `pbkdf2-sha256$<iterations>$<salt>$<key>`, salt and key in
/// unpadded base64.
pub fn hash_password(pwd: &str) -> String {
    hash_password_with_iterations(pwd, DEFAULT_PBKDF2_ITERATIONS)
}

pub fn hash_password_with_iterations(pwd: &str, iterations: u32) -> String {
    let salt = Uuid::new_v4().into_bytes();
    let key = derive_key(pwd, &salt, iterations);
    format!("{}${}${}${}", SCHEME, iterations, B64.encode(salt), B64.encode(key))
}

pub fn verify_password(pwd: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (scheme, iterations, salt, expected) = match (parts.next(), parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(iterations), Some(salt), Some(expected), None) => (scheme, iterations, salt, expected),
        _ => return false,
    };
    if scheme != SCHEME {
        return false;
    }
    let iterations = match iterations.parse::<u32>() {
        Ok(n) if n > 0 => n,
        _ => return false,
    };
    match (B64.decode(salt), B64.decode(expected)) {
        (Ok(salt), Ok(expected)) => constant_time_eq(&derive_key(pwd, &salt, iterations), &expected),
        _ => false,
    }
}

/// Short digest of a stored hash, embedded in reset tokens so they stop
/// working once the password changes.
pub fn fingerprint(stored_hash: &str) -> String {
    get_sha3_256_hash(stored_hash)[..16].to_string()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAST: u32 = 1_000;

    #[test]
    fn hashes_are_salted_and_verifiable() {
        let first = hash_password_with_iterations("hunter22", FAST);
        let second = hash_password_with_iterations("hunter22", FAST);
        assert_ne!(first, second);
        assert!(verify_password("hunter22", &first));
        assert!(verify_password("hunter22", &second));
        assert!(!verify_password("hunter23", &first));
    }

    #[test]
    fn stored_hash_records_scheme_and_cost() {
        let stored = hash_password("hunter22");
        assert!(stored.starts_with("pbkdf2-sha256$200000$"));
        assert_eq!(stored.split('$').count(), 4);
        assert!(verify_password("hunter22", &stored));
    }

    #[test]
    fn cost_is_read_from_the_stored_hash() {
        let stored = hash_password_with_iterations("hunter22", FAST);
        let bumped = stored.replacen("$1000$", "$1001$", 1);
        assert!(!verify_password("hunter22", &bumped));
    }

    #[test]
    fn malformed_stored_hash_never_verifies() {
        assert!(!verify_password("anything", "no-separator-here"));
        assert!(!verify_password("anything", ""));
        assert!(!verify_password("anything", "pbkdf2-sha256$0$AAAA$AAAA"));
        assert!(!verify_password("anything", "pbkdf2-sha256$1000$!!$AAAA"));
        // a single fast digest is not accepted as a password hash
        let salt = "0123456789abcdef";
        let legacy = format!("{}${}", salt, get_sha3_256_hash(&format!("{}anything", salt)));
        assert!(!verify_password("anything", &legacy));
    }

    #[test]
    fn fingerprint_tracks_the_stored_hash() {
        let a = hash_password_with_iterations("hunter22", FAST);
        let b = hash_password_with_iterations("hunter22", FAST);
        assert_eq!(fingerprint(&a).len(), 16);
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn sha3_hex_is_uppercase() {
        assert_eq!(
            get_sha3_256_hash(""),
            "A7FFC6F8BF1ED76651C14756A061D662F580FF4DE43B49FA82D80A4B80F8434A"
        );
    }
}

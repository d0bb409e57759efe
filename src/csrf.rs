use rand::Rng;
use subtle::ConstantTimeEq;

/// Generates the anti-forgery `state` parameter for an authorization request.
///
/// Returns a 32-character lowercase hex string (16 random bytes from the
/// thread-local CSPRNG).
#[must_use]
pub fn generate_state() -> String {
    let random_bytes: [u8; 16] = rand::rng().random();
    hex::encode(random_bytes)
}

/// Compares a returned `state` with the pending one in constant time.
#[must_use]
pub fn state_matches(received: &str, expected: &str) -> bool {
    received.as_bytes().ct_eq(expected.as_bytes()).into()
}

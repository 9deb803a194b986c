//! RSA signing-key schema.
//!
//! A wallet key is a nine-field JWK private key. Structural validity is
//! necessary but not sufficient: a structurally valid but corrupt key
//! only fails once the gateway attempts address derivation.

use serde::{Deserialize, Serialize};

/// Required value of the `kty` field.
pub const REQUIRED_KTY: &str = "RSA";

/// An RSA private key in JWK form. All nine fields are required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    /// Public modulus, base64url.
    pub n: String,
    /// Public exponent, base64url.
    pub e: String,
    /// Private exponent, base64url.
    pub d: String,
    pub p: String,
    pub q: String,
    pub dp: String,
    pub dq: String,
    pub qi: String,
}

impl Jwk {
    /// Checks the structural shape: all nine fields present and
    /// non-empty, `kty` equal to `"RSA"`.
    ///
    /// Returns the first problem found, or `None` if the shape is valid.
    pub fn structural_problem(&self) -> Option<String> {
        if self.kty != REQUIRED_KTY {
            return Some(format!(
                "key type must be \"{REQUIRED_KTY}\", found \"{}\"",
                self.kty
            ));
        }
        let fields = [
            ("n", &self.n),
            ("e", &self.e),
            ("d", &self.d),
            ("p", &self.p),
            ("q", &self.q),
            ("dp", &self.dp),
            ("dq", &self.dq),
            ("qi", &self.qi),
        ];
        for (name, value) in fields {
            if value.is_empty() {
                return Some(format!("required key field \"{name}\" is empty"));
            }
        }
        None
    }
}

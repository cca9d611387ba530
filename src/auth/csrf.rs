use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::generate_token;

pub const CSRF_COOKIE: &str = "csrftoken";
pub const CSRF_FIELD: &str = "csrf_token";
pub const CSRF_HEADER: &str = "x-csrf-token";

type HmacSha256 = Hmac<Sha256>;

/// Stateless double-submit tokens. The browser holds a random value in the
/// `csrftoken` cookie; forms echo back its HMAC under the server secret.
#[derive(Clone)]
pub struct CsrfService {
    secret: Vec<u8>,
}

impl CsrfService {
    pub fn new(secret: &str) -> Self {
        Self { secret: secret.as_bytes().to_vec() }
    }

    pub fn new_cookie_value() -> String {
        generate_token()
    }

    /// Token to embed in forms rendered for the given cookie value.
    pub fn form_token(&self, cookie_value: &str) -> String {
        hex::encode(self.sign(cookie_value))
    }

    pub fn verify(&self, cookie_value: &str, token: &str) -> bool {
        if cookie_value.is_empty() || token.is_empty() {
            return false;
        }
        let Ok(provided) = hex::decode(token.trim()) else {
            return false;
        };
        let expected = self.sign(cookie_value);
        expected.ct_eq(&provided).into()
    }

    fn sign(&self, cookie_value: &str) -> Vec<u8> {
        // HMAC accepts keys of any length, new_from_slice cannot fail here
        let mut mac = match HmacSha256::new_from_slice(&self.secret) {
            Ok(mac) => mac,
            Err(_) => return Vec::new(),
        };
        mac.update(b"csrf:");
        mac.update(cookie_value.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Sha256, Sha512};

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacScheme {
    HmacSha512Hex,
    HmacSha256Base64,
}

impl MacScheme {
    fn encode(&self, digest: &[u8]) -> String {
        match self {
            MacScheme::HmacSha512Hex => hex::encode(digest),
            MacScheme::HmacSha256Base64 => BASE64.encode(digest),
        }
    }

    fn decode(&self, provided: &str) -> Option<Vec<u8>> {
        match self {
            MacScheme::HmacSha512Hex => hex::decode(provided).ok(),
            MacScheme::HmacSha256Base64 => BASE64.decode(provided).ok(),
        }
    }
}

pub struct SignatureVerifier {
    scheme: MacScheme,
    secret: SecretString,
}

impl SignatureVerifier {
    pub fn new(scheme: MacScheme, secret: SecretString) -> Self {
        Self { scheme, secret }
    }

    pub fn scheme(&self) -> MacScheme {
        self.scheme
    }

    pub fn compute_mac(&self, raw: &[u8]) -> String {
        let digest = match self.scheme {
            MacScheme::HmacSha512Hex => {
                let mut mac = self.sha512();
                mac.update(raw);
                mac.finalize().into_bytes().to_vec()
            }
            MacScheme::HmacSha256Base64 => {
                let mut mac = self.sha256();
                mac.update(raw);
                mac.finalize().into_bytes().to_vec()
            }
        };
        self.scheme.encode(&digest)
    }

    pub fn verify(&self, raw: &[u8], provided: &str) -> bool {
        let Some(provided) = self.scheme.decode(provided.trim()) else {
            return false;
        };

        match self.scheme {
            MacScheme::HmacSha512Hex => {
                let mut mac = self.sha512();
                mac.update(raw);
                mac.verify_slice(&provided).is_ok()
            }
            MacScheme::HmacSha256Base64 => {
                let mut mac = self.sha256();
                mac.update(raw);
                mac.verify_slice(&provided).is_ok()
            }
        }
    }

    fn sha512(&self) -> HmacSha512 {
        HmacSha512::new_from_slice(self.secret.expose_secret().as_bytes())
            .expect("HMAC can take key of any size")
    }

    fn sha256(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .expect("HMAC can take key of any size")
    }
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("scheme", &self.scheme)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier(scheme: MacScheme) -> SignatureVerifier {
        SignatureVerifier::new(scheme, SecretString::from("sk_test_secret".to_string()))
    }

    #[test]
    fn paystack_signature_is_lowercase_hex_sha512() {
        let v = verifier(MacScheme::HmacSha512Hex);
        let mac = v.compute_mac(b"{\"event\":\"charge.success\"}");
        assert_eq!(mac.len(), 128);
        assert!(mac.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn accepts_own_signature_for_both_schemes() {
        for scheme in [MacScheme::HmacSha512Hex, MacScheme::HmacSha256Base64] {
            let v = verifier(scheme);
            let body = br#"{"event":"charge.completed","data":{"tx_ref":"FLW-1"}}"#;
            let mac = v.compute_mac(body);
            assert!(v.verify(body, &mac), "{:?}", scheme);
        }
    }

    #[test]
    fn hex_case_does_not_matter() {
        let v = verifier(MacScheme::HmacSha512Hex);
        let body = b"payload";
        let mac = v.compute_mac(body).to_uppercase();
        assert!(v.verify(body, &mac));
    }

    #[test]
    fn rejects_modified_body() {
        let v = verifier(MacScheme::HmacSha512Hex);
        let mac = v.compute_mac(br#"{"amount":5000}"#);
        assert!(!v.verify(br#"{"amount":500000}"#, &mac));
    }

    #[test]
    fn rejects_reformatted_body() {
        let v = verifier(MacScheme::HmacSha256Base64);
        let mac = v.compute_mac(br#"{"a":1,"b":2}"#);
        assert!(!v.verify(br#"{"a": 1, "b": 2}"#, &mac));
    }

    #[test]
    fn rejects_other_secret_and_garbage() {
        let v = verifier(MacScheme::HmacSha512Hex);
        let other = SignatureVerifier::new(
            MacScheme::HmacSha512Hex,
            SecretString::from("another".to_string()),
        );
        let body = b"{}";
        assert!(!v.verify(body, &other.compute_mac(body)));
        assert!(!v.verify(body, "not-hex"));
        assert!(!v.verify(body, ""));
    }
}

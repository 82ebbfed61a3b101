//! Ed25519 signature creation and verification.

use ed25519_dalek::{Signer, Verifier};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::keys::{PublicKey, SecretKey};
use crate::error::CryptoError;

/// Ed25519 signature, serialized as its R and s halves (64 raw bytes).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature(pub ed25519_dalek::Signature);

impl Signature {
    /// Create a Signature from raw bytes.
    pub fn from_bytes(bytes: &[u8; 64]) -> Self {
        Signature(ed25519_dalek::Signature::from_bytes(bytes))
    }

    /// Get the raw bytes of the signature.
    #[inline]
    pub fn to_bytes(&self) -> [u8; 64] {
        self.0.to_bytes()
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let bytes = self.to_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);
        (r, s).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (r, s) = <([u8; 32], [u8; 32])>::deserialize(deserializer)?;
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&r);
        bytes[32..].copy_from_slice(&s);
        Ok(Signature::from_bytes(&bytes))
    }
}

/// Sign a message with a secret key.
pub fn sign(secret_key: &SecretKey, message: &[u8]) -> Signature {
    Signature(secret_key.sign(message))
}

/// Verify a signature against a message and public key.
pub fn verify(public_key: &PublicKey, message: &[u8], signature: &Signature) -> Result<(), CryptoError> {
    public_key
        .inner()
        .verify(message, &signature.0)
        .map_err(|_| CryptoError::SignatureVerificationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    #[test]
    fn test_sign_verify() {
        let kp = KeyPair::generate();
        let signature = sign(kp.signing_key(), b"hello squeak");
        assert!(verify(&kp.public_key(), b"hello squeak", &signature).is_ok());
        assert_eq!(
            verify(&kp.public_key(), b"goodbye", &signature),
            Err(CryptoError::SignatureVerificationFailed)
        );
    }

    #[test]
    fn test_verify_wrong_key_fails() {
        let signer = KeyPair::generate();
        let other = KeyPair::generate();
        let signature = sign(signer.signing_key(), b"msg");
        assert!(verify(&other.public_key(), b"msg", &signature).is_err());
    }

    #[test]
    fn test_signature_serialization() {
        let kp = KeyPair::generate();
        let signature = sign(kp.signing_key(), b"msg");

        let bytes = crate::serialization::serialize(&signature).unwrap();
        assert_eq!(bytes.len(), 64);

        let recovered: Signature = crate::serialization::deserialize(&bytes).unwrap();
        assert_eq!(recovered, signature);
        assert!(verify(&kp.public_key(), b"msg", &recovered).is_ok());
    }
}

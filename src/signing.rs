//! Provenance signatures for submitted actions.
//!
//! The payload is serialized canonically (RFC 8785 JCS: keys sorted by
//! UTF-16 code units, ECMAScript number formatting, no whitespace) and
//! signed with RSA PKCS#1 v1.5 / SHA-256. The verifier recomputes the same
//! bytes, so canonicalization must not depend on field insertion order.

use crate::error::SigningError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ring::rand::SystemRandom;
use ring::signature::{RSA_PKCS1_SHA256, RsaKeyPair};
use rustls_pki_types::PrivateKeyDer;
use rustls_pki_types::pem::PemObject;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

/// Payload field carrying the base64 signature. Never part of the signed bytes.
pub const SIGNATURE_FIELD: &str = "_signature";

pub struct PayloadSigner {
    key_pair: RsaKeyPair,
    rng: SystemRandom,
}

impl std::fmt::Debug for PayloadSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadSigner")
            .field("modulus_bits", &(self.key_pair.public().modulus_len() * 8))
            .finish_non_exhaustive()
    }
}

impl PayloadSigner {
    /// Load a PEM-encoded RSA private key (`PRIVATE KEY` or `RSA PRIVATE KEY`).
    pub fn from_pem(pem: &[u8]) -> Result<Self, SigningError> {
        let der = PrivateKeyDer::from_pem_slice(pem).map_err(|e| SigningError::Pem(e.to_string()))?;
        let key_pair = match &der {
            PrivateKeyDer::Pkcs8(key) => RsaKeyPair::from_pkcs8(key.secret_pkcs8_der()),
            PrivateKeyDer::Pkcs1(key) => RsaKeyPair::from_der(key.secret_pkcs1_der()),
            _ => return Err(SigningError::UnsupportedKey),
        }
        .map_err(|e| SigningError::KeyRejected(e.to_string()))?;

        Ok(Self {
            key_pair,
            rng: SystemRandom::new(),
        })
    }

    pub fn from_pem_file(path: &Path) -> Result<Self, SigningError> {
        let pem = std::fs::read(path)?;
        Self::from_pem(&pem)
    }

    pub fn sign_bytes(&self, message: &[u8]) -> Result<Vec<u8>, SigningError> {
        let mut signature = vec![0; self.key_pair.public().modulus_len()];
        self.key_pair
            .sign(&RSA_PKCS1_SHA256, &self.rng, message, &mut signature)
            .map_err(|_| SigningError::Sign)?;
        Ok(signature)
    }

    /// Sign the canonical form of `payload`; returns standard base64.
    ///
    /// A top-level `_signature` field is excluded from the signed bytes.
    pub fn sign<T: Serialize + ?Sized>(&self, payload: &T) -> Result<String, SigningError> {
        let mut value = serde_json::to_value(payload)?;
        if let Value::Object(map) = &mut value {
            map.remove(SIGNATURE_FIELD);
        }
        let canonical = canonical_json(&value)?;
        Ok(STANDARD.encode(self.sign_bytes(canonical.as_bytes())?))
    }
}

/// Sign when a signer is configured. Failures are logged and yield `None`.
pub fn sign_payload<T: Serialize + ?Sized>(signer: Option<&PayloadSigner>, payload: &T) -> Option<String> {
    let signer = signer?;
    match signer.sign(payload) {
        Ok(signature) => Some(signature),
        Err(e) => {
            tracing::warn!("failed to sign action payload (sending unsigned): {e}");
            None
        }
    }
}

// ── Canonical JSON ───────────────────────────────────────────────

/// Byte-stable JSON, identical to what a JavaScript verifier produces with
/// sorted keys and `JSON.stringify`.
pub fn canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    serde_jcs::to_string(value)
}

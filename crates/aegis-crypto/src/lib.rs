//! Crypto engine for the Aegis gateway pair.
//!
//! Protocol: ECDH(P-384) → HKDF-SHA256 → AES-256-GCM.
//!
//! One [`CryptoEngine`] per process holds a single P-384 keypair for the
//! process's lifetime (no rotation — key material is memory-resident only,
//! see the crate-level Non-goals in the workspace spec). [`CryptoEngine::derive_shared_key`]
//! is a pure function of (self private key, peer public key bytes): both
//! sides of a handshake derive byte-identical session keys without any
//! additional round trip.
//!
//! Wire format for a sealed envelope: `nonce(12) || AES-256-GCM ciphertext || tag(16)`.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use hkdf::Hkdf;
use p384::pkcs8::{DecodePublicKey, EncodePublicKey, LineEnding};
use p384::{PublicKey, SecretKey};
use rand::RngCore;
use sha2::Sha256;

const SESSION_KEY_INFO: &[u8] = b"aegis-session-key";
const NONCE_LEN: usize = 12;

/// Crypto-layer failures, mapped at each node's request boundary per the
/// gateway's error taxonomy (`BadPeerKey` at handshake / session lookup,
/// `AuthFail` at envelope open).
#[derive(Debug, thiserror::Error)]
pub enum AegisError {
    #[error("peer public key is malformed or not on the curve: {0}")]
    BadPeerKey(String),
    #[error("AEAD authentication failed (tampered ciphertext, nonce, key, or associated data)")]
    AuthFail,
}

/// A derived 32-byte symmetric session key.
#[derive(Clone)]
pub struct SessionKey(pub [u8; 32]);

impl SessionKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// Per-process crypto singleton: one P-384 keypair, memoized PEM public key.
pub struct CryptoEngine {
    private_key: SecretKey,
    public_key_pem: String,
}

impl CryptoEngine {
    /// Generates a fresh P-384 keypair and memoizes the SubjectPublicKeyInfo
    /// PEM encoding of the public half.
    pub fn init() -> Self {
        let private_key = SecretKey::random(&mut rand::thread_rng());
        let public_key_pem = private_key
            .public_key()
            .to_public_key_pem(LineEnding::LF)
            .expect("P-384 public key PEM encoding cannot fail");
        Self {
            private_key,
            public_key_pem,
        }
    }

    /// The PEM-encoded (SubjectPublicKeyInfo) public key, sent over the wire
    /// as both the handshake response body and the RPC sender identifier.
    pub fn public_key_pem(&self) -> &str {
        &self.public_key_pem
    }

    /// ECDH(self.priv, peer.pub) → HKDF-SHA256(info = "aegis-session-key") → 32 bytes.
    ///
    /// Pure in (self private key, peer public key bytes): the caller does
    /// not need any other input to reproduce the same session key on both
    /// sides of a handshake.
    pub fn derive_shared_key(&self, peer_public_key_pem: &str) -> Result<SessionKey, AegisError> {
        let peer_public = PublicKey::from_public_key_pem(peer_public_key_pem)
            .map_err(|e| AegisError::BadPeerKey(e.to_string()))?;

        let shared = p384::ecdh::diffie_hellman(
            self.private_key.to_nonzero_scalar(),
            peer_public.as_affine(),
        );

        let hk = Hkdf::<Sha256>::new(None, shared.raw_secret_bytes().as_slice());
        let mut okm = [0u8; 32];
        hk.expand(SESSION_KEY_INFO, &mut okm)
            .expect("HKDF-SHA256 output length 32 is always valid");
        Ok(SessionKey(okm))
    }

    /// Seals `plaintext` under `key` with `associated_data` bound by the AEAD
    /// tag. Returns `nonce(12) || ciphertext || tag(16)`.
    pub fn seal(
        key: &SessionKey,
        plaintext: &[u8],
        associated_data: &[u8],
    ) -> Result<Vec<u8>, AegisError> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(
                nonce,
                aes_gcm::aead::Payload {
                    msg: plaintext,
                    aad: associated_data,
                },
            )
            .map_err(|_| AegisError::AuthFail)?;

        let mut envelope = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        envelope.extend_from_slice(&nonce_bytes);
        envelope.extend_from_slice(&ciphertext);
        Ok(envelope)
    }

    /// Opens an envelope produced by [`Self::seal`]. Fails with
    /// [`AegisError::AuthFail`] if the tag doesn't verify — wrong key,
    /// tampered ciphertext/nonce, or mismatched associated data.
    pub fn open(
        key: &SessionKey,
        envelope: &[u8],
        associated_data: &[u8],
    ) -> Result<Vec<u8>, AegisError> {
        if envelope.len() < NONCE_LEN {
            return Err(AegisError::AuthFail);
        }
        let (nonce_bytes, ciphertext) = envelope.split_at(NONCE_LEN);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
        let nonce = Nonce::from_slice(nonce_bytes);

        cipher
            .decrypt(
                nonce,
                aes_gcm::aead::Payload {
                    msg: ciphertext,
                    aad: associated_data,
                },
            )
            .map_err(|_| AegisError::AuthFail)
    }
}

/// Deterministic JSON encoding used everywhere an AEAD associated-data slot
/// is computed. Callers build a `BTreeMap<String, String>` rather than a
/// `HashMap`, so sorted-key iteration is structural and both nodes always
/// agree on the encoding — see the workspace spec's §9 note on the original
/// source's inconsistent sort-keys usage.
pub fn canonical_associated_data(metadata: &std::collections::BTreeMap<String, String>) -> Vec<u8> {
    // BTreeMap iterates in key order already; serde_json's Map would need
    // `preserve_order` off to get the same guarantee, so we encode by hand
    // to avoid depending on serde_json's internal map ordering behavior.
    let mut out = String::from("{");
    for (i, (k, v)) in metadata.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&serde_json_escape(k));
        out.push(':');
        out.push_str(&serde_json_escape(v));
    }
    out.push('}');
    out.into_bytes()
}

fn serde_json_escape(s: &str) -> String {
    serde_json::to_string(s).expect("string serialization cannot fail")
}

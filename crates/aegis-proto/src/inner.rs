//! The plaintext message shapes carried *inside* an AEAD envelope — never
//! seen on the wire except as ciphertext. See workspace spec §3.
//!
//! Bodies are base64-encoded rather than lossy-UTF-8-decoded, fixing the
//! "Binary bodies" design note in the original spec (§9): a binary request
//! or response body now survives the round trip intact.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Inner plaintext request, sealed by Core-A and opened by Core-B.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InnerRequest {
    pub method: String,
    /// Path including query string, e.g. `/secret/path?x=1`.
    pub path: String,
    pub headers: BTreeMap<String, String>,
    /// Base64-encoded request body (may be empty).
    pub body: String,
}

/// Inner plaintext response, sealed by Core-B and opened by Core-A.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InnerResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    /// Base64-encoded response body (may be empty).
    pub body: String,
}

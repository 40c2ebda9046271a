use thiserror::Error;

/// Errors surfaced while servicing one `Process` RPC. Each variant maps
/// directly to a clause in the workspace spec's §4.3 pipeline / §7 error
/// taxonomy; none of these ever escape the request they belong to.
#[derive(Debug, Error)]
pub enum CoreBError {
    /// Session record existed but its TTL elapsed — RPC fails with
    /// `UNAUTHENTICATED`.
    #[error("session expired. Please re-handshake.")]
    SessionExpired,

    /// Sender's `public_key` was not valid UTF-8/PEM, or did not decode to a
    /// point on the curve — RPC fails with `UNAUTHENTICATED`, same as an
    /// expired session (spec.md §7: `BadPeerKey` "at RPC, propagate as
    /// UNAUTHENTICATED").
    #[error("peer public key is malformed: {0}")]
    BadPeerKey(String),

    /// AEAD open failed, or the opened JSON was missing `method`/`path`.
    /// Maps to `fake_http_status = 400`, no payload.
    #[error("crypto or payload validation failed")]
    CryptoOrPayload,

    /// Origin application was unreachable. Maps to `fake_http_status = 500`.
    #[error("origin request failed: {0}")]
    Origin(String),
}

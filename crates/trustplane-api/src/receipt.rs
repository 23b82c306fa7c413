// crates/trustplane-api/src/receipt.rs
// ============================================================================
// Module: Trustplane Receipt Signing
// Description: HMAC-SHA256 signatures over sealed record hashes.
// Purpose: Let external verifiers check receipts against a shared key.
// Dependencies: hmac, serde, sha2
// ============================================================================

//! ## Overview
//! When `EPACK_SIGNING_KEY` is configured, query responses carry a receipt:
//! the sealed record hash plus an HMAC-SHA256 signature over it. An empty
//! key disables signing entirely; the kernel never invents a key.

// ============================================================================
// SECTION: Imports
// ============================================================================

use hmac::Hmac;
use hmac::Mac;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

// ============================================================================
// SECTION: Receipt
// ============================================================================

/// HMAC-SHA256 keyed by the configured signing key.
type HmacSha256 = Hmac<Sha256>;

/// A signed receipt for a sealed record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Hash of the sealed record the receipt covers.
    pub record_hash: String,
    /// Lowercase hex HMAC-SHA256 signature.
    pub signature: String,
    /// Signature algorithm label.
    pub algorithm: String,
}

/// Signs a record hash; `None` when the key is empty or invalid.
#[must_use]
pub fn sign_receipt(key: &str, record_hash: &str) -> Option<Receipt> {
    if key.is_empty() {
        return None;
    }
    let mut mac = HmacSha256::new_from_slice(key.as_bytes()).ok()?;
    mac.update(record_hash.as_bytes());
    let digest = mac.finalize().into_bytes();
    let mut signature = String::with_capacity(digest.len() * 2);
    for byte in digest {
        signature.push_str(&format!("{byte:02x}"));
    }
    Some(Receipt {
        record_hash: record_hash.to_string(),
        signature,
        algorithm: "hmac-sha256".to_string(),
    })
}

/// Verifies a receipt's signature against the key.
#[must_use]
pub fn verify_receipt(key: &str, receipt: &Receipt) -> bool {
    sign_receipt(key, &receipt.record_hash)
        .is_some_and(|expected| expected.signature == receipt.signature)
}

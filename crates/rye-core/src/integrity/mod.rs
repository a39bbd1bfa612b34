//! Content-addressed integrity hashing and verification.

pub mod hashing;
pub mod verifier;

pub use hashing::{
    canonical_json, compute_directive_integrity, compute_knowledge_integrity,
    compute_tool_integrity, hash_matches, sha256_hex,
};
pub use verifier::{IntegrityVerifier, VerificationResult};

// crates/trustplane-core/tests/validator.rs
// ============================================================================
// Module: Output Validator Tests
// Description: Schema, citation enumerations, evidence gate, regions.
// ============================================================================
//! ## Overview
//! Validates the four-stage pipeline: strict key sets, closed citation
//! enumerations, the evidence-claim gate, the deterministic alignment score,
//! and protected-region integrity.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use serde_json::json;
use trustplane_core::HashAlgorithm;
use trustplane_core::runtime::ValidationOptions;
use trustplane_core::runtime::protected_regions_hash;
use trustplane_core::runtime::validate_output;
use trustplane_core::runtime::validator::validate_json_schema;

/// Default options for the standard profile.
const fn options() -> ValidationOptions {
    ValidationOptions {
        threshold: 0.90,
        require_evidence_citations: true,
        algorithm: HashAlgorithm::Sha256,
    }
}

/// A minimal valid output passes every stage.
#[test]
fn minimal_valid_output_passes() {
    let raw = json!({ "text": "An answer." }).to_string();
    let attempts = validate_output("short question", &raw, options());
    assert!(attempts.iter().all(|attempt| attempt.ok));
    assert_eq!(attempts.len(), 4);
}

/// Unknown keys fail the schema stage.
#[test]
fn extra_keys_fail_schema() {
    let raw = json!({ "text": "x", "tone": "warm" }).to_string();
    let (ok, _, reason) = validate_json_schema(&raw);
    assert!(!ok);
    assert!(reason.starts_with("extra_keys"));
}

/// Empty text fails the schema stage.
#[test]
fn empty_text_fails_schema() {
    let raw = json!({ "text": "  " }).to_string();
    let (ok, _, reason) = validate_json_schema(&raw);
    assert!(!ok);
    assert_eq!(reason, "missing_or_empty_text");
}

/// Non-JSON output fails with a parse reason.
#[test]
fn non_json_fails_schema() {
    let (ok, _, reason) = validate_json_schema("plain prose answer");
    assert!(!ok);
    assert!(reason.starts_with("json_error"));
}

/// A complete citation object passes; bad enum values fail.
#[test]
fn citation_enumerations_are_closed() {
    let good = json!({
        "text": "cited",
        "citations": [{
            "title": "A Study",
            "authors_or_org": "Org",
            "year": 2021,
            "source_type": "systematic_review",
            "evidence_strength": "moderate_evidence",
            "verification_status": "probable_reference",
        }],
    })
    .to_string();
    let (ok, _, reason) = validate_json_schema(&good);
    assert!(ok, "expected pass, got {reason}");

    let bad = json!({
        "text": "cited",
        "citations": [{
            "title": "A Study",
            "authors_or_org": "Org",
            "year": 2021,
            "source_type": "blog_post",
            "evidence_strength": "moderate_evidence",
            "verification_status": "probable_reference",
        }],
    })
    .to_string();
    let (ok, _, reason) = validate_json_schema(&bad);
    assert!(!ok);
    assert!(reason.contains("bad_source_type"));
}

/// Missing required citation fields are reported by index.
#[test]
fn citation_missing_fields_fail() {
    let raw = json!({
        "text": "cited",
        "citations": [{ "title": "A Study" }],
    })
    .to_string();
    let (ok, _, reason) = validate_json_schema(&raw);
    assert!(!ok);
    assert!(reason.starts_with("citation_0_missing"));
}

/// The year accepts integers and the literal string `unknown` only.
#[test]
fn citation_year_is_integer_or_unknown() {
    let unknown = json!({
        "text": "cited",
        "citations": [{
            "title": "T",
            "authors_or_org": "O",
            "year": "unknown",
            "source_type": "general_background",
            "evidence_strength": "contextual_reference",
            "verification_status": "citation_not_retrieved",
        }],
    })
    .to_string();
    assert!(validate_json_schema(&unknown).0);

    let fractional = json!({
        "text": "cited",
        "citations": [{
            "title": "T",
            "authors_or_org": "O",
            "year": 2021.5,
            "source_type": "general_background",
            "evidence_strength": "contextual_reference",
            "verification_status": "citation_not_retrieved",
        }],
    })
    .to_string();
    assert!(!validate_json_schema(&fractional).0);
}

/// Evidence-claim language without citations fails the gate.
#[test]
fn evidence_claims_require_citations() {
    let raw = json!({ "text": "Studies show this works." }).to_string();
    let attempts = validate_output("question", &raw, options());
    let gate = &attempts[1];
    assert_eq!(gate.reason, "evidence_claim_requires_citations");
    assert!(!gate.ok);
}

/// The gate is skipped when the requirement is off.
#[test]
fn evidence_gate_can_be_disabled() {
    let raw = json!({ "text": "Studies show this works." }).to_string();
    let attempts = validate_output("question", &raw, ValidationOptions {
        require_evidence_citations: false,
        ..options()
    });
    assert_eq!(attempts[1].reason, "evidence_claim_gate_skipped");
    assert!(attempts[1].ok);
}

/// Rewriting a protected code fence fails region integrity.
#[test]
fn protected_regions_catch_fence_rewrites() {
    let user = "Fix this:\n```rust\nlet x = 1;\n```";
    let answer = json!({ "text": "Done:\n```rust\nlet x = 2;\n```" }).to_string();
    let attempts = validate_output(user, &answer, options());
    let regions = attempts.last().expect("region stage");
    assert_eq!(regions.reason, "protected_regions");
    assert!(!regions.ok);
}

/// The region hash is stable and tag-length bounded.
#[test]
fn protected_region_hash_is_deterministic() {
    let text = "```a```\n{\"k\":1}";
    let first = protected_regions_hash(HashAlgorithm::Sha256, text);
    let second = protected_regions_hash(HashAlgorithm::Sha256, text);
    assert_eq!(first, second);
    assert_eq!(first.len(), 16);
}

/// Long user text lowers the placeholder alignment below the strict bar.
#[test]
fn alignment_threshold_depends_on_profile() {
    let long_user = "word ".repeat(60);
    let raw = json!({ "text": "ok" }).to_string();

    let standard = validate_output(&long_user, &raw, options());
    assert!(!standard[2].ok);

    let fast = validate_output(&long_user, &raw, ValidationOptions {
        threshold: 0.85,
        ..options()
    });
    assert!(fast[2].ok);
}

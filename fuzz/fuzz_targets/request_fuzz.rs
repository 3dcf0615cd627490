//! Fuzz test for scoring request parsing, fingerprinting and staging
//!
//! Feeds arbitrary bytes through the request pipeline looking for:
//! - Panics in deserialization or validation
//! - Fingerprints that change between identical parses
//! - Staging batches that lose or duplicate records
//!
//! Run with: cargo +nightly fuzz run request_fuzz -- -max_total_time=60

#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use raf_core::{fingerprint, ScoringRequest, StagingPlan};

fuzz_target!(|data: &[u8]| {
    let Ok(request) = serde_json::from_slice::<ScoringRequest>(data) else {
        return;
    };
    let Ok(first) = fingerprint(&request) else {
        return;
    };

    let reparsed: ScoringRequest =
        serde_json::from_slice(data).expect("Second parse of accepted input failed");
    assert_eq!(first, fingerprint(&reparsed).expect("Revalidation failed"));

    let members = request.memberships.len();
    let diagnoses = request.diagnoses.len();
    let plan = StagingPlan::new(Arc::new(request), 7).expect("Batch size 7 is valid");

    let staged_members: usize = plan.membership_batches().map(|b| b.len()).sum();
    let staged_diagnoses: usize = plan.diagnosis_batches().map(|b| b.len()).sum();
    assert_eq!(staged_members, members);
    assert_eq!(staged_diagnoses, diagnoses);
});

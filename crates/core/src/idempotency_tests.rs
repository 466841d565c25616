// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::plan::OperationType;
use crate::test_support::operation;

#[test]
fn key_is_deterministic() {
    let job = JobId::from_string("job-a");
    let k1 = IdempotencyKey::derive(&job, 0, "seed");
    let k2 = IdempotencyKey::derive(&job, 0, "seed");
    assert_eq!(k1, k2);
    assert_eq!(k1.as_str().len(), 64);
}

#[test]
fn key_varies_with_each_input() {
    let job = JobId::from_string("job-a");
    let base = IdempotencyKey::derive(&job, 0, "seed");
    assert_ne!(base, IdempotencyKey::derive(&JobId::from_string("job-b"), 0, "seed"));
    assert_ne!(base, IdempotencyKey::derive(&job, 1, "seed"));
    assert_ne!(base, IdempotencyKey::derive(&job, 0, "other"));
}

#[test]
fn derived_seed_is_stable_across_retries() {
    let job = JobId::from_string("job-a");
    let op = operation(OperationType::PatchFields, &["rec-1"]);
    assert_eq!(derive_seed(&job, 2, &op), derive_seed(&job, 2, &op));
}

#[test]
fn derived_seed_tracks_operation_content() {
    let job = JobId::from_string("job-a");
    let op = operation(OperationType::PatchFields, &["rec-1"]);

    let mut retargeted = op.clone();
    retargeted.targets = vec!["rec-2".to_string()];
    assert_ne!(derive_seed(&job, 0, &op), derive_seed(&job, 0, &retargeted));

    let mut repatched = op.clone();
    repatched.patch.insert(
        "brand".to_string(),
        crate::patch::PatchValue::Set(serde_json::json!("other")),
    );
    assert_ne!(derive_seed(&job, 0, &op), derive_seed(&job, 0, &repatched));

    let mut retyped = op.clone();
    retyped.op_type = OperationType::Rename;
    assert_ne!(derive_seed(&job, 0, &op), derive_seed(&job, 0, &retyped));
}

#[test]
fn record_expiry() {
    let record = IdempotencyRecord {
        key: IdempotencyKey::derive(&JobId::from_string("job-a"), 0, "s"),
        job_id: JobId::from_string("job-a"),
        operation_type: "patch_fields".to_string(),
        targets: vec!["rec-1".to_string()],
        result: None,
        executed_at_ms: 1_000,
        expires_at_ms: 2_000,
    };
    assert!(!record.expired(1_500));
    assert!(record.expired(2_001));
}

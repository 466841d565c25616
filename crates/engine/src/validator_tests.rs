// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use curator_core::test_support::{operation, plan_with_ops};
use curator_core::{OperationType, PatchValue};

fn validator() -> Validator {
    Validator::new(&CuratorConfig::default())
}

#[test]
fn valid_plan_passes_with_no_findings() {
    let plan = plan_with_ops(vec![operation(OperationType::PatchFields, &["rec-1"])]);
    let validated = validator().validate(plan).unwrap();
    assert!(validated.warnings().is_empty());
    assert_eq!(validated.plan().operations.len(), 1);
}

#[test]
fn empty_plan_is_valid() {
    let validated = validator().validate(plan_with_ops(vec![])).unwrap();
    assert!(validated.plan().is_empty());
}

#[test]
fn operation_count_limit() {
    let ops = (0..51)
        .map(|_| operation(OperationType::PatchFields, &["rec-1"]))
        .collect();
    let result = validator().validate(plan_with_ops(ops)).unwrap_err();
    assert!(result.errors[0].contains("51 operations"));
}

#[test]
fn distinct_target_limit() {
    let targets: Vec<String> = (0..26).map(|i| format!("rec-{i}")).collect();
    let refs: Vec<&str> = targets.iter().map(String::as_str).collect();
    let result = validator()
        .validate(plan_with_ops(vec![operation(OperationType::PatchFields, &refs)]))
        .unwrap_err();
    assert!(result.errors[0].contains("26 distinct targets"));
}

#[test]
fn mutating_operation_requires_targets_and_seed() {
    let mut no_targets = operation(OperationType::Rename, &[]);
    no_targets.rationale = "rename".to_string();
    let mut no_seed = operation(OperationType::PatchFields, &["rec-1"]);
    no_seed.idempotency_key_seed = String::new();

    let result = validator()
        .validate(plan_with_ops(vec![no_targets, no_seed]))
        .unwrap_err();
    assert!(result.errors.iter().any(|e| e.contains("operation 0 has no targets")));
    assert!(result.errors.iter().any(|e| e.contains("operation 1 has no idempotency seed")));
}

#[test]
fn no_op_is_exempt_from_mutating_checks() {
    let mut noop = operation(OperationType::NoOp, &[]);
    noop.patch.clear();
    noop.idempotency_key_seed = String::new();
    assert!(validator().validate(plan_with_ops(vec![noop])).is_ok());
}

#[test]
fn disallowed_patch_path_is_an_error() {
    let mut op = operation(OperationType::PatchFields, &["rec-1"]);
    op.patch.insert(
        "internal_audit_flags".to_string(),
        PatchValue::Set(serde_json::json!(true)),
    );
    let result = validator().validate(plan_with_ops(vec![op])).unwrap_err();
    assert!(result.errors[0].contains("disallowed path 'internal_audit_flags'"));
}

#[yare::parameterized(
    flat_name        = { "name" },
    flat_brand       = { "brand" },
    flat_tags        = { "tags" },
    deep_attributes  = { "attributes.finish.color" },
    deep_dimensions  = { "dimensions.width_cm" },
)]
fn allowlisted_paths_pass(path: &str) {
    let mut op = operation(OperationType::PatchFields, &["rec-1"]);
    op.patch.insert(path.to_string(), PatchValue::Set(serde_json::json!("walnut")));
    assert!(validator().validate(plan_with_ops(vec![op])).is_ok());
}

#[test]
fn array_index_path_is_an_error() {
    let mut op = operation(OperationType::PatchFields, &["rec-1"]);
    op.patch.insert(
        "tags.0".to_string(),
        PatchValue::Set(serde_json::json!("modern")),
    );
    let result = validator().validate(plan_with_ops(vec![op])).unwrap_err();
    assert!(result.errors[0].contains("array index"));
}

#[test]
fn critical_risk_is_refused_high_risk_warns() {
    let mut critical = operation(OperationType::Merge, &["rec-1", "rec-2"]);
    critical.risk_level = RiskLevel::Critical;
    let result = validator().validate(plan_with_ops(vec![critical])).unwrap_err();
    assert!(result.errors[0].contains("critical risk"));

    let mut high = operation(OperationType::Merge, &["rec-1", "rec-2"]);
    high.risk_level = RiskLevel::High;
    let validated = validator().validate(plan_with_ops(vec![high])).unwrap();
    assert_eq!(validated.warnings(), ["operation 0 is high risk"]);
}

#[test]
fn missing_rationale_is_a_warning_not_an_error() {
    let mut op = operation(OperationType::PatchFields, &["rec-1"]);
    op.rationale = String::new();
    let validated = validator().validate(plan_with_ops(vec![op])).unwrap();
    assert_eq!(validated.warnings(), ["operation 0 carries no rationale"]);
}

#[test]
fn errors_accumulate_across_operations() {
    let mut bad_path = operation(OperationType::PatchFields, &["rec-1"]);
    bad_path.patch.insert(
        "secret".to_string(),
        PatchValue::Set(serde_json::json!(1)),
    );
    let mut no_payload = operation(OperationType::Reassign, &["rec-2"]);
    no_payload.patch.clear();

    let result = validator()
        .validate(plan_with_ops(vec![bad_path, no_payload]))
        .unwrap_err();
    assert_eq!(result.errors.len(), 2);
}

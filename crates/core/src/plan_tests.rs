// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{operation, plan_with_ops};

#[test]
fn risk_levels_are_ordered() {
    assert!(RiskLevel::Low < RiskLevel::Medium);
    assert!(RiskLevel::Medium < RiskLevel::High);
    assert!(RiskLevel::High < RiskLevel::Critical);
}

#[test]
fn risk_parse_rejects_unknown() {
    assert_eq!(RiskLevel::parse("medium"), Some(RiskLevel::Medium));
    assert_eq!(RiskLevel::parse("catastrophic"), None);
}

#[test]
fn operation_type_round_trips_known_strings() {
    for s in ["patch_fields", "rename", "merge", "create", "delete_alias", "reassign", "no_op"] {
        let op = OperationType::parse(s);
        assert!(op.is_known(), "{s} should be known");
        assert_eq!(op.as_str(), s);
    }
}

#[test]
fn unknown_operation_type_is_preserved_and_mutating() {
    let op = OperationType::parse("drop_table");
    assert_eq!(op, OperationType::Unknown("drop_table".to_string()));
    assert!(!op.is_known());
    // Unknown types must never look harmless
    assert!(op.is_mutating());
}

#[test]
fn no_op_never_mutates() {
    assert!(!OperationType::NoOp.is_mutating());
    assert!(OperationType::PatchFields.is_mutating());
    assert!(OperationType::Merge.is_mutating());
}

#[test]
fn distinct_targets_dedupes_across_operations() {
    let plan = plan_with_ops(vec![
        operation(OperationType::PatchFields, &["rec-1", "rec-2"]),
        operation(OperationType::Rename, &["rec-2", "rec-3"]),
    ]);
    assert_eq!(plan.distinct_targets(), 3);
}

#[test]
fn empty_plan_is_valid_shape() {
    let plan = plan_with_ops(vec![]);
    assert!(plan.is_empty());
    assert_eq!(plan.max_risk_level, RiskLevel::Low);
}

#[test]
fn plan_serde_round_trip() {
    let plan = plan_with_ops(vec![operation(OperationType::PatchFields, &["rec-1"])]);
    let json = serde_json::to_string(&plan).unwrap();
    let back: ChangePlan = serde_json::from_str(&json).unwrap();
    assert_eq!(back, plan);
}

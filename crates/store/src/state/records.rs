// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Idempotency marker and change journal event handlers.

use super::DurableState;
use crate::event::StoreEvent;

pub(crate) fn apply(state: &mut DurableState, event: &StoreEvent) {
    match event {
        StoreEvent::IdempotencyRecorded { record } => {
            // First write wins; a replayed record never moves executed_at_ms
            if !state.idempotency.contains_key(record.key.as_str()) {
                state.idempotency.insert(record.key.as_str().to_string(), record.clone());
            }
        }

        StoreEvent::IdempotencyPruned { keys } => {
            for key in keys {
                state.idempotency.remove(key);
            }
        }

        StoreEvent::JournalAppended { entry } => {
            // Journal entries are append-only: never overwrite an existing
            // (job, attempt) record
            let key = entry.storage_key();
            if !state.journal.contains_key(&key) {
                state.journal.insert(key, entry.clone());
            }
        }

        StoreEvent::JournalPruned { keys } => {
            for key in keys {
                state.journal.remove(key);
            }
        }

        _ => {}
    }
}

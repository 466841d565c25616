// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource lock event handlers.

use super::DurableState;
use crate::event::StoreEvent;

pub(crate) fn apply(state: &mut DurableState, event: &StoreEvent) {
    match event {
        StoreEvent::LockAcquired { lock } => {
            // Acquisition preconditions (free, expired, or takeover) were
            // checked at commit time; replay just installs the winner.
            state.locks.insert(lock.resource_key.clone(), lock.clone());
        }

        StoreEvent::LockRenewed { resource_key, expires_at_ms } => {
            if let Some(lock) = state.locks.get_mut(resource_key) {
                lock.expires_at_ms = *expires_at_ms;
            }
        }

        StoreEvent::LockReleased { resource_key } => {
            state.locks.remove(resource_key);
        }

        _ => {}
    }
}

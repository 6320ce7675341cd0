//! Storage of singleton instances.
//!
//! Each singleton binding owns a slot created with the container. The map of slots is never
//! modified afterwards, so concurrent resolutions only synchronize on the slot of the key they build.
//! The first caller reaching a vacant slot runs the factory outside of the lock while later callers
//! wait for the outcome of this attempt.

use std::collections::HashMap;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace, warn};

use crate::binding::Instance;
use crate::error::{Result, WiringError};
use crate::key::TypeKey;

#[derive(Default)]
struct SlotState {
    value: Option<Instance>,
    building: bool,
    /// Number of the latest attempt to run the factory
    attempt: u64,
    /// Failure of an attempt, delivered to the callers that waited on it
    failure: Option<(u64, WiringError)>,
}

#[derive(Default)]
struct Slot {
    state: Mutex<SlotState>,
    published: Condvar,
}

/// Reset the slot if the factory unwinds, to avoid wedging waiting callers
struct Attempt<'a> {
    slot: &'a Slot,
    finished: bool,
}

impl Drop for Attempt<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.slot.state.lock().building = false;
            self.slot.published.notify_all();
        }
    }
}

pub(crate) struct InstanceCache {
    slots: HashMap<TypeKey, Slot>,
}

impl InstanceCache {
    /// Create one vacant slot for each singleton key
    pub(crate) fn new<'a>(singletons: impl IntoIterator<Item = &'a TypeKey>) -> Self {
        Self {
            slots: singletons
                .into_iter()
                .map(|k| (k.clone(), Slot::default()))
                .collect(),
        }
    }

    /// Retrieve the instance of a singleton if it was already created
    pub(crate) fn get(&self, key: &TypeKey) -> Option<Instance> {
        self.slots.get(key)?.state.lock().value.clone()
    }

    pub(crate) fn is_ready(&self, key: &TypeKey) -> bool {
        self.slots
            .get(key)
            .map(|s| s.state.lock().value.is_some())
            .unwrap_or(false)
    }

    pub(crate) fn ready_count(&self) -> usize {
        self.slots
            .values()
            .filter(|s| s.state.lock().value.is_some())
            .count()
    }

    /// Get the instance of a singleton, running the factory if needed.
    ///
    /// The factory is called by at most one caller at a time, and never again once it succeeded.
    /// If it fails, the error is returned to all callers waiting on this attempt and the slot stays
    /// vacant for later calls. Keys without a slot are built without caching.
    pub(crate) fn get_or_create<F>(&self, key: &TypeKey, factory: F) -> Result<Instance>
    where
        F: FnOnce() -> Result<Instance>,
    {
        let Some(slot) = self.slots.get(key) else {
            return factory();
        };

        let mut state = slot.state.lock();
        loop {
            if let Some(value) = &state.value {
                trace!(key = %key, "Singleton cache hit");
                return Ok(value.clone());
            }
            if !state.building {
                break;
            }
            let waiting_on = state.attempt;
            trace!(key = %key, attempt = waiting_on, "Waiting for singleton construction");
            slot.published.wait(&mut state);
            if state.value.is_none() {
                if let Some((attempt, err)) = &state.failure {
                    if *attempt == waiting_on {
                        return Err(err.clone());
                    }
                }
            }
        }

        state.building = true;
        state.attempt += 1;
        let attempt = state.attempt;
        drop(state);

        let mut guard = Attempt {
            slot,
            finished: false,
        };
        debug!(key = %key, attempt, "Constructing singleton");
        let result = factory();

        let mut state = slot.state.lock();
        state.building = false;
        guard.finished = true;
        let result = match result {
            Ok(value) => {
                state.value = Some(value.clone());
                state.failure = None;
                Ok(value)
            }
            Err(err) => {
                warn!(key = %key, attempt, error = %err, "Singleton construction failed");
                state.failure = Some((attempt, err.clone()));
                Err(err)
            }
        };
        drop(state);
        slot.published.notify_all();
        result
    }
}

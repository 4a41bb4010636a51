use std::collections::{BTreeMap, BTreeSet};

use warden_core::{AuthenticationPolicy, HandlerFailure, HandlerMap, HandlerResult};

use crate::attempt::{Attempt, Completed};

type Slot = (usize, Result<HandlerResult, HandlerFailure>);

/// Per-call collection of handler outcomes.
///
/// Each handler name owns one slot. When the same handler runs for several
/// credentials, the attempt dispatched last wins the slot no matter which one
/// finished last, which keeps the maps independent of scheduling.
pub(crate) struct Aggregate {
    slots: BTreeMap<String, Slot>,
    pending: BTreeMap<String, usize>,
}

impl Aggregate {
    pub(crate) fn new(plan: &[Attempt]) -> Self {
        let mut pending = BTreeMap::new();
        for attempt in plan {
            *pending.entry(attempt.handler.name().to_string()).or_insert(0) += 1;
        }
        Self {
            slots: BTreeMap::new(),
            pending,
        }
    }

    pub(crate) fn record(&mut self, completed: Completed) {
        let Completed {
            index,
            handler_name,
            outcome,
        } = completed;

        if let Some(remaining) = self.pending.get_mut(&handler_name) {
            *remaining -= 1;
            if *remaining == 0 {
                self.pending.remove(&handler_name);
            }
        }

        if let Some((existing, _)) = self.slots.get(&handler_name) {
            tracing::warn!(
                handler = %handler_name,
                "Duplicate handler name within one authentication call; the later attempt overwrites the earlier result"
            );
            if *existing > index {
                return;
            }
        }
        self.slots.insert(handler_name, (index, outcome));
    }

    pub(crate) fn pending(&self) -> BTreeSet<String> {
        self.pending.keys().cloned().collect()
    }

    /// Successes and failures, each ordered by dispatch position.
    pub(crate) fn maps(&self) -> (HandlerMap<HandlerResult>, HandlerMap<HandlerFailure>) {
        let mut ordered: Vec<(&String, &Slot)> = self.slots.iter().collect();
        ordered.sort_by_key(|(_, (index, _))| *index);

        let successes = ordered
            .iter()
            .filter_map(|(name, (_, outcome))| {
                outcome
                    .as_ref()
                    .ok()
                    .map(|result| ((*name).clone(), result.clone()))
            })
            .collect();
        let failures = ordered
            .iter()
            .filter_map(|(name, (_, outcome))| {
                outcome
                    .as_ref()
                    .err()
                    .map(|failure| ((*name).clone(), failure.clone()))
            })
            .collect();
        (successes, failures)
    }

    pub(crate) fn is_settled(&self, policy: &dyn AuthenticationPolicy) -> bool {
        let (successes, failures) = self.maps();
        policy.is_settled(&successes, &failures, &self.pending())
    }
}

//! Store-local fault points used to exercise abort paths.

use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::Mutex;

use crate::SpatioGraphError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    CreateIndividual,
    RemoveIndividual,
    WriteObjectProperty,
    RemoveObjectProperty,
    WriteDataProperty,
    RemoveDataProperty,
    ExecuteQuery,
    BeforeCommit,
}

struct FaultEntry {
    skip: usize,
    remaining: usize,
}

/// Fault registry owned by one store, so concurrent tests never share state.
#[derive(Clone, Default)]
pub struct FaultInjector {
    registry: Arc<Mutex<AHashMap<FaultPoint, FaultEntry>>>,
}

impl FaultInjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&self) {
        self.registry.lock().clear();
    }

    /// Fails the next `failures` hits of `point`.
    pub fn configure(&self, point: FaultPoint, failures: usize) {
        self.configure_after(point, 0, failures);
    }

    /// Lets `skip` hits of `point` pass, then fails the following `failures` hits.
    pub fn configure_after(&self, point: FaultPoint, skip: usize, failures: usize) {
        let mut guard = self.registry.lock();
        if failures == 0 {
            guard.remove(&point);
        } else {
            guard.insert(
                point,
                FaultEntry {
                    skip,
                    remaining: failures,
                },
            );
        }
    }

    pub(crate) fn check(&self, point: FaultPoint) -> Result<(), SpatioGraphError> {
        let mut guard = self.registry.lock();
        if let Some(entry) = guard.get_mut(&point) {
            if entry.skip > 0 {
                entry.skip -= 1;
                return Ok(());
            }
            entry.remaining -= 1;
            if entry.remaining == 0 {
                guard.remove(&point);
            }
            return Err(SpatioGraphError::fault_injection(format!("{point:?}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skipped_hits_pass_then_fail() {
        let faults = FaultInjector::new();
        faults.configure_after(FaultPoint::WriteObjectProperty, 1, 1);
        assert!(faults.check(FaultPoint::WriteObjectProperty).is_ok());
        assert!(faults.check(FaultPoint::WriteObjectProperty).is_err());
        assert!(faults.check(FaultPoint::WriteObjectProperty).is_ok());
        assert!(faults.check(FaultPoint::CreateIndividual).is_ok());
    }

    #[test]
    fn zero_failures_clears_point() {
        let faults = FaultInjector::new();
        faults.configure(FaultPoint::BeforeCommit, 2);
        faults.configure(FaultPoint::BeforeCommit, 0);
        assert!(faults.check(FaultPoint::BeforeCommit).is_ok());
    }
}

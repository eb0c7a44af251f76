use std::ops::{Deref, DerefMut};

use crate::errors::Result;

use super::StoreTransaction;

enum ScopeInner<'p, T> {
    Owned(Option<T>),
    Joined(&'p mut T),
}

/// A transaction owned by one operation, or joined from a caller's scope.
///
/// An owned scope commits or aborts its transaction. A joined scope never
/// commits on its own: committing it is a no-op that leaves the decision to
/// the parent, while aborting it (or dropping it unresolved) marks the parent
/// rollback-only.
pub struct TransactionScope<'p, T: StoreTransaction> {
    inner: ScopeInner<'p, T>,
    resolved: bool,
}

impl<'p, T: StoreTransaction> TransactionScope<'p, T> {
    pub fn owned(txn: T) -> Self {
        Self {
            inner: ScopeInner::Owned(Some(txn)),
            resolved: false,
        }
    }

    pub fn join(parent: &'p mut T) -> Self {
        Self {
            inner: ScopeInner::Joined(parent),
            resolved: false,
        }
    }

    pub fn is_joined(&self) -> bool {
        matches!(self.inner, ScopeInner::Joined(_))
    }

    pub fn commit(mut self) -> Result<()> {
        self.resolved = true;
        match &mut self.inner {
            ScopeInner::Owned(txn) => match txn.take() {
                Some(txn) => txn.commit(),
                None => Ok(()),
            },
            ScopeInner::Joined(_) => Ok(()),
        }
    }

    pub fn abort(mut self) -> Result<()> {
        self.resolved = true;
        match &mut self.inner {
            ScopeInner::Owned(txn) => match txn.take() {
                Some(txn) => txn.abort(),
                None => Ok(()),
            },
            ScopeInner::Joined(parent) => {
                parent.mark_rollback_only();
                Ok(())
            }
        }
    }

    /// Commits on `Ok`, aborts on `Err`, and returns the original outcome.
    /// An abort failure never masks the error that caused it.
    pub fn finish<R>(self, outcome: Result<R>) -> Result<R> {
        match outcome {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(abort_err) = self.abort() {
                    tracing::warn!(error = %abort_err, "abort failed after operation error");
                }
                Err(err)
            }
        }
    }
}

impl<T: StoreTransaction> Deref for TransactionScope<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.inner {
            ScopeInner::Owned(Some(txn)) => txn,
            ScopeInner::Owned(None) => unreachable!("transaction scope used after resolution"),
            ScopeInner::Joined(parent) => &**parent,
        }
    }
}

impl<T: StoreTransaction> DerefMut for TransactionScope<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        match &mut self.inner {
            ScopeInner::Owned(Some(txn)) => txn,
            ScopeInner::Owned(None) => unreachable!("transaction scope used after resolution"),
            ScopeInner::Joined(parent) => &mut **parent,
        }
    }
}

impl<T: StoreTransaction> Drop for TransactionScope<'_, T> {
    fn drop(&mut self) {
        if self.resolved {
            return;
        }
        // owned transactions roll themselves back when dropped
        if let ScopeInner::Joined(parent) = &mut self.inner {
            parent.mark_rollback_only();
        }
    }
}

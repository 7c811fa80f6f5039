//! Run-time guard against re-entrant construction.
//!
//! Static cycles are caught while the request graph is built. Deferred
//! wrappers (`Lazy`, `FactoryOf`) and delegates can still re-enter a factory
//! while it is being constructed; this thread-local stack turns that into a
//! `RecursiveDependencyDetected` error instead of a deadlock or overflow.

use std::cell::RefCell;

use crate::error::{DiError, DiResult};
use crate::registration::FactoryId;

pub(crate) const MAX_DEPTH: usize = 1024;

thread_local! {
    static CONSTRUCTION_STACK: RefCell<Vec<(FactoryId, &'static str)>> = const { RefCell::new(Vec::new()) };
}

/// Marks a factory as under construction on this thread until dropped.
pub(crate) struct ConstructionGuard {
    id: FactoryId,
}

impl ConstructionGuard {
    pub(crate) fn enter(id: FactoryId, name: &'static str) -> DiResult<Self> {
        CONSTRUCTION_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();

            // Re-entry check before pushing
            if let Some(pos) = stack.iter().position(|(entry, _)| *entry == id) {
                let mut path: Vec<&'static str> = stack[pos..].iter().map(|(_, n)| *n).collect();
                path.push(name);
                return Err(DiError::RecursiveDependencyDetected { path });
            }

            if stack.len() >= MAX_DEPTH {
                return Err(DiError::DepthExceeded(stack.len()));
            }

            stack.push((id, name));
            Ok(Self { id })
        })
    }
}

impl Drop for ConstructionGuard {
    fn drop(&mut self) {
        CONSTRUCTION_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(pos) = stack.iter().rposition(|(entry, _)| *entry == self.id) {
                stack.truncate(pos);
            }
        });
    }
}

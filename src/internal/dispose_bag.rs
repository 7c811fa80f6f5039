//! Ordered store of disposal hooks owned by a scope.

use std::future::Future;
use std::pin::Pin;

/// Future type for disposal operations.
pub(crate) type BoxFutureUnit = Pin<Box<dyn Future<Output = ()> + Send>>;

pub(crate) type SyncDisposer = Box<dyn FnOnce() + Send>;
pub(crate) type AsyncDisposer = Box<dyn FnOnce() -> BoxFutureUnit + Send>;

enum Hook {
    Sync(SyncDisposer),
    Async(AsyncDisposer),
}

/// Disposal hooks in tracking order.
///
/// Hooks run in reverse order of tracking, sync and async interleaved, so a
/// service is always released before the dependencies created ahead of it.
#[derive(Default)]
pub(crate) struct DisposeBag {
    hooks: Vec<Hook>,
}

impl DisposeBag {
    pub(crate) fn push_sync(&mut self, f: SyncDisposer) {
        self.hooks.push(Hook::Sync(f));
    }

    pub(crate) fn push_async(&mut self, f: AsyncDisposer) {
        self.hooks.push(Hook::Async(f));
    }

    /// Runs sync hooks LIFO. Async hooks cannot be awaited here and are dropped.
    ///
    /// Returns the number of async hooks skipped.
    pub(crate) fn run_all_sync_reverse(&mut self) -> usize {
        let mut skipped = 0;
        while let Some(hook) = self.hooks.pop() {
            match hook {
                Hook::Sync(f) => f(),
                Hook::Async(_) => skipped += 1,
            }
        }
        skipped
    }

    /// Runs every hook LIFO, awaiting async ones in place.
    pub(crate) async fn run_all_reverse(&mut self) {
        while let Some(hook) = self.hooks.pop() {
            match hook {
                Hook::Sync(f) => f(),
                Hook::Async(f) => f().await,
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.hooks.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn sync_hooks_run_in_reverse() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bag = DisposeBag::default();
        for i in 0..3 {
            let log = log.clone();
            bag.push_sync(Box::new(move || log.lock().push(i)));
        }
        assert_eq!(bag.len(), 3);
        assert_eq!(bag.run_all_sync_reverse(), 0);
        assert_eq!(*log.lock(), vec![2, 1, 0]);
        assert!(bag.is_empty());
    }

    #[tokio::test]
    async fn async_and_sync_hooks_interleave() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bag = DisposeBag::default();
        let l = log.clone();
        bag.push_sync(Box::new(move || l.lock().push("sync-first")));
        let l = log.clone();
        bag.push_async(Box::new(move || Box::pin(async move { l.lock().push("async") })));
        let l = log.clone();
        bag.push_sync(Box::new(move || l.lock().push("sync-last")));

        bag.run_all_reverse().await;
        assert_eq!(*log.lock(), vec!["sync-last", "async", "sync-first"]);
    }
}

//! Cooperative cancellation (spec.md §5). A plain `Arc<AtomicBool>` handle
//! rather than `tokio_util::sync::CancellationToken` — pulling in
//! `tokio-util` for one bool is exactly the allocation/dependency bloat §1
//! argues against.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

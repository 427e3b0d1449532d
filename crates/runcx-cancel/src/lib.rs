// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! runcx-cancel
#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::fmt;
use std::sync::{
    Arc, Mutex, Weak,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;
use tokio::sync::Notify;

struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
    children: Mutex<Vec<Weak<Inner>>>,
    parent: Weak<Inner>,
}

impl Inner {
    fn new(parent: Weak<Inner>) -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            notify: Notify::new(),
            children: Mutex::new(Vec::new()),
            parent,
        }
    }

    fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        self.notify.notify_waiters();
        let children = std::mem::take(
            &mut *self
                .children
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        );
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel();
        }
    }
}

impl Drop for Inner {
    // Keeps a long-lived parent's child list bounded by its live children.
    fn drop(&mut self) {
        if let Some(parent) = self.parent.upgrade() {
            parent
                .children
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .retain(|weak| weak.strong_count() > 0);
        }
    }
}

/// Cooperative cancellation token.
///
/// Cloneable and backed by an `Arc`; calling [`cancel`](CancelToken::cancel)
/// on any clone signals all waiters. Child tokens follow their parent but can
/// also be cancelled on their own without affecting it.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    /// Create a new, non-cancelled token.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner::new(Weak::new())),
        }
    }

    /// Create a token that cancels itself once `timeout` elapses.
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_timeout(timeout: Duration) -> Self {
        let token = Self::new();
        token.cancel_after(timeout);
        token
    }

    /// Signal cancellation to all waiters and child tokens.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// Returns `true` if cancellation has been signalled.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Wait until cancellation is signalled (returns immediately if already cancelled).
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent cancel is not missed.
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Create a token that is cancelled whenever this one is.
    pub fn child_token(&self) -> CancelToken {
        let child = CancelToken {
            inner: Arc::new(Inner::new(Arc::downgrade(&self.inner))),
        };
        let mut children = self
            .inner
            .children
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if self.is_cancelled() {
            child.cancel();
        } else {
            children.push(Arc::downgrade(&child.inner));
        }
        child
    }

    /// Cancel this token once `delay` elapses.
    ///
    /// Must be called from within a tokio runtime.
    pub fn cancel_after(&self, delay: Duration) {
        let token = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => token.cancel(),
                _ = token.cancelled() => {}
            }
        });
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn new_token_is_not_cancelled() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn cancel_is_visible_on_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
        token.cancelled().await;
    }

    #[tokio::test]
    async fn waiter_wakes_on_cancel() {
        let token = CancelToken::new();
        let waiter = {
            let token = token.clone();
            tokio::spawn(async move { token.cancelled().await })
        };
        tokio::task::yield_now().await;
        token.cancel();
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn child_follows_parent() {
        let parent = CancelToken::new();
        let child = parent.child_token();
        assert!(!child.is_cancelled());
        parent.cancel();
        assert!(child.is_cancelled());
    }

    #[tokio::test]
    async fn child_cancel_does_not_reach_parent() {
        let parent = CancelToken::new();
        let child = parent.child_token();
        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[tokio::test]
    async fn child_of_cancelled_parent_starts_cancelled() {
        let parent = CancelToken::new();
        parent.cancel();
        assert!(parent.child_token().is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn with_timeout_fires_after_deadline() {
        let token = CancelToken::with_timeout(Duration::from_secs(5));
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(!token.is_cancelled());
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn dropped_children_leave_the_parent() {
        let parent = CancelToken::new();
        let live = parent.child_token();
        for _ in 0..10 {
            let child = parent.child_token();
            child.cancel();
        }
        let tracked = parent.inner.children.lock().unwrap().len();
        assert_eq!(tracked, 1);
        parent.cancel();
        assert!(live.is_cancelled());
    }
}

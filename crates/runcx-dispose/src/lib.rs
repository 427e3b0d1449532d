// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! runcx-dispose
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Deterministic, failure-aggregating teardown for groups of resources.

use async_trait::async_trait;
use std::error::Error as StdError;
use std::fmt;
use tracing::{trace, warn};

/// Boxed error type produced by [`Disposable::dispose`].
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

// ---------------------------------------------------------------------------
// Disposable
// ---------------------------------------------------------------------------

/// A resource that must be released explicitly.
#[async_trait]
pub trait Disposable: Send {
    /// Release the resource. Called at most once by a [`DisposableRegistry`].
    async fn dispose(&mut self) -> Result<(), BoxError>;
}

#[async_trait]
impl<T: Disposable + ?Sized> Disposable for Box<T> {
    async fn dispose(&mut self) -> Result<(), BoxError> {
        (**self).dispose().await
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Order in which a registry releases its items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisposeOrder {
    /// Last added, first released.
    #[default]
    Reverse,
    /// Released in insertion order.
    Forward,
}

/// Construction-time behaviour of a [`DisposableRegistry`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryOptions {
    /// Dispose items taken out through [`remove`](DisposableRegistry::remove)
    /// or [`clear`](DisposableRegistry::clear).
    pub dispose_on_remove: bool,
    /// Release order for `clear` and `dispose`.
    pub order: DisposeOrder,
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

/// Failures collected while releasing items.
#[derive(Debug)]
pub enum DisposeFailure {
    /// Exactly one item failed.
    Single(BoxError),
    /// More than one item failed; errors are kept in release order.
    Aggregate(Vec<BoxError>),
}

impl DisposeFailure {
    /// Number of items that failed.
    pub fn len(&self) -> usize {
        match self {
            DisposeFailure::Single(_) => 1,
            DisposeFailure::Aggregate(errors) => errors.len(),
        }
    }

    /// Always `false`; a failure holds at least one error.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Iterate the individual errors in release order.
    pub fn errors(&self) -> impl Iterator<Item = &(dyn StdError + Send + Sync + 'static)> {
        let slice: &[BoxError] = match self {
            DisposeFailure::Single(e) => std::slice::from_ref(e),
            DisposeFailure::Aggregate(errors) => errors,
        };
        slice.iter().map(|e| &**e)
    }

    fn push(self, err: BoxError) -> Self {
        match self {
            DisposeFailure::Single(first) => DisposeFailure::Aggregate(vec![first, err]),
            DisposeFailure::Aggregate(mut errors) => {
                errors.push(err);
                DisposeFailure::Aggregate(errors)
            }
        }
    }
}

impl fmt::Display for DisposeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisposeFailure::Single(e) => write!(f, "failed to dispose resource: {e}"),
            DisposeFailure::Aggregate(errors) => {
                write!(f, "{} resources failed to dispose", errors.len())?;
                for e in errors {
                    write!(f, "; {e}")?;
                }
                Ok(())
            }
        }
    }
}

impl StdError for DisposeFailure {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            DisposeFailure::Single(e) => Some(&**e),
            DisposeFailure::Aggregate(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// An ordered collection of [`Disposable`] items.
///
/// The registry moves from *active* to *disposed* exactly once. Items added
/// after that point are released immediately instead of being stored.
/// Release failures never abort a teardown; they are kept and exposed through
/// [`failure`](Self::failure).
pub struct DisposableRegistry<T: Disposable> {
    items: Vec<T>,
    options: RegistryOptions,
    disposed: bool,
    failure: Option<DisposeFailure>,
}

impl<T: Disposable> DisposableRegistry<T> {
    /// Create an empty registry with default options.
    pub fn new() -> Self {
        Self::with_options(RegistryOptions::default())
    }

    /// Create an empty registry with explicit options.
    pub fn with_options(options: RegistryOptions) -> Self {
        Self {
            items: Vec::new(),
            options,
            disposed: false,
            failure: None,
        }
    }

    /// Options the registry was built with.
    pub fn options(&self) -> RegistryOptions {
        self.options
    }

    /// Add an item. On a disposed registry the item is released right away.
    pub async fn add(&mut self, mut item: T) {
        if self.disposed {
            trace!(target: "runcx.dispose", "add after dispose; releasing immediately");
            self.release(&mut item).await;
            return;
        }
        self.items.push(item);
    }

    /// Remove the first item equal to `item`.
    ///
    /// Returns `false` if no such item is held. The removed item is released
    /// when the registry was built with `dispose_on_remove`.
    pub async fn remove(&mut self, item: &T) -> bool
    where
        T: PartialEq,
    {
        let Some(idx) = self.items.iter().position(|held| held == item) else {
            return false;
        };
        let mut removed = self.items.remove(idx);
        if self.options.dispose_on_remove {
            self.release(&mut removed).await;
        }
        true
    }

    /// Returns `true` if an item equal to `item` is held.
    pub fn contains(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        self.items.iter().any(|held| held == item)
    }

    /// Remove every item, releasing them when `dispose_on_remove` is set.
    ///
    /// The registry stays active.
    pub async fn clear(&mut self) {
        let items = std::mem::take(&mut self.items);
        if self.options.dispose_on_remove {
            self.release_all(items).await;
        }
    }

    /// Release every held item and mark the registry disposed.
    ///
    /// Calling this more than once has no further effect.
    pub async fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        let items = std::mem::take(&mut self.items);
        trace!(target: "runcx.dispose", count = items.len(), "disposing registry");
        self.release_all(items).await;
    }

    /// Returns `true` once [`dispose`](Self::dispose) has run.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Number of held items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if no items are held.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate held items in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// Failures recorded so far, if any.
    pub fn failure(&self) -> Option<&DisposeFailure> {
        self.failure.as_ref()
    }

    /// Take the recorded failures, leaving none behind.
    pub fn take_failure(&mut self) -> Option<DisposeFailure> {
        self.failure.take()
    }

    async fn release_all(&mut self, mut items: Vec<T>) {
        if self.options.order == DisposeOrder::Reverse {
            items.reverse();
        }
        for mut item in items {
            self.release(&mut item).await;
        }
    }

    async fn release(&mut self, item: &mut T) {
        if let Err(err) = item.dispose().await {
            warn!(target: "runcx.dispose", error = %err, "resource failed to dispose");
            self.failure = Some(match self.failure.take() {
                None => DisposeFailure::Single(err),
                Some(prev) => prev.push(err),
            });
        }
    }
}

impl<T: Disposable> Default for DisposableRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Disposable> fmt::Debug for DisposableRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisposableRegistry")
            .field("len", &self.items.len())
            .field("options", &self.options)
            .field("disposed", &self.disposed)
            .field("failures", &self.failure.as_ref().map_or(0, DisposeFailure::len))
            .finish()
    }
}

impl<T: Disposable> Drop for DisposableRegistry<T> {
    fn drop(&mut self) {
        if !self.disposed && !self.items.is_empty() {
            warn!(
                target: "runcx.dispose",
                count = self.items.len(),
                "registry dropped without dispose; items released by drop only"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

// SPDX-License-Identifier: MIT OR Apache-2.0
//! One logical output stream fanned out to many sinks.

use async_trait::async_trait;
use runcx_dispose::{DisposableRegistry, DisposeFailure, RegistryOptions};
use std::io;
use tracing::{debug, warn};

use crate::error::disposed;
use crate::{Sink, SinkHandle};

/// Forwards every write to all of its members.
///
/// Members are either *owned* ([`bind`](Self::bind)), which the fan-out closes
/// when it is disposed or when they [`leave`](Self::leave), or *borrowed*
/// ([`with`](Self::with)), which are written to but never closed. Borrowing
/// is how the process's own stdout can take part without being shut.
///
/// The fan-out is not internally synchronised. When several pumps feed the
/// same fan-out, wrap it in a [`SinkHandle`].
pub struct FanoutSink {
    dispatch: Vec<SinkHandle>,
    owned: DisposableRegistry<SinkHandle>,
}

impl FanoutSink {
    /// Create an empty fan-out.
    pub fn new() -> Self {
        Self {
            dispatch: Vec::new(),
            owned: DisposableRegistry::with_options(RegistryOptions {
                dispose_on_remove: true,
                ..Default::default()
            }),
        }
    }

    fn ensure_active(&self) -> io::Result<()> {
        if self.owned.is_disposed() {
            Err(disposed())
        } else {
            Ok(())
        }
    }

    /// Add an owned member. Binding the same handle twice has no effect.
    pub async fn bind(&mut self, sink: SinkHandle) -> io::Result<()> {
        self.ensure_active()?;
        if !self.dispatch.contains(&sink) {
            self.dispatch.push(sink.clone());
        }
        if !self.owned.contains(&sink) {
            debug!(target: "runcx.fanout", sink = sink.label(), "bind owned sink");
            self.owned.add(sink).await;
        }
        Ok(())
    }

    /// Add a borrowed member. Adding the same handle twice has no effect.
    pub fn with(&mut self, sink: SinkHandle) -> io::Result<()> {
        self.ensure_active()?;
        if !self.dispatch.contains(&sink) {
            debug!(target: "runcx.fanout", sink = sink.label(), "attach borrowed sink");
            self.dispatch.push(sink);
        }
        Ok(())
    }

    /// Remove a member. Owned members are closed on the way out.
    ///
    /// Returns `false` if `sink` was not a member.
    pub async fn leave(&mut self, sink: &SinkHandle) -> io::Result<bool> {
        self.ensure_active()?;
        let before = self.dispatch.len();
        self.dispatch.retain(|member| member != sink);
        let was_owned = self.owned.remove(sink).await;
        Ok(was_owned || self.dispatch.len() != before)
    }

    /// Number of members, owned and borrowed.
    pub fn len(&self) -> usize {
        self.dispatch.len()
    }

    /// Returns `true` if there are no members.
    pub fn is_empty(&self) -> bool {
        self.dispatch.is_empty()
    }

    /// Returns `true` if `sink` is an owned member.
    pub fn owns(&self, sink: &SinkHandle) -> bool {
        self.owned.contains(sink)
    }

    /// Returns `true` once [`dispose`](Self::dispose) has run.
    pub fn is_disposed(&self) -> bool {
        self.owned.is_disposed()
    }

    /// Flush every member, then close the owned ones.
    ///
    /// Flush and close failures are kept rather than returned; see
    /// [`dispose_failure`](Self::dispose_failure). Idempotent.
    pub async fn dispose(&mut self) {
        if self.owned.is_disposed() {
            return;
        }
        for member in &mut self.dispatch {
            if let Err(err) = member.flush().await {
                warn!(target: "runcx.fanout", sink = member.label(), error = %err, "flush before dispose failed");
            }
        }
        self.dispatch.clear();
        self.owned.dispose().await;
    }

    /// Failures raised while closing owned members.
    pub fn dispose_failure(&self) -> Option<&DisposeFailure> {
        self.owned.failure()
    }

    fn settle(first_err: Option<io::Error>) -> io::Result<()> {
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Default for FanoutSink {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FanoutSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanoutSink")
            .field("members", &self.dispatch)
            .field("owned", &self.owned.len())
            .field("disposed", &self.owned.is_disposed())
            .finish()
    }
}

#[async_trait]
impl Sink for FanoutSink {
    /// Write to every member in attach order. All members are attempted even
    /// if one fails; the first failure is returned.
    async fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        self.ensure_active()?;
        let mut first_err = None;
        for member in &mut self.dispatch {
            if let Err(err) = member.write(buf).await {
                warn!(target: "runcx.fanout", sink = member.label(), error = %err, "member write failed");
                first_err.get_or_insert(err);
            }
        }
        Self::settle(first_err)
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.ensure_active()?;
        let mut first_err = None;
        for member in &mut self.dispatch {
            if let Err(err) = member.flush().await {
                warn!(target: "runcx.fanout", sink = member.label(), error = %err, "member flush failed");
                first_err.get_or_insert(err);
            }
        }
        Self::settle(first_err)
    }

    /// Same as [`FanoutSink::dispose`], surfacing the first close failure.
    async fn close(&mut self) -> io::Result<()> {
        self.dispose().await;
        match self.owned.failure() {
            Some(failure) => Err(io::Error::other(failure.to_string())),
            None => Ok(()),
        }
    }
}

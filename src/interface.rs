//! Driver-facing surface for controlling running streams.
//!
//! This module keeps scheduling concerns out of the stream internals: an
//! external scheduler polls streams through the [`crate::stream::FragmentStream`]
//! trait, snapshots their live estimates as [`StreamStats`], and cancels them
//! cooperatively via an `Arc<AtomicBool>` token.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

/// Cancellation token shared with a running stream.
///
/// Triggering it stops the stream from issuing new network requests; the
/// stream marks itself ended with whatever estimates it had at that point
/// rather than erroring from unrelated call sites.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }
    /// Request cancellation (cooperative). The stream observes it at its
    /// next suspension point.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A point-in-time snapshot of one stream's live estimates, for schedulers
/// and reporting. Infinite estimates serialize as JSON `null`.
#[derive(Clone, Debug, Serialize)]
pub struct StreamStats {
    pub pattern: String,
    #[serde(serialize_with = "finite_or_null")]
    pub cost: f64,
    #[serde(serialize_with = "finite_or_null")]
    pub cost_remaining: f64,
    #[serde(serialize_with = "finite_or_null")]
    pub remaining: f64,
    #[serde(serialize_with = "finite_or_null")]
    pub count: f64,
    pub match_rate: f64,
    pub ended: bool,
    pub triple_count: usize,
}

fn finite_or_null<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    if value.is_finite() {
        serializer.serialize_f64(*value)
    } else {
        serializer.serialize_none()
    }
}

//! The shared stream contract.
//!
//! Both stream roles — direct download and binding-driven — carry the same
//! accounting: a cost estimate in network round-trips, how much of that cost
//! is still unspent, the pattern being resolved, a termination flag and the
//! triples delivered so far. An external scheduler services streams through
//! the [`FragmentStream`] trait and reads the live estimates to pick which
//! stream deserves the next round-trip.

use async_trait::async_trait;

use crate::error::Result;
use crate::interface::{CancelToken, StreamStats};
use crate::pattern::{Pattern, Triple};

/// One batch of newly delivered triples. May be empty.
pub type Batch = Vec<Triple>;

// ------------- StreamCore -------------
// The accounting shared by both stream roles.
#[derive(Debug)]
pub struct StreamCore {
    pub(crate) pattern: Pattern,
    pub(crate) cost: f64,
    pub(crate) cost_remaining: f64,
    pub(crate) ended: bool,
    pub(crate) triples: Vec<Triple>,
}

impl StreamCore {
    pub(crate) fn new(cost: f64, pattern: Pattern) -> Self {
        Self {
            pattern,
            cost,
            cost_remaining: cost,
            ended: false,
            triples: Vec::new(),
        }
    }
    pub(crate) fn spend(&mut self, cost: f64) {
        self.cost_remaining -= cost;
    }
    // Delivered batches accumulate for inspection by the caller.
    pub(crate) fn absorb(&mut self, batch: &Batch) {
        self.triples.extend_from_slice(batch);
    }
}

// ------------- FragmentStream -------------
/// The polymorphic read/estimate contract both stream roles implement.
#[async_trait]
pub trait FragmentStream: Send {
    fn pattern(&self) -> &Pattern;
    /// Estimated network round-trips left to drain this stream. `+inf`
    /// while unknown.
    fn cost(&self) -> f64;
    /// `cost` minus what has already been spent on this stream's behalf.
    fn cost_remaining(&self) -> f64;
    /// Estimated results not yet delivered. `+inf` while unknown.
    fn remaining(&self) -> f64;
    /// Estimated total results. `+inf` while unknown.
    fn count(&self) -> f64;
    /// Fraction of sampled candidates that produced at least one result.
    fn match_rate(&self) -> f64 {
        1.0
    }
    /// Monotonic: once true, no further non-empty batch will be delivered.
    fn ended(&self) -> bool;
    /// Every triple delivered so far, in delivery order.
    fn triples(&self) -> &[Triple];
    fn triple_count(&self) -> usize {
        self.triples().len()
    }
    /// Record an externally-observed expenditure against this stream's
    /// budget, e.g. a round-trip consumed by a sibling sharing it.
    fn spend(&mut self, cost: f64);

    /// Deliver the next batch of triples. Completes no earlier than the
    /// next scheduler tick, even when the answer is already known, so
    /// recursive multiplexing cannot grow the call stack unboundedly.
    /// Source and metadata failures surface here as errors and leave the
    /// stream state untouched; an empty batch is never a disguised error.
    async fn read(&mut self, cancel: &CancelToken) -> Result<Batch>;

    /// Snapshot the live estimates for schedulers and reporting.
    fn stats(&self) -> StreamStats {
        StreamStats {
            pattern: self.pattern().to_string(),
            cost: self.cost(),
            cost_remaining: self.cost_remaining(),
            remaining: self.remaining(),
            count: self.count(),
            match_rate: self.match_rate(),
            ended: self.ended(),
            triple_count: self.triple_count(),
        }
    }
}

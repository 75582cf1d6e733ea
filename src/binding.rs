//! Binding-driven streaming: enumerate candidate values for one free
//! variable, fetch matches per value, and learn on the way whether the
//! aggregate estimates can be trusted.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use bimap::BiMap;
use roaring::RoaringTreemap;
use tokio::task::yield_now;
use tracing::debug;

use crate::config::StreamConfig;
use crate::download::DownloadStream;
use crate::error::{FragstreamError, Result};
use crate::interface::CancelToken;
use crate::pattern::{Node, Pattern, Triple};
use crate::source::{MetadataResolver, PagedSource};
use crate::stream::{Batch, FragmentStream, StreamCore};

// ------------- ValueKeeper -------------
// Interns candidate values to ids so membership can live in bitmaps.
#[derive(Debug)]
struct ValueKeeper {
    kept: BiMap<Node, u64>,
    next: u64,
}

impl ValueKeeper {
    fn new() -> Self {
        Self { kept: BiMap::new(), next: 0 }
    }
    fn keep(&mut self, value: Node) -> u64 {
        match self.kept.get_by_left(&value) {
            Some(id) => *id,
            None => {
                let id = self.next;
                self.next += 1;
                self.kept.insert(value, id);
                id
            }
        }
    }
    fn value(&self, id: u64) -> &Node {
        self.kept.get_by_right(&id).unwrap() // ids only ever come from keep
    }
}

// ------------- BindingQueue -------------
// Pending candidate values in first-seen order, set-deduplicated against
// everything ever fed or resolved. Queued and resolved ids stay disjoint.
#[derive(Debug)]
struct BindingQueue {
    keeper: ValueKeeper,
    queue: VecDeque<u64>,
    queued: RoaringTreemap,
    resolved: RoaringTreemap,
}

impl BindingQueue {
    fn new() -> Self {
        Self {
            keeper: ValueKeeper::new(),
            queue: VecDeque::new(),
            queued: RoaringTreemap::new(),
            resolved: RoaringTreemap::new(),
        }
    }
    fn feed(&mut self, value: Node) -> bool {
        let id = self.keeper.keep(value);
        if self.resolved.contains(id) || self.queued.contains(id) {
            return false;
        }
        self.queued.insert(id);
        self.queue.push_back(id);
        true
    }
    fn front(&self) -> Option<&Node> {
        self.queue.front().map(|id| self.keeper.value(*id))
    }
    // Move the front value over to the resolved set.
    fn commit_front(&mut self) -> Option<Node> {
        let id = self.queue.pop_front()?;
        self.queued.remove(id);
        self.resolved.insert(id);
        Some(self.keeper.value(id).clone())
    }
    fn len(&self) -> usize {
        self.queue.len()
    }
    fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

// ------------- BindingStream -------------
/// One resolved candidate: the value and its server-reported match count,
/// in resolution order. This sequence is the statistical sample behind
/// every aggregate estimate.
#[derive(Clone, Debug)]
pub struct ResolvedBinding {
    pub value: Node,
    pub count: u64,
}

/// Resolves a pattern by enumerating candidate values for one free
/// variable: each fed value costs one metadata round-trip to resolve its
/// match count, then a child [`DownloadStream`] fetches its matches. The
/// children are serviced strictly FIFO; an online stability test decides
/// whether the next read should grow the sample or drain a child.
pub struct BindingStream {
    core: StreamCore,
    bind_var: Arc<str>,
    bindings: BindingQueue,
    results: Vec<ResolvedBinding>,
    streams: VecDeque<DownloadStream>,
    got_all_data: bool,
    remaining: f64,
    count: f64,
    match_rate: f64,
    source: Arc<dyn PagedSource>,
    resolver: Arc<dyn MetadataResolver>,
    cfg: StreamConfig,
}

impl BindingStream {
    /// `cost` is the scheduler's prior estimate; every aggregate starts
    /// unknown (`+inf`) regardless until the stream stabilizes. `ended`
    /// must not be trusted until [`Self::update_remaining`] has run at
    /// least once, even for a stream fed zero values.
    pub fn new(
        cost: f64,
        pattern: Pattern,
        bind_var: impl AsRef<str>,
        source: Arc<dyn PagedSource>,
        resolver: Arc<dyn MetadataResolver>,
        cfg: StreamConfig,
    ) -> Self {
        let mut core = StreamCore::new(cost, pattern);
        core.cost = f64::INFINITY;
        core.cost_remaining = f64::INFINITY;
        Self {
            core,
            bind_var: Arc::from(bind_var.as_ref()),
            bindings: BindingQueue::new(),
            results: Vec::new(),
            streams: VecDeque::new(),
            got_all_data: false,
            remaining: f64::INFINITY,
            count: f64::INFINITY,
            match_rate: 1.0,
            source,
            resolver,
            cfg,
        }
    }

    pub fn bind_var(&self) -> &str {
        &self.bind_var
    }
    /// Candidate values fed but not yet resolved.
    pub fn pending_count(&self) -> usize {
        self.bindings.len()
    }
    /// Spawned children not yet drained.
    pub fn child_count(&self) -> usize {
        self.streams.len()
    }
    /// The statistical sample: every resolved candidate with its count.
    pub fn results(&self) -> &[ResolvedBinding] {
        &self.results
    }

    /// Merge newly observed candidate values into the pending queue.
    /// Values already queued or already resolved are dropped.
    pub fn feed(&mut self, values: impl IntoIterator<Item = Node>) {
        for value in values {
            self.bindings.feed(value);
        }
        debug!(
            results = self.results.len(),
            streams = self.streams.len(),
            bindings = self.bindings.len(),
            triples = self.core.triples.len(),
            "feed"
        );
    }

    /// Average results per candidate over the resolved sample, counting
    /// empty candidates as 1 so the estimate stays pessimistic about
    /// round-trips. Unknown (`+inf`) until data arrives, 0 once the stream
    /// knows there is nothing at all.
    pub fn results_per_binding(&self) -> f64 {
        self.average(&self.results)
    }

    fn average(&self, sample: &[ResolvedBinding]) -> f64 {
        if sample.is_empty() {
            return if self.got_all_data { 0.0 } else { f64::INFINITY };
        }
        let sum: f64 = sample.iter().map(|r| r.count.max(1) as f64).sum();
        sum / sample.len() as f64
    }

    /// Whether the per-binding average is statistically settled: the
    /// overall average stays within a `CONFIDENCE / sqrt(n)` margin of the
    /// first sample's average. Immediately true once all data has been
    /// observed and nothing is pending.
    pub fn is_stable(&self) -> bool {
        if self.got_all_data && self.bindings.is_empty() {
            return true;
        }
        if self.results.len() < self.cfg.min_stability_sample {
            return false;
        }
        // Margin around the first resolved sample; a candidate for a real
        // two-sample test, kept as-is for estimate continuity.
        let first_avg = self.average(&self.results[..1]);
        let margin = self.cfg.confidence / (self.results.len() as f64).sqrt() * first_avg;
        let avg = self.average(&self.results);
        (first_avg - avg).abs() < margin
    }

    /// Resolve the next pending value's match count (one metadata
    /// round-trip) and spawn its child stream. Returns false when there is
    /// nothing pending or cancellation hit first. A failed resolution
    /// leaves the value at the front of the queue, so the call can simply
    /// be retried.
    pub async fn add_binding(&mut self, cancel: &CancelToken) -> Result<bool> {
        if cancel.is_cancelled() {
            return Ok(false);
        }
        let Some(value) = self.bindings.front().cloned() else {
            return Ok(false);
        };
        let bound = self.core.pattern.bind_var(&self.bind_var, &value);
        let metadata = self.resolver.resolve(&bound).await?;
        if metadata.total_count < 0 {
            return Err(FragstreamError::Metadata(format!(
                "negative count {} for {}",
                metadata.total_count, bound
            )));
        }
        let count = metadata.total_count as u64;
        let mut stream =
            DownloadStream::open(self.source.as_ref(), bound, count, self.cfg).await?;
        stream.set_bind_value(value.clone());
        self.bindings.commit_front();
        self.streams.push_back(stream);
        debug!(binding = %value, count, sample = self.results.len() + 1, "binding resolved");
        self.results.push(ResolvedBinding { value, count });
        Ok(true)
    }

    /// Add bindings until the estimate is stable or no pending values
    /// remain; reports whether stability was reached.
    pub async fn stabilize(&mut self, cancel: &CancelToken) -> Result<bool> {
        loop {
            if self.is_stable() {
                return Ok(true);
            }
            if self.bindings.is_empty() || cancel.is_cancelled() {
                return Ok(false);
            }
            self.add_binding(cancel).await?;
        }
    }

    /// Deliver the next batch.
    ///
    /// Each read resolves at least one more candidate when it can, and
    /// keeps resolving while the estimate is unstable or no child is
    /// ready; only then is the oldest child serviced. Every resolution
    /// defers a tick so the prefetch loop cannot monopolize the scheduler.
    pub async fn read(&mut self, cancel: &CancelToken) -> Result<Batch> {
        yield_now().await;
        if self.core.ended || (self.bindings.is_empty() && self.streams.is_empty()) {
            return Ok(Batch::new());
        }
        let mut first = true;
        // bounds the prefetch loop by the queue length at entry
        let mut guard = self.bindings.len();
        loop {
            if cancel.is_cancelled() {
                self.shut_down();
                return Ok(Batch::new());
            }
            let want_binding = (first || !self.is_stable() || self.streams.is_empty())
                && !self.bindings.is_empty()
                && guard > 0;
            if want_binding {
                self.add_binding(cancel).await?;
                first = false;
                guard -= 1;
                yield_now().await;
                continue;
            }
            let Some(stream) = self.streams.front_mut() else {
                return Ok(Batch::new());
            };
            let batch = stream.read(cancel).await?;
            if stream.core.ended {
                self.streams.pop_front();
            }
            let delivered = batch.len() as f64;
            self.core.cost -= delivered;
            self.core.cost_remaining = (self.core.cost_remaining - delivered).min(self.core.cost);
            if self.remaining <= 0.0 && self.streams.is_empty() && self.bindings.is_empty() {
                self.core.ended = true;
            }
            self.core.absorb(&batch);
            return Ok(batch);
        }
    }

    // Cancellation: stop issuing requests, drop the children, end with the
    // estimates degraded to whatever they were.
    fn shut_down(&mut self) {
        debug!(pattern = %self.core.pattern, "cancelled, ending stream");
        self.streams.clear();
        self.core.ended = true;
    }

    /// True when the stream can make no progress without more fed values.
    pub fn is_hungry(&self) -> bool {
        self.streams.is_empty() && self.bindings.is_empty() && !self.core.ended
    }

    /// Inform the stream how many candidate values upstream still holds
    /// but has not fed yet, and refresh every aggregate estimate. Before
    /// stability the estimates stay unknown (`+inf`).
    pub fn update_remaining(&mut self, remaining_upstream: u64) {
        self.core.ended = self.bindings.is_empty()
            && self.streams.iter().all(|s| s.core.ended)
            && remaining_upstream == 0;
        self.got_all_data = remaining_upstream == 0;

        if !self.is_stable() {
            self.remaining = f64::INFINITY;
            self.core.cost = f64::INFINITY;
            self.core.cost_remaining = f64::INFINITY;
            self.count = f64::INFINITY;
            return;
        }

        let unresolved = (remaining_upstream + self.bindings.len() as u64) as f64;
        let per_binding = self.results_per_binding();
        let page = self.cfg.page();

        self.remaining = self.streams.iter().map(|s| s.remaining as f64).sum::<f64>()
            + unresolved * per_binding;

        let old_cost = self.core.cost;
        let cost = self
            .streams
            .iter()
            .map(|s| (s.remaining as f64 / page).ceil())
            .sum::<f64>()
            + unresolved * (per_binding / page).ceil();
        // a sudden cost increase must only add the delta, never reset the
        // already-spent budget
        let diff = if old_cost < f64::INFINITY { cost - old_cost } else { 0.0 };
        self.core.cost = cost;
        self.core.cost_remaining = (self.core.cost_remaining + diff).min(cost);

        // spawned children are already in results, so no separate term
        self.count = self.results.iter().map(|r| r.count as f64).sum::<f64>()
            + unresolved * per_binding;

        if !self.results.is_empty() {
            self.match_rate = self.results.iter().filter(|r| r.count > 0).count() as f64
                / self.results.len() as f64;
        }

        debug!(
            input = remaining_upstream,
            ended = self.core.ended,
            remaining = self.remaining,
            cost = self.core.cost,
            cost_remaining = self.core.cost_remaining,
            count = self.count,
            match_rate = self.match_rate,
            "update"
        );
    }
}

#[async_trait]
impl FragmentStream for BindingStream {
    fn pattern(&self) -> &Pattern {
        &self.core.pattern
    }
    fn cost(&self) -> f64 {
        self.core.cost
    }
    fn cost_remaining(&self) -> f64 {
        self.core.cost_remaining
    }
    fn remaining(&self) -> f64 {
        self.remaining
    }
    fn count(&self) -> f64 {
        self.count
    }
    fn match_rate(&self) -> f64 {
        self.match_rate
    }
    fn ended(&self) -> bool {
        self.core.ended
    }
    fn triples(&self) -> &[Triple] {
        &self.core.triples
    }
    fn spend(&mut self, cost: f64) {
        self.core.spend(cost);
    }
    async fn read(&mut self, cancel: &CancelToken) -> Result<Batch> {
        BindingStream::read(self, cancel).await
    }
}

//! Direct download of one pattern's matches, a page at a time.

use async_trait::async_trait;
use tokio::task::yield_now;
use tracing::debug;

use crate::config::StreamConfig;
use crate::error::{FragstreamError, Result};
use crate::interface::CancelToken;
use crate::pattern::{Node, Pattern, Triple};
use crate::source::{PagedSource, SolutionReader};
use crate::stream::{Batch, FragmentStream, StreamCore};

/// Streams every match of one pattern from its paged source, exclusively
/// owning the reader. The server-reported total is advisory: observed
/// results correct it upward, completion corrects it exactly.
pub struct DownloadStream {
    pub(crate) core: StreamCore,
    reader: Box<dyn SolutionReader>,
    // estimated results not yet fetched / estimated total
    pub(crate) remaining: u64,
    pub(crate) count: u64,
    // page under construction, carried across failed reads so a retry
    // resumes where the transfer broke
    buffer: Batch,
    // the candidate value this stream was spawned for, when any
    bind_value: Option<Node>,
    poisoned: bool,
    cfg: StreamConfig,
}

impl DownloadStream {
    /// Wrap an already-opened reader. `count` is the server-reported total
    /// for the pattern.
    pub fn new(pattern: Pattern, count: u64, reader: Box<dyn SolutionReader>, cfg: StreamConfig) -> Self {
        let cost = count as f64 / cfg.page();
        Self {
            core: StreamCore::new(cost, pattern),
            reader,
            remaining: count,
            count,
            buffer: Batch::new(),
            bind_value: None,
            poisoned: false,
            cfg,
        }
    }

    /// Open a reader for the pattern on the given source and wrap it.
    pub async fn open(
        source: &dyn PagedSource,
        pattern: Pattern,
        count: u64,
        cfg: StreamConfig,
    ) -> Result<Self> {
        let reader = source.open(&pattern).await?;
        Ok(Self::new(pattern, count, reader, cfg))
    }

    pub fn bind_value(&self) -> Option<&Node> {
        self.bind_value.as_ref()
    }
    pub(crate) fn set_bind_value(&mut self, value: Node) {
        self.bind_value = Some(value);
    }

    /// Deliver the next page of triples.
    ///
    /// Pulls from the reader until a full page is buffered or the source
    /// completes, then delivers the page exactly once. Transfer errors
    /// propagate without touching `ended`/`count`, so the read can be
    /// retried; the partial page survives in the internal buffer.
    pub async fn read(&mut self, cancel: &CancelToken) -> Result<Batch> {
        yield_now().await;
        if self.poisoned {
            return Err(FragstreamError::Protocol(format!(
                "stream for {} is poisoned",
                self.core.pattern
            )));
        }
        if self.core.ended {
            return Ok(Batch::new());
        }

        let mut source_done = false;
        while self.buffer.len() < self.cfg.page_size {
            if cancel.is_cancelled() {
                debug!(pattern = %self.core.pattern, "cancelled, ending stream");
                source_done = true;
                break;
            }
            match self.reader.pull().await? {
                Some(solution) => match self.core.pattern.ground(&solution) {
                    Ok(triple) => self.buffer.push(triple),
                    Err(e) => {
                        self.poisoned = true;
                        return Err(e);
                    }
                },
                None => {
                    source_done = true;
                    break;
                }
            }
        }

        let batch = std::mem::take(&mut self.buffer);
        self.core.absorb(&batch);
        let fetched = self.core.triples.len() as u64;
        if source_done {
            self.count = fetched;
            self.core.ended = true;
        } else if fetched > self.count {
            // wrong server estimation; assume at least one more
            self.count = fetched + 1;
        }
        self.remaining = self.count - fetched;
        // cost is re-estimated fresh after every round-trip
        self.core.cost =
            self.remaining.saturating_sub(self.cfg.page_size as u64) as f64 / self.cfg.page();
        self.core.cost_remaining = self.core.cost;
        debug!(
            pattern = %self.core.pattern,
            delivered = batch.len(),
            count = self.count,
            remaining = self.remaining,
            ended = self.core.ended,
            "page delivered"
        );
        Ok(batch)
    }
}

#[async_trait]
impl FragmentStream for DownloadStream {
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
        self.remaining as f64
    }
    fn count(&self) -> f64 {
        self.count as f64
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
        DownloadStream::read(self, cancel).await
    }
}

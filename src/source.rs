//! Collaborator contracts for the remote side of the engine.
//!
//! The engine never sees a wire protocol. It consumes two narrow traits:
//! [`PagedSource`] turns a pattern into a lazy sequence of solutions, and
//! [`MetadataResolver`] reports an estimated total match count for a pattern
//! in one round-trip. [`MemoryFragments`] implements both over an in-process
//! triple vector and doubles as the reference for the contracts.

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};

use crate::error::{FragstreamError, Result};
use crate::pattern::{Node, Pattern, Solution, Term, Triple};

/// Fragment-level metadata for one pattern. Counts are server estimates,
/// advisory rather than authoritative; negative counts are invalid and are
/// rejected by the consumer.
#[derive(Clone, Copy, Debug)]
pub struct FragmentMetadata {
    pub total_count: i64,
}

/// A lazy, finite, non-restartable sequence of solutions for one pattern.
///
/// `pull` resolves to `Ok(None)` exactly once, after the final solution;
/// callers must not pull past that point. Errors are failures of the
/// underlying transfer and never substitute for completion.
#[async_trait]
pub trait SolutionReader: Send {
    async fn pull(&mut self) -> Result<Option<Solution>>;
}

/// Resolves a pattern to a fresh [`SolutionReader`] over its matches.
#[async_trait]
pub trait PagedSource: Send + Sync {
    async fn open(&self, pattern: &Pattern) -> Result<Box<dyn SolutionReader>>;
}

/// Resolves a pattern to its fragment metadata in one round-trip.
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    async fn resolve(&self, pattern: &Pattern) -> Result<FragmentMetadata>;
}

// ------------- ReaderFrom -------------
/// Adapter lifting any stream of solutions into a [`SolutionReader`].
pub struct ReaderFrom<S> {
    inner: S,
}

impl<S> ReaderFrom<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S> SolutionReader for ReaderFrom<S>
where
    S: Stream<Item = Result<Solution>> + Unpin + Send,
{
    async fn pull(&mut self) -> Result<Option<Solution>> {
        self.inner.next().await.transpose()
    }
}

// ------------- MemoryFragments -------------
/// An in-process fragment store over a vector of triples. Solutions come
/// back in insertion order, which is what the ordering guarantees of the
/// streams are tested against.
#[derive(Clone, Debug, Default)]
pub struct MemoryFragments {
    triples: Vec<Triple>,
}

impl MemoryFragments {
    pub fn new() -> Self {
        Self { triples: Vec::new() }
    }
    pub fn with_triples(triples: Vec<Triple>) -> Self {
        Self { triples }
    }
    pub fn insert(&mut self, triple: Triple) {
        self.triples.push(triple);
    }
    pub fn len(&self) -> usize {
        self.triples.len()
    }
    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    fn solutions(&self, pattern: &Pattern) -> Vec<Solution> {
        self.triples
            .iter()
            .filter_map(|triple| match_triple(pattern, triple))
            .collect()
    }
}

// A triple matches when every bound position agrees and every variable can
// be bound consistently (a repeated variable must see the same node).
fn match_triple(pattern: &Pattern, triple: &Triple) -> Option<Solution> {
    let mut solution = Solution::new();
    for (term, node) in [
        (&pattern.s, &triple.s),
        (&pattern.p, &triple.p),
        (&pattern.o, &triple.o),
    ] {
        match term {
            Term::Node(expected) => {
                if expected != node {
                    return None;
                }
            }
            Term::Var(name) => match solution.get(name) {
                Some(bound) if bound != node => return None,
                Some(_) => (),
                None => solution.insert(name, node.clone()),
            },
        }
    }
    Some(solution)
}

#[async_trait]
impl PagedSource for MemoryFragments {
    async fn open(&self, pattern: &Pattern) -> Result<Box<dyn SolutionReader>> {
        let solutions: Vec<Result<Solution>> =
            self.solutions(pattern).into_iter().map(Ok).collect();
        Ok(Box::new(ReaderFrom::new(tokio_stream::iter(solutions))))
    }
}

#[async_trait]
impl MetadataResolver for MemoryFragments {
    async fn resolve(&self, pattern: &Pattern) -> Result<FragmentMetadata> {
        let total = self.solutions(pattern).len();
        i64::try_from(total)
            .map(|total_count| FragmentMetadata { total_count })
            .map_err(|_| FragstreamError::Metadata(format!("count overflow for {}", pattern)))
    }
}

/// Helper for fixtures and demos: a `(Node, Node, Node)` triple.
pub fn triple(s: Node, p: Node, o: Node) -> Triple {
    Triple { s, p, o }
}

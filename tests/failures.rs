use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use fragstream::binding::BindingStream;
use fragstream::config::StreamConfig;
use fragstream::download::DownloadStream;
use fragstream::error::{FragstreamError, Result};
use fragstream::interface::CancelToken;
use fragstream::parse::parse_pattern;
use fragstream::pattern::{Node, Pattern, Solution};
use fragstream::source::{
    FragmentMetadata, MemoryFragments, MetadataResolver, ReaderFrom, triple,
};
use fragstream::stream::FragmentStream;

fn sol(i: i64) -> Result<Solution> {
    let mut s = Solution::new();
    s.insert("o", Node::literal(i));
    Ok(s)
}

fn pattern() -> Pattern {
    parse_pattern("<http://example.org/s> <http://example.org/p> ?o").unwrap()
}

#[tokio::test]
async fn source_error_propagates_and_read_retries() {
    let items = vec![
        sol(0),
        sol(1),
        Err(FragstreamError::Source("connection reset".into())),
        sol(2),
    ];
    let reader = Box::new(ReaderFrom::new(tokio_stream::iter(items)));
    let mut stream = DownloadStream::new(pattern(), 3, reader, StreamConfig::default());
    let cancel = CancelToken::new();

    let err = stream.read(&cancel).await.unwrap_err();
    assert!(matches!(err, FragstreamError::Source(_)));
    assert!(!stream.ended(), "a transfer error is not completion");
    assert_eq!(stream.count(), 3.0, "estimates survive the failure untouched");
    assert_eq!(stream.triple_count(), 0, "nothing was delivered");

    // the partial page survived internally; retrying finishes the read
    let batch = stream.read(&cancel).await.unwrap();
    assert_eq!(batch.len(), 3);
    assert!(stream.ended());
}

struct FlakyResolver {
    inner: Arc<MemoryFragments>,
    failed_once: AtomicBool,
}

#[async_trait]
impl MetadataResolver for FlakyResolver {
    async fn resolve(&self, pattern: &Pattern) -> Result<FragmentMetadata> {
        if !self.failed_once.swap(true, Ordering::SeqCst) {
            return Err(FragstreamError::Metadata("metadata endpoint unavailable".into()));
        }
        self.inner.resolve(pattern).await
    }
}

#[tokio::test]
async fn failed_metadata_resolution_is_retryable() {
    let mut fragments = MemoryFragments::new();
    fragments.insert(triple(
        Node::iri("http://example.org/x/0"),
        Node::iri("http://example.org/p"),
        Node::literal(1i64),
    ));
    let fragments = Arc::new(fragments);
    let resolver = Arc::new(FlakyResolver {
        inner: fragments.clone(),
        failed_once: AtomicBool::new(false),
    });
    let pattern = parse_pattern("?x <http://example.org/p> ?o").unwrap();
    let mut stream = BindingStream::new(
        1.0,
        pattern,
        "x",
        fragments,
        resolver,
        StreamConfig::default(),
    );
    let cancel = CancelToken::new();
    stream.feed([Node::iri("http://example.org/x/0")]);

    let err = stream.add_binding(&cancel).await.unwrap_err();
    assert!(matches!(err, FragstreamError::Metadata(_)));
    assert_eq!(stream.pending_count(), 1, "the value stays queued for retry");
    assert!(stream.results().is_empty());

    assert!(stream.add_binding(&cancel).await.unwrap());
    assert_eq!(stream.pending_count(), 0);
    assert_eq!(stream.results().len(), 1);
    assert_eq!(stream.results()[0].count, 1);
}

struct NegativeResolver;

#[async_trait]
impl MetadataResolver for NegativeResolver {
    async fn resolve(&self, _pattern: &Pattern) -> Result<FragmentMetadata> {
        Ok(FragmentMetadata { total_count: -7 })
    }
}

#[tokio::test]
async fn negative_counts_are_invalid_metadata() {
    let fragments = Arc::new(MemoryFragments::new());
    let pattern = parse_pattern("?x <http://example.org/p> ?o").unwrap();
    let mut stream = BindingStream::new(
        1.0,
        pattern,
        "x",
        fragments,
        Arc::new(NegativeResolver),
        StreamConfig::default(),
    );
    let cancel = CancelToken::new();
    stream.feed([Node::iri("http://example.org/x/0")]);

    let err = stream.add_binding(&cancel).await.unwrap_err();
    assert!(matches!(err, FragstreamError::Metadata(_)));
    assert_eq!(stream.pending_count(), 1);
}

#[tokio::test]
async fn ungroundable_solution_poisons_the_stream() {
    // the source claims a match but binds nothing; the pattern cannot be
    // grounded, which is a broken read contract
    let items = vec![Ok(Solution::new())];
    let reader = Box::new(ReaderFrom::new(tokio_stream::iter(items)));
    let mut stream = DownloadStream::new(pattern(), 1, reader, StreamConfig::default());
    let cancel = CancelToken::new();

    let err = stream.read(&cancel).await.unwrap_err();
    assert!(matches!(err, FragstreamError::Protocol(_)));

    let err = stream.read(&cancel).await.unwrap_err();
    assert!(matches!(err, FragstreamError::Protocol(_)), "no recovery afterwards");
}

#[tokio::test]
async fn cancelled_download_ends_without_new_requests() {
    let mut fragments = MemoryFragments::new();
    for i in 0..10 {
        fragments.insert(triple(
            Node::iri("http://example.org/s"),
            Node::iri("http://example.org/p"),
            Node::literal(i as i64),
        ));
    }
    let pattern = pattern();
    let mut stream = DownloadStream::open(&fragments, pattern, 10, StreamConfig::default())
        .await
        .unwrap();
    let cancel = CancelToken::new();
    cancel.cancel();

    let batch = stream.read(&cancel).await.unwrap();
    assert!(batch.is_empty());
    assert!(stream.ended(), "cancellation degrades to an ended stream");
}

#[tokio::test]
async fn cancelled_binding_stream_stops_cold() {
    let fragments = Arc::new(MemoryFragments::new());
    let pattern = parse_pattern("?x <http://example.org/p> ?o").unwrap();
    let mut stream = BindingStream::new(
        1.0,
        pattern,
        "x",
        fragments.clone(),
        fragments,
        StreamConfig::default(),
    );
    let cancel = CancelToken::new();
    stream.feed((0..3).map(|i| Node::iri(format!("http://example.org/x/{i}"))));
    cancel.cancel();

    let batch = stream.read(&cancel).await.unwrap();
    assert!(batch.is_empty());
    assert!(stream.ended());
    assert_eq!(stream.child_count(), 0);
    assert!(stream.results().is_empty(), "no metadata round-trip was issued");
}

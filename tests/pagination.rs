use std::sync::Arc;

use fragstream::config::StreamConfig;
use fragstream::datatype::Literal;
use fragstream::download::DownloadStream;
use fragstream::interface::CancelToken;
use fragstream::parse::parse_pattern;
use fragstream::pattern::{Node, Pattern, Triple};
use fragstream::source::{MemoryFragments, triple};
use fragstream::stream::FragmentStream;

fn fixture(n: usize) -> (Arc<MemoryFragments>, Pattern) {
    let mut fragments = MemoryFragments::new();
    for i in 0..n {
        fragments.insert(triple(
            Node::iri("http://example.org/s"),
            Node::iri("http://example.org/p"),
            Node::literal(i as i64),
        ));
    }
    let pattern = parse_pattern("<http://example.org/s> <http://example.org/p> ?o").unwrap();
    (Arc::new(fragments), pattern)
}

#[tokio::test]
async fn pagination_exhaustion() {
    let (fragments, pattern) = fixture(250);
    let cancel = CancelToken::new();
    let mut stream = DownloadStream::open(fragments.as_ref(), pattern, 250, StreamConfig::default())
        .await
        .unwrap();

    let mut delivered: Vec<Triple> = Vec::new();
    let mut sizes = Vec::new();
    while !stream.ended() {
        let batch = stream.read(&cancel).await.unwrap();
        sizes.push(batch.len());
        delivered.extend(batch);
    }
    assert_eq!(sizes, vec![100, 100, 50], "pages fill up to the page size");
    assert_eq!(delivered.len(), 250);
    // original order, no duplicates
    for (i, t) in delivered.iter().enumerate() {
        assert_eq!(t.o.as_literal().unwrap(), &Literal::Integer(i as i64));
    }
    assert_eq!(stream.count(), 250.0);
    assert_eq!(stream.remaining(), 0.0);
    assert_eq!(stream.triple_count(), 250);

    // once ended, reads stay empty
    let batch = stream.read(&cancel).await.unwrap();
    assert!(batch.is_empty());
    assert!(stream.ended());
}

#[tokio::test]
async fn count_corrected_upward_on_overrun() {
    // the server estimate is far too low; real data must win
    let (fragments, pattern) = fixture(250);
    let cancel = CancelToken::new();
    let mut stream = DownloadStream::open(fragments.as_ref(), pattern, 10, StreamConfig::default())
        .await
        .unwrap();

    let batch = stream.read(&cancel).await.unwrap();
    assert_eq!(batch.len(), 100);
    // overrun correction keeps one more result plausible while not ended
    assert_eq!(stream.count(), 101.0);
    assert_eq!(stream.remaining(), 1.0);
    assert!(!stream.ended());

    let mut total = batch.len();
    while !stream.ended() {
        let batch = stream.read(&cancel).await.unwrap();
        total += batch.len();
        assert!(
            stream.count() >= stream.triple_count() as f64,
            "count may never undershoot the observed triples"
        );
    }
    assert_eq!(total, 250);
    assert_eq!(stream.count(), 250.0, "exact once ended");
    assert_eq!(stream.remaining(), 0.0);
}

#[tokio::test]
async fn cost_reestimated_after_each_page() {
    let (fragments, pattern) = fixture(250);
    let cancel = CancelToken::new();
    let mut stream = DownloadStream::open(fragments.as_ref(), pattern, 250, StreamConfig::default())
        .await
        .unwrap();
    // one page of 250 outstanding costs 2.5 round-trips up front
    assert_eq!(stream.cost(), 2.5);

    stream.read(&cancel).await.unwrap();
    // 150 left: everything beyond the page already in flight
    assert_eq!(stream.cost(), 0.5);
    assert_eq!(stream.cost_remaining(), 0.5);

    stream.read(&cancel).await.unwrap();
    assert_eq!(stream.cost(), 0.0);
}

#[tokio::test]
async fn spend_decrements_cost_remaining() {
    let (fragments, pattern) = fixture(250);
    let mut stream = DownloadStream::open(fragments.as_ref(), pattern, 250, StreamConfig::default())
        .await
        .unwrap();
    assert_eq!(stream.cost_remaining(), 2.5);
    stream.spend(1.0);
    assert_eq!(stream.cost_remaining(), 1.5);
    assert_eq!(stream.cost(), 2.5, "spend only touches the remaining budget");
}

#[tokio::test]
async fn empty_fragment_ends_immediately() {
    let (fragments, pattern) = fixture(0);
    let cancel = CancelToken::new();
    let mut stream = DownloadStream::open(fragments.as_ref(), pattern, 0, StreamConfig::default())
        .await
        .unwrap();
    let batch = stream.read(&cancel).await.unwrap();
    assert!(batch.is_empty());
    assert!(stream.ended());
    assert_eq!(stream.count(), 0.0);
}

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use std::sync::Arc;

use fragstream::binding::BindingStream;
use fragstream::config::StreamConfig;
use fragstream::download::DownloadStream;
use fragstream::interface::CancelToken;
use fragstream::parse::parse_pattern;
use fragstream::pattern::{Node, Pattern};
use fragstream::source::{MemoryFragments, triple};
use fragstream::stream::FragmentStream;

fn store(candidates: usize, each: usize) -> Arc<MemoryFragments> {
    let mut fragments = MemoryFragments::new();
    for c in 0..candidates {
        for i in 0..each {
            fragments.insert(triple(
                Node::iri(format!("http://example.org/x/{c}")),
                Node::iri("http://example.org/p"),
                Node::iri(format!("http://example.org/o/{i}")),
            ));
        }
    }
    Arc::new(fragments)
}

fn pattern() -> Pattern {
    parse_pattern("?x <http://example.org/p> ?o").unwrap()
}

fn feed_dedup(c: &mut Criterion) {
    // 10k fed values, half of them duplicates
    let values: Vec<Node> = (0..10_000)
        .map(|i| Node::iri(format!("http://example.org/x/{}", i % 5_000)))
        .collect();
    let fragments = Arc::new(MemoryFragments::new());
    let pattern = pattern();
    c.bench_function("feed 10k values with dedup", |b| {
        b.iter(|| {
            let mut stream = BindingStream::new(
                1.0,
                pattern.clone(),
                "x",
                fragments.clone(),
                fragments.clone(),
                StreamConfig::default(),
            );
            stream.feed(values.iter().cloned());
            black_box(stream.pending_count())
        })
    });
}

fn drain_download(c: &mut Criterion) {
    let fragments = store(1, 1_000);
    let pattern = pattern();
    let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
    c.bench_function("drain download of 1k triples", |b| {
        b.iter(|| {
            rt.block_on(async {
                let cancel = CancelToken::new();
                let mut stream = DownloadStream::open(
                    fragments.as_ref(),
                    pattern.clone(),
                    1_000,
                    StreamConfig::default(),
                )
                .await
                .unwrap();
                let mut total = 0;
                while !stream.ended() {
                    total += stream.read(&cancel).await.unwrap().len();
                }
                black_box(total)
            })
        })
    });
}

fn drain_binding(c: &mut Criterion) {
    let fragments = store(20, 50);
    let pattern = pattern();
    let values: Vec<Node> = (0..20)
        .map(|i| Node::iri(format!("http://example.org/x/{i}")))
        .collect();
    let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
    c.bench_function("drain binding stream of 20x50 triples", |b| {
        b.iter(|| {
            rt.block_on(async {
                let cancel = CancelToken::new();
                let mut stream = BindingStream::new(
                    10.0,
                    pattern.clone(),
                    "x",
                    fragments.clone(),
                    fragments.clone(),
                    StreamConfig::default(),
                );
                stream.feed(values.iter().cloned());
                let mut total = 0;
                loop {
                    stream.update_remaining(0);
                    if stream.ended() {
                        break;
                    }
                    total += stream.read(&cancel).await.unwrap().len();
                }
                black_box(total)
            })
        })
    });
}

criterion_group!(benches, feed_dedup, drain_download, drain_binding);
criterion_main!(benches);

//! Demo driver: builds a synthetic fragment store, then resolves the same
//! pattern twice — once by direct download, once binding-driven — and
//! reports the live estimates both roles expose to a scheduler.

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use fragstream::binding::BindingStream;
use fragstream::config::Settings;
use fragstream::download::DownloadStream;
use fragstream::error::Result;
use fragstream::interface::CancelToken;
use fragstream::parse::parse_pattern;
use fragstream::pattern::Node;
use fragstream::source::{MemoryFragments, MetadataResolver, triple};
use fragstream::stream::FragmentStream;

const PEOPLE: usize = 40;
const ITEMS_PER_PERSON: usize = 25;
const FEED_CHUNK: usize = 10;

// The engine is cooperative and single-threaded; a current-thread runtime
// is all it needs.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::load()?;
    let cfg = settings.stream_config();

    let mut fragments = MemoryFragments::new();
    for person in 0..PEOPLE {
        for item in 0..ITEMS_PER_PERSON {
            fragments.insert(triple(
                Node::iri(format!("http://example.org/person/{person}")),
                Node::iri("http://example.org/likes"),
                Node::iri(format!("http://example.org/item/{item}")),
            ));
        }
    }
    let fragments = Arc::new(fragments);
    let pattern = parse_pattern("?person <http://example.org/likes> ?item")?;
    let cancel = CancelToken::new();

    // Role 1: stream the whole fragment directly.
    let count = fragments.resolve(&pattern).await?.total_count.max(0) as u64;
    info!(pattern = %pattern, count, "direct download");
    let mut download =
        DownloadStream::open(fragments.as_ref(), pattern.clone(), count, cfg).await?;
    let mut pages = 0usize;
    while !download.ended() {
        let batch = download.read(&cancel).await?;
        pages += 1;
        info!(pages, delivered = batch.len(), cost = download.cost(), "page");
    }

    // Role 2: bind ?person, with candidates arriving in chunks the way an
    // upstream join partner would discover them.
    info!(pattern = %pattern, bind_var = "person", "binding-driven");
    let people: Vec<Node> = (0..PEOPLE)
        .map(|p| Node::iri(format!("http://example.org/person/{p}")))
        .collect();
    let mut binding = BindingStream::new(
        count as f64 / cfg.page_size as f64,
        pattern,
        "person",
        fragments.clone(),
        fragments.clone(),
        cfg,
    );
    let mut fed = 0usize;
    let mut reads = 0usize;
    while !binding.ended() {
        if binding.is_hungry() && fed < people.len() {
            let chunk = &people[fed..(fed + FEED_CHUNK).min(people.len())];
            binding.feed(chunk.iter().cloned());
            fed += chunk.len();
        }
        binding.update_remaining((people.len() - fed) as u64);
        if binding.ended() {
            break;
        }
        let batch = binding.read(&cancel).await?;
        reads += 1;
        info!(
            reads,
            delivered = batch.len(),
            stable = binding.is_stable(),
            per_binding = binding.results_per_binding(),
            remaining = binding.remaining(),
            "serviced"
        );
    }

    let report = serde_json::json!({
        "download": download.stats(),
        "binding": binding.stats(),
        "download_pages": pages,
        "binding_reads": reads,
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".into())
    );
    Ok(())
}

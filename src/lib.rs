//! Fragstream – an adaptive, cost-aware streaming engine for resolving
//! partially-bound triple patterns against paginated, remotely-hosted data.
//!
//! Every page fetch is a network round-trip with a real cost, so the engine
//! keeps a live cost/size estimate per stream and lets an external scheduler
//! decide which stream deserves the next round-trip. Two stream roles exist:
//! * A [`download::DownloadStream`] pulls all matches of one pattern
//!   directly, page by page, correcting the server's advisory total as real
//!   data arrives.
//! * A [`binding::BindingStream`] enumerates candidate values for one free
//!   variable, resolves a match count per value (one metadata round-trip
//!   each), fans out a child download stream per value and multiplexes the
//!   children FIFO. An online stability test over the sampled match counts
//!   decides when its aggregate estimates can be trusted — and until then,
//!   how eagerly it keeps sampling instead of yielding ready results.
//!
//! ## Modules
//! * [`pattern`] – Terms, patterns, triples and solutions.
//! * [`datatype`] – The literal values a term can carry.
//! * [`parse`] – Pattern text syntax (grammar in `pattern.pest`).
//! * [`source`] – Collaborator contracts (paged source, metadata resolver)
//!   and the in-memory reference implementation.
//! * [`stream`] – Shared accounting and the polymorphic read contract.
//! * [`download`] – The direct-download role.
//! * [`binding`] – The binding-driven role and its stability statistics.
//! * [`interface`] – Cancellation and live-estimate snapshots for drivers.
//! * [`config`] – Tuning constants and settings loading.
//!
//! ## Quick Start
//! ```
//! use std::sync::Arc;
//! use fragstream::binding::BindingStream;
//! use fragstream::config::StreamConfig;
//! use fragstream::interface::CancelToken;
//! use fragstream::parse::parse_pattern;
//! use fragstream::pattern::Node;
//! use fragstream::source::{triple, MemoryFragments};
//!
//! let mut fragments = MemoryFragments::new();
//! fragments.insert(triple(Node::iri("a"), Node::iri("p"), Node::literal(1i64)));
//! let fragments = Arc::new(fragments);
//! let pattern = parse_pattern("?s <p> ?o").unwrap();
//! let mut stream = BindingStream::new(
//!     1.0, pattern, "s", fragments.clone(), fragments, StreamConfig::default(),
//! );
//! stream.feed([Node::iri("a")]);
//! let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! let batch = rt.block_on(stream.read(&CancelToken::new())).unwrap();
//! assert_eq!(batch.len(), 1);
//! ```
//!
//! ## Concurrency model
//! Single-threaded cooperative scheduling: every asynchronous operation
//! yields at defined suspension points (awaiting a page, awaiting metadata,
//! and once per prefetch step inside `read`), so no call chain blocks the
//! scheduler or grows the stack unboundedly. Run the engine on a
//! current-thread runtime; nothing in it spawns tasks of its own.
//!
//! ## Status & Roadmap
//! The stability margin is a deliberately simple first-sample test kept for
//! estimate continuity; see `binding::BindingStream::is_stable` before
//! retuning it. Wire protocols, query planning and join ordering live with
//! the collaborators, not here.

pub mod binding;
pub mod config;
pub mod datatype;
pub mod download;
pub mod error;
pub mod interface;
pub mod parse;
pub mod pattern;
pub mod source;
pub mod stream;

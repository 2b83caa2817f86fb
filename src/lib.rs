//! # chunk-weld
//!
//! A token-bounded chunk aggregation pipeline for RAG ingestion.
//!
//! chunk-weld streams ordered text fragments from a remote chunk store,
//! resolves duplicate fragment identifiers with a frequency heuristic,
//! greedily merges adjacent fragments until a token minimum is met, and
//! attaches provenance tags — preserving document and sequence order
//! throughout.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────┐   ┌────────────┐   ┌──────┐
//! │ Postgres │──▶│ dedup │──▶│ aggregate  │──▶│ tags │──▶ keyed output
//! │  store   │   │       │   │ (token min)│   │      │
//! └──────────┘   └───────┘   └────────────┘   └──────┘
//! ```
//!
//! Two operating modes share the same aggregation core: single-document
//! (one fetch, one document) and corpus (paginated across all of a
//! tenant's documents, state carried across page boundaries).
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Raw and aggregated fragment types |
//! | [`tokens`] | Token counting (tiktoken `cl100k_base`) |
//! | [`store`] | Fragment store trait + Postgres and in-memory backends |
//! | [`dedup`] | Duplicate fragment-id resolution |
//! | [`aggregate`] | Greedy token-bounded merge state machine |
//! | [`tags`] | Source-label to subgraph-tag lookup |
//! | [`pipeline`] | Orchestration of both operating modes |
//! | [`export`] | JSON export of a run |
//! | [`error`] | Pipeline error taxonomy |

pub mod aggregate;
pub mod config;
pub mod dedup;
pub mod error;
pub mod export;
pub mod models;
pub mod pipeline;
pub mod store;
pub mod tags;
pub mod tokens;

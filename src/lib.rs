// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod aggregate;
pub mod api;
pub mod config;
pub mod feed;
pub mod insert;
pub mod metrics;
pub mod pipeline;
pub mod rank;
pub mod render;
pub mod similarity;
pub mod store;
pub mod tokenize;

// ---- Re-exports for stable public API ----
pub use crate::aggregate::{Aggregation, AggregationState, BatchArrival, Progress, Start};
pub use crate::api::router;
pub use crate::config::{ConfigSource, EffectiveConfig};
pub use crate::feed::types::{FeedQuery, FeedSource, RawEntry};
pub use crate::tokenize::{TokenSet, Tokenizer};

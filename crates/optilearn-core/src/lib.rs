//! # OptiLearn Core
//!
//! Shared, I/O-free logic for the OptiLearn recommendation engine: corpus
//! records, similarity scoring, module deduplication, course-type
//! classification, preference re-ranking, and the ranking pipeline.
//!
//! This crate performs no network or filesystem access. Embedding backends
//! and corpus storage are reached through the [`embedding::EmbeddingProvider`]
//! and [`corpus::CorpusSource`] traits, implemented by the `optilearn` app
//! crate (and by [`corpus::memory::InMemoryCorpus`] for tests).

pub mod classify;
pub mod corpus;
pub mod dedup;
pub mod embedding;
pub mod error;
pub mod models;
pub mod rank;
pub mod rerank;
pub mod similarity;

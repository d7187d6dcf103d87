//! # OptiLearn
//!
//! **Course and certificate recommendations for corporate training proposals.**
//!
//! Given a free-text description of what an organization's staff need to
//! learn, OptiLearn embeds the text, scores it against precomputed course
//! and graduate-certificate embeddings, collapses per-week course modules to
//! one entry per course, re-weights each candidate by how technical or
//! business-oriented it is relative to the requested mix, and returns the
//! top matches.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────────┐
//! │ Requirement │──▶│  Embedding   │──▶│  optilearn-core   │
//! │    text     │   │  provider    │   │ score/dedup/rank  │
//! └─────────────┘   └──────────────┘   └────────┬─────────┘
//!                                              │
//!                   ┌──────────────┐           │
//!                   │ Corpus files │───────────┤
//!                   │ courses/certs│           ▼
//!                   └──────────────┘   ┌──────────────┐
//!                                      │  CLI / HTTP  │
//!                                      └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! optilearn build-corpus ./syllabi --output data/all_course_embeddings.json
//! optilearn stats
//! optilearn recommend "cloud data pipelines for our analytics team" --tech-ratio 70
//! optilearn serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`embedding`] | OpenAI / Ollama providers with retry and deadlines |
//! | [`corpus`] | File-backed corpus source |
//! | [`recommend`] | Orchestrator and the `recommend` command |
//! | [`report`] | Recommendation report export |
//! | [`build_corpus`] | Bulk course-corpus build from syllabus JSON |
//! | [`stats`] | Corpus statistics |
//! | [`server`] | HTTP API |

pub mod build_corpus;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod recommend;
pub mod report;
pub mod server;
pub mod stats;

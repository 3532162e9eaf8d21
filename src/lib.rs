//! # Advisor Prep
//!
//! A client-partitioned retrieval-augmented generation pipeline that turns
//! a financial advisor's client documents into a structured meeting prep
//! brief.
//!
//! Documents of several formats (PDF, Word, spreadsheets, images, plain
//! text) are extracted into page-level chunks, embedded, and stored in a
//! per-client partition of a SQLite index. Brief generation retrieves the
//! top-ranked chunks for one client with a fixed topical query and asks a
//! schema-constrained generative model for agenda items with exact-quote
//! provenance.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌───────────────┐   ┌─────────────┐
//! │ Client dir │──▶│  Extractors    │──▶│ Chunk store │
//! │ pdf/docx/… │   │ page chunks   │   │ SQLite+vec  │
//! └────────────┘   └───────────────┘   └──────┬──────┘
//!                                             │ canonical query
//!                                             ▼
//!                                      ┌─────────────┐   ┌───────────┐
//!                                      │  Retriever  │──▶│Synthesizer│──▶ PrepBrief
//!                                      └─────────────┘   └───────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types and the brief schema |
//! | [`extract`] | Per-format text extraction |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Client-partitioned chunk store |
//! | [`ingest`] | Dedup-checked ingestion and directory sweep |
//! | [`retrieve`] | Canonical-query context retrieval |
//! | [`genai`] | Generative-model and image-description collaborators |
//! | [`brief`] | Schema-validated brief synthesis |
//! | [`pipeline`] | End-to-end prep flow |
//! | [`clients`] | Client directory listing |
//! | [`server`] | HTTP API |
//! | [`db`] / [`migrate`] | Database connection and schema |

pub mod brief;
pub mod clients;
pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod genai;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod retrieve;
pub mod server;
pub mod store;

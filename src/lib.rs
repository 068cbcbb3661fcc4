//! # docqa
//!
//! Ask questions about your own documents.
//!
//! Uploaded PDF, DOCX, CSV and TXT files are stored as blobs, turned into
//! sanitized text, split into overlapping chunks and kept in SQLite. A
//! question selects relevant chunks with a keyword/summary heuristic, and an
//! OpenAI-compatible LLM answers from that context, streamed back with the
//! source documents it drew on.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌──────────────┐   ┌──────────┐
//! │  Upload  │──▶│ Object store │──▶│   Pipeline   │──▶│  SQLite  │
//! │ CLI/HTTP │   │  (blobs)     │   │ extract+chunk│   │  chunks  │
//! └──────────┘   └──────────────┘   └──────────────┘   └────┬─────┘
//!                                                           │ pool
//!                  ┌──────────┐   ┌──────────┐   ┌──────────▼─────┐
//!                  │  Client  │◀──│   SSE    │◀──│ select + LLM   │
//!                  └──────────┘   │  relay   │   │                │
//!                                 └──────────┘   └────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docqa init
//! docqa ingest ./contracts
//! docqa ask "What is the penalty clause?"
//! docqa serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`app`] | Shared pool, store and LLM handles |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |
//! | [`models`] | Persisted records |
//! | [`storage`] | Blob store trait and filesystem backend |
//! | [`documents`] | Document and chunk persistence |
//! | [`ingest`] | Upload and processing pipeline |
//! | [`retrieve`] | Candidate pool and context selection |
//! | [`prompt`] | Grounded system prompt |
//! | [`llm`] | OpenAI-compatible chat client |
//! | [`relay`] | Server-sent event frames |
//! | [`chat`] | Chat turns and transcripts |
//! | [`server`] | HTTP API |

pub mod app;
pub mod chat;
pub mod config;
pub mod db;
pub mod documents;
pub mod ingest;
pub mod llm;
pub mod migrate;
pub mod models;
pub mod prompt;
pub mod relay;
pub mod retrieve;
pub mod server;
pub mod storage;

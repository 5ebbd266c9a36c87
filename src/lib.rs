//! # faqdesk
//!
//! A retrieval-grounded FAQ answering service.
//!
//! faqdesk answers free-text customer questions by retrieving relevant
//! knowledge-base passages from a vector search service and asking a
//! language model to compose an answer grounded in them, falling back to a
//! fixed contact message when the knowledge base has nothing relevant.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────────────────┐   ┌───────────────┐
//! │   HTTP   │──▶│ QueryResolutionPipeline │──▶│ Vector search │
//! │  /chat   │   │ cache → retrieve → gate │   │   (external)  │
//! └──────────┘   │ → rephrase → generate   │   └───────────────┘
//! ┌──────────┐   │                         │   ┌───────────────┐
//! │   CLI    │──▶│                         │──▶│  LLM backend  │
//! │  (ask)   │   └──────────┬──────────────┘   │   (external)  │
//! └──────────┘              ▼                  └───────────────┘
//!                    ┌───────────────┐
//!                    │ ResponseCache │
//!                    │ memory/sqlite │
//!                    └───────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Pipeline error taxonomy |
//! | [`message`] | Validation, cache-key normalization, canned replies |
//! | [`retriever`] | Knowledge retrieval capability |
//! | [`llm`] | Query rephrasing and grounded answer generation |
//! | [`cache`] | Response cache (memory and sqlite backends) |
//! | [`pipeline`] | The query-resolution pipeline |
//! | [`server`] | HTTP transport |
//! | [`db`] | SQLite connection management |

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod message;
pub mod models;
pub mod pipeline;
pub mod retriever;
pub mod server;

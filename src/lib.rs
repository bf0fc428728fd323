//! # Invento Search
//!
//! An inventory catalog served as HTML pages over an Elasticsearch index.
//!
//! Items (name, description, stock, and a few optional attributes) live as
//! JSON documents in a single index. The catalog can create items, look
//! them up by id, rename them, add stock atomically inside the index, and
//! search by exact name. Everything is reachable from the `invento` CLI and
//! from the HTTP server it starts.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌───────────────┐   ┌───────────────┐
//! │   CLI    │──▶│ Catalog  │──▶│  SearchIndex  │──▶│ Elasticsearch │
//! │ (invento)│   │          │   │  (trait)      │   │  or memory    │
//! └──────────┘   └────▲─────┘   └───────────────┘   └───────────────┘
//!                     │
//!                ┌────┴─────┐
//!                │   HTTP   │
//!                │  (axum)  │
//!                └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! invento init                 # create the index if it is missing
//! invento seed --yes           # rebuild the index with demo items
//! invento search Chair
//! invento serve                # start the HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Item document and page types |
//! | [`schema`] | Index settings and field mapping |
//! | [`index`] | Search index abstraction and backends |
//! | [`bootstrap`] | Ensure, reset-and-seed, and drop the index |
//! | [`catalog`] | Item operations |
//! | [`commands`] | CLI command runners |
//! | [`pages`] | HTML rendering |
//! | [`server`] | HTTP server |

pub mod bootstrap;
pub mod catalog;
pub mod commands;
pub mod config;
pub mod index;
pub mod models;
pub mod pages;
pub mod schema;
pub mod server;

//! # Site Harvest
//!
//! Crawls document libraries on a multi-tenant document-hosting service and
//! emits one normalized metadata record per file, for downstream
//! retrieval-augmented search.
//!
//! Each record carries the file's identity and provenance, the plain text
//! extracted from its content (PDF, Word, PowerPoint, Excel, plain text), and
//! optionally an access policy flattened from the file's permission grants.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────┐   ┌────────────┐   ┌─────────────┐
//! │ Orchestrator │──▶│  Walker   │──▶│ Extractor  │──▶│  Metadata   │
//! │ sites → libs │   │ folders → │   │ Normalizer │   │  builder    │
//! └──────┬───────┘   │ files     │   └────────────┘   └──────┬──────┘
//!        │           └─────┬─────┘                          ▼
//!        ▼                 ▼                          ┌─────────────┐
//!   SiteCatalog        DriveTree                      │ RecordSink  │
//!   (Graph REST)      (Graph REST)                    │ (JSON files)│
//!                                                     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! harvest sites                          # list discovered sites
//! harvest sync                           # crawl every discovered site
//! harvest sync --site <ID> --permissions # one site, with access policies
//! harvest groups alice@contoso.com       # transitive group memberships
//! harvest extract ./report.docx          # test extraction locally
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Error taxonomy |
//! | [`traits`] | Capability traits |
//! | [`auth`] | Bearer token providers |
//! | [`graph`] | REST client |
//! | [`extract`] | Text extraction by file format |
//! | [`permissions`] | Grant normalization |
//! | [`metadata`] | Record construction |
//! | [`walker`] | Library traversal |
//! | [`sync`] | Site and library orchestration |
//! | [`sink`] | Record sinks |
//! | [`commands`] | CLI command handlers |
//! | [`logging`] | Tracing subscriber setup |

pub mod auth;
pub mod commands;
pub mod config;
pub mod error;
pub mod extract;
pub mod graph;
pub mod logging;
pub mod metadata;
pub mod models;
pub mod permissions;
pub mod sink;
pub mod sync;
pub mod traits;
pub mod walker;

//! # Ladon
//!
//! Matches incoming text against a large, precompiled set of regular
//! expression rules and returns every match with its rule id, byte span, and
//! metadata.
//!
//! Many requests share one compiled rule database and one mutable scan
//! workspace. The workspace is handed out exclusively, so scans run one at a
//! time while everything around them (request parsing, metadata lookup,
//! response serialization) stays concurrent.
//!
//! ## Quick Start
//!
//! ```rust
//! use ladon::{CompileFlags, QueryPipeline, QueryStatus, RegexEngine};
//!
//! let rules = "\
//! 1\tfoo\tfirst rule
//! 2\tba[rz]\tsecond rule
//! ";
//!
//! let pipeline = QueryPipeline::from_source(
//!     RegexEngine::new(),
//!     rules.as_bytes(),
//!     CompileFlags::parse("iu")?,
//! )?;
//!
//! let result = pipeline.execute(b"FOO and baz");
//! assert_eq!(result.status, QueryStatus::Ok);
//! assert_eq!(result.matches.len(), 2);
//! assert_eq!(result.matches[1].metadata.payload, "second rule");
//!
//! assert_eq!(pipeline.execute(b"").status, QueryStatus::BadInput);
//! # Ok::<(), ladon::LadonError>(())
//! ```
//!
//! ## Components
//!
//! - [`RuleTable`] parses the rule file and compiles it
//! - [`Workspace`] guards the single scan scratch
//! - [`MatchCollector`] accumulates one request's matches
//! - [`QueryPipeline`] ties them into `execute(input) -> QueryResult`
//! - [`service`] is the HTTP front end

pub mod collector;
pub mod config;
pub mod engine;
pub mod error;
pub mod ir;
pub mod pipeline;
pub mod rules;
pub mod service;
pub mod workspace;

pub use collector::MatchCollector;
pub use config::{ServiceConfig, ServiceConfigBuilder};
pub use engine::{
    CompileFlags, MatchEngine, MatchSink, RegexDatabase, RegexEngine, RegexScratch,
    DEFAULT_FLAG_SPEC,
};
pub use error::{LadonError, Result};
pub use ir::{MatchEvent, MatchRecord, Rule, RuleId, RuleMetadata};
pub use pipeline::{QueryPipeline, QueryResult, QueryStatus};
pub use rules::RuleTable;
pub use service::{MatchResponse, ServiceFront};
pub use workspace::{Workspace, WorkspaceHandle};

//! Request-scoped query execution.
//!
//! A [`QueryPipeline`] is the service object: built once at startup, shared
//! by reference with every request handler, and dropped at shutdown.
//!
//! # Execution
//!
//! ```text
//! Idle ──► Acquiring ──► Scanning ──┬─► Releasing (error)   ──► Done
//!                                   ├─► Releasing (empty)   ──► Done
//!                                   └─► Releasing (matches) ──► Done
//! ```
//!
//! The workspace handle is scoped to the scanning step, so it is released on
//! every path. Compiled database and metadata are read-only and need no lock.

use crate::collector::MatchCollector;
use crate::engine::{CompileFlags, MatchEngine};
use crate::error::{LadonError, Result};
use crate::ir::{MatchRecord, RuleId, RuleMetadata};
use crate::rules::RuleTable;
use crate::workspace::Workspace;
use std::collections::HashMap;
use std::fmt;
use std::io::BufRead;
use std::path::Path;
use tracing::{error, info};

/// Outcome category of one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// At least one rule matched.
    Ok,
    /// The scan completed without matches.
    NoMatch,
    /// The query was rejected before scanning.
    BadInput,
    /// The engine reported a failure during the scan.
    ScanError,
}

impl QueryStatus {
    /// Client-facing status code.
    pub fn errno(self) -> i32 {
        match self {
            QueryStatus::Ok => 0,
            QueryStatus::NoMatch => 1,
            QueryStatus::BadInput => -1,
            QueryStatus::ScanError => -2,
        }
    }
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueryStatus::Ok => "ok",
            QueryStatus::NoMatch => "no match",
            QueryStatus::BadInput => "bad input",
            QueryStatus::ScanError => "scan error",
        };
        f.write_str(name)
    }
}

/// Result of [`QueryPipeline::execute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult {
    pub status: QueryStatus,
    pub message: String,
    /// Matches in engine report order. Empty unless `status` is `Ok`.
    pub matches: Vec<MatchRecord>,
}

impl QueryResult {
    pub fn ok(matches: Vec<MatchRecord>) -> Self {
        Self {
            status: QueryStatus::Ok,
            message: String::new(),
            matches,
        }
    }

    pub fn no_match() -> Self {
        Self {
            status: QueryStatus::NoMatch,
            message: "no match".to_string(),
            matches: Vec::new(),
        }
    }

    pub fn bad_input(message: impl Into<String>) -> Self {
        Self {
            status: QueryStatus::BadInput,
            message: message.into(),
            matches: Vec::new(),
        }
    }

    pub fn scan_error(detail: impl fmt::Display) -> Self {
        Self {
            status: QueryStatus::ScanError,
            message: format!("scan error: {detail}"),
            matches: Vec::new(),
        }
    }

    pub fn errno(&self) -> i32 {
        self.status.errno()
    }

    pub fn is_match(&self) -> bool {
        self.status == QueryStatus::Ok
    }
}

/// The shared, concurrency-safe query service.
///
/// # Examples
///
/// ```rust
/// use ladon::{CompileFlags, QueryPipeline, QueryStatus, RegexEngine};
///
/// let source = "1\tfoo\tpayload-1\n";
/// let pipeline =
///     QueryPipeline::from_source(RegexEngine::new(), source.as_bytes(), CompileFlags::empty())?;
///
/// let result = pipeline.execute(b"xx foo yy");
/// assert_eq!(result.status, QueryStatus::Ok);
/// assert_eq!((result.matches[0].from, result.matches[0].to), (3, 6));
/// assert_eq!(result.matches[0].metadata.payload, "payload-1");
/// # Ok::<(), ladon::LadonError>(())
/// ```
pub struct QueryPipeline<E: MatchEngine> {
    engine: E,
    database: E::Database,
    metadata: HashMap<RuleId, RuleMetadata>,
    workspace: Workspace<E::Scratch>,
    rule_count: usize,
}

impl<E: MatchEngine> QueryPipeline<E> {
    /// Compile `table` and allocate the scan workspace.
    ///
    /// Every failure here is fatal: no partially built pipeline is returned.
    pub fn build(engine: E, table: RuleTable) -> Result<Self> {
        let database = table.compile(&engine)?;
        let scratch = engine.alloc_scratch(&database)?;
        let rule_count = table.len();
        let (_, metadata) = table.into_parts();

        info!(rules = rule_count, ids = metadata.len(), "Query pipeline ready");

        Ok(Self {
            engine,
            database,
            metadata,
            workspace: Workspace::new(scratch),
            rule_count,
        })
    }

    /// Load rules from a line-oriented source and build the pipeline.
    pub fn from_source<R: BufRead>(engine: E, source: R, flags: CompileFlags) -> Result<Self> {
        let table = RuleTable::parse(source, flags)?;
        Self::build(engine, table)
    }

    /// Load rules from the file at `path` and build the pipeline.
    pub fn from_path(engine: E, path: impl AsRef<Path>, flags: CompileFlags) -> Result<Self> {
        let table = RuleTable::from_path(path, flags)?;
        Self::build(engine, table)
    }

    /// Scan `input` against every rule.
    ///
    /// Empty input is rejected without touching the workspace. Otherwise the
    /// call blocks until the workspace is free, scans to completion, and
    /// releases the workspace before assembling the result.
    pub fn execute(&self, input: &[u8]) -> QueryResult {
        if input.is_empty() {
            return QueryResult::bad_input("empty param q");
        }

        let mut collector = MatchCollector::new(&self.metadata, input);
        let outcome = {
            let mut handle = self.workspace.acquire();
            self.engine
                .scan(&self.database, &mut *handle, input, &mut collector)
        };

        match outcome {
            Err(e) => {
                let detail = match e {
                    LadonError::Scan(detail) => detail,
                    other => other.to_string(),
                };
                error!(
                    query = %String::from_utf8_lossy(input),
                    error = %detail,
                    "Scan failed"
                );
                QueryResult::scan_error(detail)
            }
            Ok(()) if collector.is_empty() => QueryResult::no_match(),
            Ok(()) => QueryResult::ok(collector.into_matches()),
        }
    }

    pub fn rule_count(&self) -> usize {
        self.rule_count
    }

    pub fn metadata(&self, id: RuleId) -> Option<&RuleMetadata> {
        self.metadata.get(&id)
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn database(&self) -> &E::Database {
        &self.database
    }

    pub fn workspace(&self) -> &Workspace<E::Scratch> {
        &self.workspace
    }
}

//! Rule-file loading.
//!
//! The rule source is line oriented, one rule per line:
//!
//! ```text
//! # comment
//! 1<TAB>foo<TAB>first payload
//! 2<TAB>ba[rz]<TAB>second payload
//! ```
//!
//! Comment lines and lines with fewer than three tab-separated fields are
//! skipped with a warning. A line whose id does not parse aborts the load.

use crate::engine::{CompileFlags, MatchEngine};
use crate::error::{LadonError, Result};
use crate::ir::{Rule, RuleId, RuleMetadata};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{info, warn};

/// Rules parsed from a source, in source order, plus the id -> metadata
/// lookup used when reporting matches.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<Rule>,
    metadata: HashMap<RuleId, RuleMetadata>,
}

impl RuleTable {
    /// Parse every line of `source`, applying `flags` uniformly.
    ///
    /// # Errors
    ///
    /// - [`LadonError::InvalidRuleId`] if a well-formed line has a
    ///   non-numeric id
    /// - [`LadonError::EmptyRuleSet`] if no line yields a rule
    /// - [`LadonError::Io`] if reading fails
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ladon::{CompileFlags, RuleTable};
    ///
    /// let source = "# rules\n1\tfoo\tfirst\n2\tbar\tsecond\n";
    /// let table = RuleTable::parse(source.as_bytes(), CompileFlags::empty())?;
    /// assert_eq!(table.len(), 2);
    /// assert_eq!(table.metadata(2).unwrap().payload, "second");
    /// # Ok::<(), ladon::LadonError>(())
    /// ```
    pub fn parse<R: BufRead>(source: R, flags: CompileFlags) -> Result<Self> {
        let mut table = RuleTable::default();

        for (index, line) in source.lines().enumerate() {
            let line = line?;
            let line_number = index + 1;
            let trimmed = line.trim();

            if trimmed.starts_with('#') {
                info!(line = line_number, "Skipping comment line");
                continue;
            }

            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 3 {
                warn!(
                    line = line_number,
                    fields = fields.len(),
                    content = %line,
                    "Skipping rule line with fewer than 3 fields"
                );
                continue;
            }

            let id = fields[0]
                .trim()
                .parse::<RuleId>()
                .map_err(|_| LadonError::InvalidRuleId {
                    line: line_number,
                    value: fields[0].trim().to_string(),
                })?;

            table.insert(Rule::new(id, fields[1], fields[2]).with_flags(flags));
        }

        if table.is_empty() {
            return Err(LadonError::EmptyRuleSet);
        }

        info!(rules = table.len(), ids = table.metadata.len(), "Loaded rule table");
        Ok(table)
    }

    /// Open and parse the rule file at `path`.
    pub fn from_path(path: impl AsRef<Path>, flags: CompileFlags) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::parse(BufReader::new(file), flags)
    }

    /// Build a table directly from rules, e.g. in tests. Duplicate ids
    /// follow the same last-wins rule as parsing.
    pub fn from_rules(rules: impl IntoIterator<Item = Rule>) -> Result<Self> {
        let mut table = RuleTable::default();
        for rule in rules {
            table.insert(rule);
        }
        if table.is_empty() {
            return Err(LadonError::EmptyRuleSet);
        }
        Ok(table)
    }

    fn insert(&mut self, rule: Rule) {
        if self
            .metadata
            .insert(rule.id, rule.metadata.clone())
            .is_some()
        {
            warn!(id = rule.id, "Duplicate rule id, later metadata wins");
        }
        self.rules.push(rule);
    }

    /// Compile every rule into a single database.
    pub fn compile<E: MatchEngine>(&self, engine: &E) -> Result<E::Database> {
        info!(rules = self.rules.len(), "Building rule database");
        engine.compile(&self.rules)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn metadata(&self, id: RuleId) -> Option<&RuleMetadata> {
        self.metadata.get(&id)
    }

    /// Split into the rule list and the id -> metadata lookup.
    pub fn into_parts(self) -> (Vec<Rule>, HashMap<RuleId, RuleMetadata>) {
        (self.rules, self.metadata)
    }

    /// Number of rules, counting duplicate ids separately.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Number of distinct rule ids.
    pub fn id_count(&self) -> usize {
        self.metadata.len()
    }
}

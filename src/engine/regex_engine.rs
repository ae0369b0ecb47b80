//! Regex-backed implementation of [`MatchEngine`].
//!
//! # Strategy
//!
//! Rules are split at compile time into two kinds:
//!
//! - **Literal** rules (no regex metacharacters) are folded into one
//!   AhoCorasick automaton per case mode and found in a single pass.
//! - **Regex** rules are compiled individually and also placed in a
//!   [`RegexSet`], which acts as a first-pass filter: only rules the set
//!   reports as matching are run through `find_iter`.
//!
//! Either way a rule reports its leftmost non-overlapping matches. Matches are
//! staged in the scratch, ordered by end offset and then by rule position,
//! and only then handed to the sink. A scan that fails delivers nothing.

use super::flags::CompileFlags;
use super::{MatchEngine, MatchSink};
use crate::error::{LadonError, Result};
use crate::ir::{MatchEvent, Rule, RuleId};
use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use rayon::prelude::*;
use regex::bytes::{Regex, RegexBuilder, RegexSet, RegexSetBuilder};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Default cap on the number of matches a single scan may stage.
pub const DEFAULT_MATCH_LIMIT: usize = 100_000;

/// Default compiled-size limit per regex, in bytes.
pub const DEFAULT_SIZE_LIMIT: usize = 10 * (1 << 20);

static NEXT_DATABASE_ID: AtomicU64 = AtomicU64::new(1);

/// The bundled engine backend.
///
/// # Examples
///
/// ```rust
/// use ladon::{MatchEngine, MatchEvent, RegexEngine, Rule};
///
/// let engine = RegexEngine::new();
/// let database = engine.compile(&[Rule::new(1, "foo", "payload")])?;
/// let mut scratch = engine.alloc_scratch(&database)?;
///
/// let mut events: Vec<MatchEvent> = Vec::new();
/// engine.scan(&database, &mut scratch, b"xx foo yy", &mut events)?;
/// assert_eq!(events, vec![MatchEvent::new(1, 3, 6, 0)]);
/// # Ok::<(), ladon::LadonError>(())
/// ```
#[derive(Debug, Clone)]
pub struct RegexEngine {
    match_limit: usize,
    size_limit: usize,
}

impl RegexEngine {
    pub fn new() -> Self {
        Self {
            match_limit: DEFAULT_MATCH_LIMIT,
            size_limit: DEFAULT_SIZE_LIMIT,
        }
    }

    /// Set the maximum number of matches one scan may produce. Exceeding it
    /// fails the scan.
    pub fn with_match_limit(mut self, match_limit: usize) -> Self {
        self.match_limit = match_limit;
        self
    }

    /// Set the compiled-size limit applied to every regex.
    pub fn with_size_limit(mut self, size_limit: usize) -> Self {
        self.size_limit = size_limit;
        self
    }

    pub fn match_limit(&self) -> usize {
        self.match_limit
    }

    fn compile_pattern(&self, rule: &Rule) -> Result<CompiledPattern> {
        if is_literal(&rule.pattern, rule.flags) {
            return Ok(CompiledPattern {
                rule_id: rule.id,
                flags: rule.flags,
                kind: PatternKind::Literal(rule.pattern.clone()),
            });
        }

        let source = format!("{}{}", rule.flags.inline_group(), rule.pattern);
        let regex = RegexBuilder::new(&source)
            .size_limit(self.size_limit)
            .build()
            .map_err(|e| LadonError::Compile {
                rule_id: rule.id,
                message: e.to_string(),
            })?;

        if !rule.flags.contains(CompileFlags::ALLOWEMPTY) && regex.is_match(b"") {
            return Err(LadonError::Compile {
                rule_id: rule.id,
                message: "pattern matches the empty buffer".to_string(),
            });
        }

        Ok(CompiledPattern {
            rule_id: rule.id,
            flags: rule.flags,
            kind: PatternKind::Regex { source, regex },
        })
    }
}

impl Default for RegexEngine {
    fn default() -> Self {
        Self::new()
    }
}

// A literal needs no regex machinery. Caseless literals qualify only when
// ASCII folding is exact, i.e. outside Unicode mode.
fn is_literal(pattern: &str, flags: CompileFlags) -> bool {
    if pattern.is_empty() || regex::escape(pattern) != pattern {
        return false;
    }
    !flags.contains(CompileFlags::CASELESS) || (!flags.unicode() && pattern.is_ascii())
}

#[derive(Debug)]
enum PatternKind {
    Literal(String),
    Regex { source: String, regex: Regex },
}

#[derive(Debug)]
struct CompiledPattern {
    rule_id: RuleId,
    flags: CompileFlags,
    kind: PatternKind,
}

impl CompiledPattern {
    fn single_match(&self) -> bool {
        self.flags.contains(CompileFlags::SINGLEMATCH)
    }

    fn allow_empty(&self) -> bool {
        self.flags.contains(CompileFlags::ALLOWEMPTY)
    }
}

#[derive(Debug)]
struct LiteralGroup {
    automaton: AhoCorasick,
    /// Automaton pattern index -> position in `RegexDatabase::patterns`.
    members: Vec<usize>,
}

/// Compiled, immutable rule database produced by [`RegexEngine`].
#[derive(Debug)]
pub struct RegexDatabase {
    id: u64,
    patterns: Vec<CompiledPattern>,
    set: RegexSet,
    /// Set index -> position in `patterns`.
    set_members: Vec<usize>,
    literal_groups: Vec<LiteralGroup>,
}

impl RegexDatabase {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    pub fn literal_count(&self) -> usize {
        self.literal_groups.iter().map(|g| g.members.len()).sum()
    }

    pub fn regex_count(&self) -> usize {
        self.set_members.len()
    }

    fn build_literal_group(
        patterns: &[CompiledPattern],
        caseless: bool,
    ) -> Result<Option<LiteralGroup>> {
        let mut members = Vec::new();
        let mut literals = Vec::new();
        for (index, pattern) in patterns.iter().enumerate() {
            if let PatternKind::Literal(text) = &pattern.kind {
                if pattern.flags.contains(CompileFlags::CASELESS) == caseless {
                    members.push(index);
                    literals.push(text.as_str());
                }
            }
        }

        if literals.is_empty() {
            return Ok(None);
        }

        let automaton = AhoCorasickBuilder::new()
            .match_kind(MatchKind::Standard)
            .ascii_case_insensitive(caseless)
            .build(&literals)
            .map_err(|e| LadonError::Database(e.to_string()))?;

        Ok(Some(LiteralGroup { automaton, members }))
    }
}

#[derive(Debug, Clone, Copy)]
struct StagedMatch {
    pattern: usize,
    from: usize,
    to: usize,
}

/// Scan workspace for a [`RegexDatabase`].
///
/// Holds the staging buffer and per-rule bookkeeping a scan mutates. It is
/// tied to the database it was allocated for.
#[derive(Debug)]
pub struct RegexScratch {
    database_id: u64,
    staged: Vec<StagedMatch>,
    hits: Vec<usize>,
    /// Per pattern: end of the last match reported from the literal pass.
    literal_ends: Vec<Option<usize>>,
}

impl RegexScratch {
    pub fn database_id(&self) -> u64 {
        self.database_id
    }

    fn reset(&mut self) {
        self.staged.clear();
        self.hits.clear();
        self.literal_ends.iter_mut().for_each(|end| *end = None);
    }

    fn stage(&mut self, staged: StagedMatch, limit: usize) -> Result<()> {
        if self.staged.len() >= limit {
            return Err(LadonError::Scan(format!(
                "match limit exceeded ({limit} matches)"
            )));
        }
        self.staged.push(staged);
        Ok(())
    }
}

impl MatchEngine for RegexEngine {
    type Database = RegexDatabase;
    type Scratch = RegexScratch;

    fn compile(&self, rules: &[Rule]) -> Result<RegexDatabase> {
        let patterns = rules
            .par_iter()
            .map(|rule| self.compile_pattern(rule))
            .collect::<Result<Vec<_>>>()?;

        let mut set_members = Vec::new();
        let mut set_sources = Vec::new();
        for (index, pattern) in patterns.iter().enumerate() {
            if let PatternKind::Regex { source, .. } = &pattern.kind {
                set_members.push(index);
                set_sources.push(source.as_str());
            }
        }

        let set = RegexSetBuilder::new(set_sources)
            .size_limit(self.size_limit.saturating_mul(set_members.len().max(1)))
            .build()
            .map_err(|e| LadonError::Database(e.to_string()))?;

        let mut literal_groups = Vec::new();
        for caseless in [false, true] {
            if let Some(group) = RegexDatabase::build_literal_group(&patterns, caseless)? {
                literal_groups.push(group);
            }
        }

        let database = RegexDatabase {
            id: NEXT_DATABASE_ID.fetch_add(1, Ordering::Relaxed),
            patterns,
            set,
            set_members,
            literal_groups,
        };

        debug!(
            database_id = database.id,
            literals = database.literal_count(),
            regexes = database.regex_count(),
            "Compiled rule database"
        );

        Ok(database)
    }

    fn alloc_scratch(&self, database: &RegexDatabase) -> Result<RegexScratch> {
        let count = database.pattern_count();
        let mut hits = Vec::new();
        hits.try_reserve_exact(database.regex_count())
            .map_err(|e| LadonError::ScratchAlloc(e.to_string()))?;
        let mut literal_ends = Vec::new();
        literal_ends
            .try_reserve_exact(count)
            .map_err(|e| LadonError::ScratchAlloc(e.to_string()))?;
        literal_ends.resize(count, None);

        Ok(RegexScratch {
            database_id: database.id,
            staged: Vec::new(),
            hits,
            literal_ends,
        })
    }

    fn scan(
        &self,
        database: &RegexDatabase,
        scratch: &mut RegexScratch,
        input: &[u8],
        sink: &mut dyn MatchSink,
    ) -> Result<()> {
        if scratch.database_id != database.id {
            return Err(LadonError::Scan(format!(
                "scratch mismatch: allocated for database {}, used with database {}",
                scratch.database_id, database.id
            )));
        }
        scratch.reset();

        scratch.hits.extend(
            database
                .set
                .matches(input)
                .iter()
                .map(|set_index| database.set_members[set_index]),
        );

        for i in 0..scratch.hits.len() {
            let index = scratch.hits[i];
            let pattern = &database.patterns[index];
            let PatternKind::Regex { regex, .. } = &pattern.kind else {
                continue;
            };
            for found in regex.find_iter(input) {
                if found.start() == found.end() && !pattern.allow_empty() {
                    continue;
                }
                scratch.stage(
                    StagedMatch {
                        pattern: index,
                        from: found.start(),
                        to: found.end(),
                    },
                    self.match_limit,
                )?;
                if pattern.single_match() {
                    break;
                }
            }
        }

        for group in &database.literal_groups {
            for found in group.automaton.find_overlapping_iter(input) {
                let index = group.members[found.pattern().as_usize()];
                let pattern = &database.patterns[index];
                match scratch.literal_ends[index] {
                    Some(_) if pattern.single_match() => continue,
                    Some(end) if found.start() < end => continue,
                    _ => {}
                }
                scratch.literal_ends[index] = Some(found.end());
                scratch.stage(
                    StagedMatch {
                        pattern: index,
                        from: found.start(),
                        to: found.end(),
                    },
                    self.match_limit,
                )?;
            }
        }

        scratch
            .staged
            .sort_unstable_by_key(|m| (m.to, m.pattern, m.from));

        for staged in &scratch.staged {
            let rule_id = database.patterns[staged.pattern].rule_id;
            sink.record(MatchEvent::new(rule_id, staged.from, staged.to, 0));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(spec: &str) -> CompileFlags {
        CompileFlags::parse(spec).unwrap()
    }

    fn scan_all(engine: &RegexEngine, rules: &[Rule], input: &[u8]) -> Vec<MatchEvent> {
        let database = engine.compile(rules).unwrap();
        let mut scratch = engine.alloc_scratch(&database).unwrap();
        let mut events = Vec::new();
        engine
            .scan(&database, &mut scratch, input, &mut events)
            .unwrap();
        events
    }

    #[test]
    fn test_literal_classification() {
        assert!(is_literal("foo", CompileFlags::empty()));
        assert!(is_literal("foo bar", flags("i")));
        assert!(!is_literal("foo", flags("iu")));
        assert!(!is_literal("fo+", CompileFlags::empty()));
        assert!(!is_literal("", CompileFlags::empty()));
        assert!(!is_literal("a.b", CompileFlags::empty()));
    }

    #[test]
    fn test_database_partitions_rules() {
        let engine = RegexEngine::new();
        let rules = vec![
            Rule::new(1, "foo", ""),
            Rule::new(2, "ba[rz]", ""),
            Rule::new(3, "QUX", "").with_flags(flags("i")),
        ];
        let database = engine.compile(&rules).unwrap();

        assert_eq!(database.pattern_count(), 3);
        assert_eq!(database.literal_count(), 2);
        assert_eq!(database.regex_count(), 1);
    }

    #[test]
    fn test_matches_ordered_by_end_offset() {
        let engine = RegexEngine::new();
        let rules = vec![
            Rule::new(10, "world", ""),
            Rule::new(20, "hel+o", ""),
            Rule::new(30, "o w", ""),
        ];

        let events = scan_all(&engine, &rules, b"hello world");
        assert_eq!(
            events,
            vec![
                MatchEvent::new(20, 0, 5, 0),
                MatchEvent::new(30, 4, 7, 0),
                MatchEvent::new(10, 6, 11, 0),
            ]
        );
    }

    #[test]
    fn test_literal_matches_do_not_overlap() {
        let engine = RegexEngine::new();
        let events = scan_all(&engine, &[Rule::new(1, "aa", "")], b"aaaaa");
        assert_eq!(
            events,
            vec![MatchEvent::new(1, 0, 2, 0), MatchEvent::new(1, 2, 4, 0)]
        );
    }

    #[test]
    fn test_caseless_flag() {
        let engine = RegexEngine::new();
        let rules = vec![
            Rule::new(1, "foo", "").with_flags(flags("iu")),
            Rule::new(2, "bar", "").with_flags(flags("i")),
        ];

        let events = scan_all(&engine, &rules, b"FOO Bar");
        assert_eq!(
            events,
            vec![MatchEvent::new(1, 0, 3, 0), MatchEvent::new(2, 4, 7, 0)]
        );
    }

    #[test]
    fn test_single_match_flag() {
        let engine = RegexEngine::new();
        let rules = vec![
            Rule::new(1, "ab", "").with_flags(flags("H")),
            Rule::new(2, "c+", "").with_flags(flags("H")),
        ];

        let events = scan_all(&engine, &rules, b"ab ab cc c");
        assert_eq!(
            events,
            vec![MatchEvent::new(1, 0, 2, 0), MatchEvent::new(2, 6, 8, 0)]
        );
    }

    #[test]
    fn test_empty_matching_pattern_rejected() {
        let engine = RegexEngine::new();
        let result = engine.compile(&[Rule::new(5, "a*", "")]);

        match result {
            Err(LadonError::Compile { rule_id, message }) => {
                assert_eq!(rule_id, 5);
                assert!(message.contains("empty"));
            }
            other => panic!("Expected Compile error, got {other:?}"),
        }
    }

    #[test]
    fn test_allow_empty_flag_accepts_pattern() {
        let engine = RegexEngine::new();
        let events = scan_all(&engine, &[Rule::new(5, "a*", "").with_flags(flags("V"))], b"baa");
        assert!(events.contains(&MatchEvent::new(5, 1, 3, 0)));
    }

    #[test]
    fn test_invalid_pattern_names_rule() {
        let engine = RegexEngine::new();
        let rules = vec![Rule::new(1, "ok", ""), Rule::new(42, "(unclosed", "")];

        match engine.compile(&rules) {
            Err(LadonError::Compile { rule_id, .. }) => assert_eq!(rule_id, 42),
            other => panic!("Expected Compile error, got {other:?}"),
        }
    }

    #[test]
    fn test_match_limit_fails_scan() {
        let engine = RegexEngine::new().with_match_limit(2);
        let database = engine.compile(&[Rule::new(1, "a", "")]).unwrap();
        let mut scratch = engine.alloc_scratch(&database).unwrap();
        let mut events = Vec::new();

        let result = engine.scan(&database, &mut scratch, b"aaaa", &mut events);
        assert!(matches!(result, Err(LadonError::Scan(_))));
        assert!(events.is_empty());
    }

    #[test]
    fn test_scratch_mismatch_fails_scan() {
        let engine = RegexEngine::new();
        let first = engine.compile(&[Rule::new(1, "a", "")]).unwrap();
        let second = engine.compile(&[Rule::new(1, "a", "")]).unwrap();
        let mut scratch = engine.alloc_scratch(&first).unwrap();
        let mut events = Vec::new();

        let result = engine.scan(&second, &mut scratch, b"a", &mut events);
        match result {
            Err(LadonError::Scan(message)) => assert!(message.contains("scratch mismatch")),
            other => panic!("Expected Scan error, got {other:?}"),
        }
    }

    #[test]
    fn test_scratch_reuse_is_clean() {
        let engine = RegexEngine::new();
        let database = engine.compile(&[Rule::new(1, "x", "")]).unwrap();
        let mut scratch = engine.alloc_scratch(&database).unwrap();

        let mut first = Vec::new();
        engine
            .scan(&database, &mut scratch, b"x x", &mut first)
            .unwrap();
        let mut second = Vec::new();
        engine
            .scan(&database, &mut scratch, b"x x", &mut second)
            .unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
    }

    #[test]
    fn test_duplicate_ids_both_report() {
        let engine = RegexEngine::new();
        let rules = vec![Rule::new(7, "foo", ""), Rule::new(7, "ba+r", "")];

        let events = scan_all(&engine, &rules, b"foo baar");
        assert_eq!(
            events,
            vec![MatchEvent::new(7, 0, 3, 0), MatchEvent::new(7, 4, 8, 0)]
        );
    }
}

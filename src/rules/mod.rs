//! Text-substitution rules applied to OCR output.
//!
//! A rule file holds one rule per line:
//!
//! ```text
//! // scope    type   match        replacement
//! line        word   "ﬁ"          "fi"
//! line        regex  `-\s*$`      ""
//! document    regex  `(\w)-\n(\w)` "$1$2"
//! ```
//!
//! `line` rules run on every output line (after trailing whitespace is
//! trimmed), `document` rules run once over the assembled text. `word` rules
//! replace every literal occurrence of the match; `regex` rules replace every
//! match of a regular expression, and the replacement may reference capture
//! groups as `$1` or `${name}`.
//!
//! Rules apply in the order they were declared, across files in the order the
//! files were given. Each rule sees the previous rule's output; as soon as a
//! rule produces empty text the rest of the list is skipped.

mod lexer;
mod parser;

use crate::error::OcrError;
use regex::bytes::{NoExpand, Regex};
use std::borrow::Cow;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

pub use parser::parse_rules;

/// A single `bytes → bytes` text transformation.
pub trait Transform: Send + Sync {
    fn apply<'a>(&self, input: &'a [u8]) -> Cow<'a, [u8]>;
}

/// Where a rule applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleScope {
    /// Every output line.
    Line,
    /// The whole assembled document.
    Document,
}

/// How a rule's match string is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    /// Literal substring.
    Word,
    /// Regular expression; the replacement may reference capture groups.
    Regex,
}

/// A compiled substitution rule.
#[derive(Debug, Clone)]
pub struct Rule {
    scope: RuleScope,
    kind: RuleKind,
    matcher: Regex,
    replacement: Vec<u8>,
}

impl Rule {
    /// Compile a rule. Fails on an empty match or an invalid pattern;
    /// the error string is suitable for a labelled rule error.
    pub fn new(
        scope: RuleScope,
        kind: RuleKind,
        pattern: &[u8],
        replacement: &[u8],
    ) -> Result<Self, String> {
        if pattern.is_empty() {
            return Err("Match string cannot be empty".into());
        }

        let matcher = match kind {
            RuleKind::Word => Regex::new(&literal_pattern(pattern)),
            RuleKind::Regex => {
                let source = std::str::from_utf8(pattern)
                    .map_err(|_| "Regular expression is not valid UTF-8".to_string())?;
                Regex::new(source)
            }
        }
        .map_err(|e| e.to_string())?;

        Ok(Self {
            scope,
            kind,
            matcher,
            replacement: replacement.to_vec(),
        })
    }

    pub fn scope(&self) -> RuleScope {
        self.scope
    }

    pub fn kind(&self) -> RuleKind {
        self.kind
    }
}

impl Transform for Rule {
    fn apply<'a>(&self, input: &'a [u8]) -> Cow<'a, [u8]> {
        match self.kind {
            RuleKind::Word => self
                .matcher
                .replace_all(input, NoExpand(self.replacement.as_slice())),
            RuleKind::Regex => self.matcher.replace_all(input, self.replacement.as_slice()),
        }
    }
}

/// Byte-exact pattern for a literal match. Unicode mode is off so that
/// arbitrary (even non-UTF-8) bytes can be matched one for one.
fn literal_pattern(literal: &[u8]) -> String {
    let mut pattern = String::from("(?-u)");
    for &b in literal {
        if b.is_ascii() {
            pattern.push_str(&regex::escape(&char::from(b).to_string()));
        } else {
            pattern.push_str(&format!(r"\x{b:02X}"));
        }
    }
    pattern
}

/// An ordered list of transforms applied in sequence.
///
/// An empty filter is the identity.
#[derive(Clone, Default)]
pub struct Filter {
    steps: Vec<Arc<dyn Transform>>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transform to the end of the list.
    pub fn push(&mut self, step: impl Transform + 'static) {
        self.steps.push(Arc::new(step));
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step over `input` in order, stopping early once the text
    /// becomes empty.
    pub fn apply(&self, input: &[u8]) -> Vec<u8> {
        let mut current = input.to_vec();
        for step in &self.steps {
            if current.is_empty() {
                break;
            }
            let replaced = match step.apply(&current) {
                Cow::Owned(v) => Some(v),
                Cow::Borrowed(_) => None,
            };
            if let Some(v) = replaced {
                current = v;
            }
        }
        current
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter").field("steps", &self.steps.len()).finish()
    }
}

/// The per-line and per-document filters compiled from rule sources.
#[derive(Debug, Clone, Default)]
pub struct Filters {
    pub line: Filter,
    pub document: Filter,
}

impl Filters {
    /// Filters with no rules; both apply as the identity.
    pub fn identity() -> Self {
        Self::default()
    }

    /// Compile a single rule source. `label` names the source in errors.
    pub fn parse(text: &str, label: &str) -> Result<Self, OcrError> {
        Self::from_sources([(label, text)])
    }

    /// Compile several `(label, text)` sources, concatenating their rules in
    /// the order given. Stops at the first error.
    pub fn from_sources<I, L, T>(sources: I) -> Result<Self, OcrError>
    where
        I: IntoIterator<Item = (L, T)>,
        L: AsRef<str>,
        T: AsRef<str>,
    {
        let mut filters = Self::default();
        for (label, text) in sources {
            for rule in parse_rules(text.as_ref(), label.as_ref())? {
                filters.add(rule);
            }
        }
        debug!(
            "Compiled {} line rules, {} document rules",
            filters.line.len(),
            filters.document.len()
        );
        Ok(filters)
    }

    /// Read and compile rule files in order; each file's path is its label.
    pub async fn from_files(paths: &[PathBuf]) -> Result<Self, OcrError> {
        let mut sources = Vec::with_capacity(paths.len());
        for path in paths {
            let text = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| OcrError::RuleFileRead {
                    path: path.clone(),
                    source: e,
                })?;
            sources.push((path.display().to_string(), text));
        }
        Self::from_sources(sources)
    }

    /// Add a compiled rule to the filter matching its scope.
    pub fn add(&mut self, rule: Rule) {
        match rule.scope() {
            RuleScope::Line => self.line.push(rule),
            RuleScope::Document => self.document.push(rule),
        }
    }

    pub fn apply_line(&self, line: &[u8]) -> Vec<u8> {
        self.line.apply(line)
    }

    pub fn apply_document(&self, text: &[u8]) -> Vec<u8> {
        self.document.apply(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting(Arc<AtomicUsize>);

    impl Transform for Counting {
        fn apply<'a>(&self, input: &'a [u8]) -> Cow<'a, [u8]> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Cow::Borrowed(input)
        }
    }

    #[test]
    fn word_and_regex_rules() {
        let filters = Filters::parse(
            "line word \"foo\" \"bar\"\ndocument regex \"[0-9]+\" \"#\"\n",
            "inline",
        )
        .unwrap();
        assert_eq!(filters.apply_line(b"foofoo"), b"barbar");
        assert_eq!(filters.apply_document(b"room 101"), b"room #");
        // scopes stay separate
        assert_eq!(filters.apply_line(b"room 101"), b"room 101");
        assert_eq!(filters.apply_document(b"foofoo"), b"foofoo");
    }

    #[test]
    fn empty_rule_set_is_identity() {
        let filters = Filters::identity();
        for input in [&b""[..], b"abc", b"  spaced  ", b"\xff\xfe"] {
            assert_eq!(filters.apply_line(input), input);
            assert_eq!(filters.apply_document(input), input);
        }
    }

    #[test]
    fn rules_apply_in_declared_order() {
        let filters = Filters::parse("line word \"a\" \"b\"\nline word \"b\" \"c\"\n", "t").unwrap();
        assert_eq!(filters.apply_line(b"ab"), b"cc");

        let reversed = Filters::parse("line word \"b\" \"c\"\nline word \"a\" \"b\"\n", "t").unwrap();
        assert_eq!(reversed.apply_line(b"ab"), b"bc");
    }

    #[test]
    fn empty_result_short_circuits() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut filters = Filters::parse("line regex \"^.*$\" \"\"\n", "t").unwrap();
        filters.line.push(Counting(Arc::clone(&calls)));

        assert_eq!(filters.apply_line(b"anything"), b"");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn empty_input_runs_no_rules() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut filter = Filter::new();
        filter.push(Counting(Arc::clone(&calls)));
        assert_eq!(filter.apply(b""), b"");
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        filter.apply(b"x");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn regex_replacement_expands_groups() {
        let filters = Filters::parse(
            "document regex `(\\w+)-\\n(\\w+)` \"$1$2\"\nline regex `(?P<w>\\d+)` \"<${w}>\"\n",
            "t",
        )
        .unwrap();
        assert_eq!(filters.apply_document(b"hyph-\nenated"), b"hyphenated");
        assert_eq!(filters.apply_line(b"p 12"), b"p <12>");
    }

    #[test]
    fn word_rule_is_literal() {
        let filters = Filters::parse("line word \"a.c\" \"$1\"\n", "t").unwrap();
        assert_eq!(filters.apply_line(b"abc a.c"), b"abc $1");
    }

    #[test]
    fn word_rule_matches_non_ascii_bytes() {
        let filters = Filters::parse("line word \"ﬁ\" \"fi\"\nline word \"\\xff\" \"?\"\n", "t").unwrap();
        assert_eq!(filters.apply_line("ﬁle".as_bytes()), b"file");
        assert_eq!(filters.apply_line(b"a\xffb"), b"a?b");
    }

    #[test]
    fn sources_concatenate_in_order() {
        let filters = Filters::from_sources([
            ("first", "line word \"x\" \"y\"\n"),
            ("second", "line word \"y\" \"z\"\n"),
        ])
        .unwrap();
        assert_eq!(filters.line.len(), 2);
        assert_eq!(filters.apply_line(b"x"), b"z");
    }

    #[test]
    fn error_in_later_source_names_that_source() {
        let err = Filters::from_sources([
            ("good.rules", "line word \"x\" \"y\"\n"),
            ("bad.rules", "\n\nline word \"\" \"y\"\n"),
        ])
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "rule definition in \"bad.rules\", line 3: Match string cannot be empty"
        );
    }

    #[tokio::test]
    async fn from_files_reads_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.rules");
        let b = dir.path().join("b.rules");
        std::fs::write(&a, "line word \"1\" \"2\"\n").unwrap();
        std::fs::write(&b, "line word \"2\" \"3\"\n").unwrap();

        let filters = Filters::from_files(&[a, b]).await.unwrap();
        assert_eq!(filters.apply_line(b"1"), b"3");
    }

    #[tokio::test]
    async fn from_files_missing_file() {
        let err = Filters::from_files(&[PathBuf::from("/definitely/not/here.rules")])
            .await
            .unwrap_err();
        assert!(matches!(err, OcrError::RuleFileRead { .. }));
    }
}

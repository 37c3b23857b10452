//! Parser turning rule text into compiled [`Rule`]s.

use super::lexer::{LexError, Lexer, Token};
use super::{Rule, RuleKind, RuleScope};
use crate::error::OcrError;

/// Parse every rule in `text`, in declaration order.
///
/// Errors carry `label` and the 1-based line of the offending token; parsing
/// stops at the first one.
pub fn parse_rules(text: &str, label: &str) -> Result<Vec<Rule>, OcrError> {
    Parser {
        lexer: Lexer::new(text),
        label,
    }
    .rules()
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    label: &'a str,
}

impl Parser<'_> {
    fn rules(&mut self) -> Result<Vec<Rule>, OcrError> {
        let mut rules = Vec::new();
        let (mut token, mut line) = self.skip_newlines()?;

        while token != Token::Eof {
            rules.push(self.rule(token, line)?);

            let (next, next_line) = self.next()?;
            (token, line) = match next {
                Token::Eof => (Token::Eof, next_line),
                Token::Newline => self.skip_newlines()?,
                other => return Err(self.unexpected("newline", &other, next_line)),
            };
        }

        Ok(rules)
    }

    /// Parse `SCOPE TYPE MATCH REPLACEMENT` starting at `first`.
    fn rule(&mut self, first: Token, line: usize) -> Result<Rule, OcrError> {
        let scope = match first {
            Token::Ident(name) => match name.as_str() {
                "line" => RuleScope::Line,
                "document" | "text" => RuleScope::Document,
                _ => return Err(self.parse_error(line, format!("Unknown rule scope: {name}"))),
            },
            other => return Err(self.unexpected("rule scope", &other, line)),
        };

        let kind = match self.next()? {
            (Token::Ident(name), line) => match name.as_str() {
                "word" => RuleKind::Word,
                "regex" => RuleKind::Regex,
                _ => return Err(self.parse_error(line, format!("Unknown rule type: {name}"))),
            },
            (other, line) => return Err(self.unexpected("rule type", &other, line)),
        };

        let (pattern, pattern_line) = match self.next()? {
            (Token::Str(s), line) => (s, line),
            (other, line) => return Err(self.unexpected("match string", &other, line)),
        };

        let replacement = match self.next()? {
            (Token::Str(s), _) => s,
            (other, line) => return Err(self.unexpected("substitution string", &other, line)),
        };

        Rule::new(scope, kind, &pattern, &replacement).map_err(|message| OcrError::RuleCompile {
            label: self.label.to_string(),
            line: pattern_line,
            message,
        })
    }

    fn next(&mut self) -> Result<(Token, usize), OcrError> {
        self.lexer.next_token().map_err(|LexError { line, message }| self.parse_error(line, message))
    }

    fn skip_newlines(&mut self) -> Result<(Token, usize), OcrError> {
        loop {
            let (token, line) = self.next()?;
            if token != Token::Newline {
                return Ok((token, line));
            }
        }
    }

    fn unexpected(&self, expected: &str, found: &Token, line: usize) -> OcrError {
        self.parse_error(line, format!("Expected {expected}, but found {found}"))
    }

    fn parse_error(&self, line: usize, message: String) -> OcrError {
        OcrError::RuleParse {
            label: self.label.to_string(),
            line,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_err(text: &str) -> (usize, String) {
        match parse_rules(text, "test.rules") {
            Err(OcrError::RuleParse { line, message, .. })
            | Err(OcrError::RuleCompile { line, message, .. }) => (line, message),
            Err(other) => panic!("unexpected error kind: {other}"),
            Ok(rules) => panic!("expected an error, parsed {} rules", rules.len()),
        }
    }

    #[test]
    fn parses_rules_with_blank_lines_and_comments() {
        let text = "\n// header comment\nline word \"a\" \"b\" // trailing\n\n/* block\n */ document regex `x+` \"y\"";
        let rules = parse_rules(text, "t").unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].scope(), RuleScope::Line);
        assert_eq!(rules[0].kind(), RuleKind::Word);
        assert_eq!(rules[1].scope(), RuleScope::Document);
        assert_eq!(rules[1].kind(), RuleKind::Regex);
    }

    #[test]
    fn empty_text_has_no_rules() {
        assert!(parse_rules("", "t").unwrap().is_empty());
        assert!(parse_rules("\n\n  \n// only a comment\n", "t").unwrap().is_empty());
    }

    #[test]
    fn text_is_an_alias_for_document() {
        let rules = parse_rules("text word \"a\" \"b\"", "t").unwrap();
        assert_eq!(rules[0].scope(), RuleScope::Document);
    }

    #[test]
    fn unknown_scope() {
        assert_eq!(
            parse_err("\npage word \"a\" \"b\"\n"),
            (2, "Unknown rule scope: page".into())
        );
    }

    #[test]
    fn unknown_type() {
        assert_eq!(
            parse_err("line glob \"a\" \"b\"\n"),
            (1, "Unknown rule type: glob".into())
        );
    }

    #[test]
    fn missing_replacement() {
        let (line, message) = parse_err("line word \"a\"\n");
        assert_eq!(line, 1);
        assert_eq!(message, "Expected substitution string, but found newline");
    }

    #[test]
    fn unquoted_match() {
        let (_, message) = parse_err("line word a \"b\"\n");
        assert_eq!(message, "Expected match string, but found \"a\"");
    }

    #[test]
    fn trailing_garbage() {
        let (line, message) = parse_err("line word \"a\" \"b\" extra\n");
        assert_eq!(line, 1);
        assert_eq!(message, "Expected newline, but found \"extra\"");
    }

    #[test]
    fn empty_match_is_rejected() {
        assert_eq!(
            parse_err("line word \"x\" \"y\"\nline regex \"\" \"y\"\n"),
            (2, "Match string cannot be empty".into())
        );
    }

    #[test]
    fn invalid_regex_is_rejected() {
        let (line, message) = parse_err("\n\n\nline regex \"(unclosed\" \"\"\n");
        assert_eq!(line, 4);
        assert!(message.contains("unclosed"), "got: {message}");
    }

    #[test]
    fn malformed_quoting() {
        let (line, message) = parse_err("line word \"a\" \"b\nline word \"c\" \"d\"\n");
        assert_eq!(line, 1);
        assert_eq!(message, "literal not terminated");
    }

    #[test]
    fn errors_carry_label() {
        let err = parse_rules("bogus", "my.rules").unwrap_err();
        assert!(err.to_string().starts_with("rule definition in \"my.rules\", line 1:"));
    }
}

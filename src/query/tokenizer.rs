// SPDX-License-Identifier: MIT

//! Query path scanner
//!
//! Turns a path such as `$[*].Spec.Properties.array[?(@.id=='1')].id` into a
//! flat token stream in a single left-to-right pass. Malformed input is
//! reported as a [`PathError`] carrying the character position.

use super::token::{ComparisonOp, LogicalOp, Token};
use crate::error::PathError;

/// Tokenize a query path
pub fn tokenize(path: &str) -> Result<Vec<Token>, PathError> {
    let path = path.trim();
    if path.is_empty() {
        return Err(PathError::EmptyExpression);
    }
    let mut scanner = Scanner::new(path);
    scanner.scan()?;
    Ok(scanner.tokens)
}

struct Scanner<'a> {
    expression: &'a str,
    chars: Vec<char>,
    pos: usize,
    tokens: Vec<Token>,
}

fn is_member_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

fn is_quote(c: char) -> bool {
    c == '\'' || c == '"'
}

impl<'a> Scanner<'a> {
    fn new(expression: &'a str) -> Self {
        Self {
            expression,
            chars: expression.chars().collect(),
            pos: 0,
            tokens: Vec::new(),
        }
    }

    fn current(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn eof(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn skip_whitespace(&mut self) {
        while self.current().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn unexpected(&self) -> PathError {
        match self.current() {
            Some(found) => PathError::UnexpectedChar {
                expression: self.expression.to_string(),
                position: self.pos,
                found,
            },
            None => PathError::UnexpectedEnd {
                expression: self.expression.to_string(),
                position: self.pos,
            },
        }
    }

    fn unknown_operator(&self, operator: &str) -> PathError {
        PathError::UnknownOperator {
            expression: self.expression.to_string(),
            position: self.pos,
            operator: operator.to_string(),
        }
    }

    fn unclosed_bracket(&self, position: usize) -> PathError {
        PathError::UnclosedBracket {
            expression: self.expression.to_string(),
            position,
        }
    }

    fn scan(&mut self) -> Result<(), PathError> {
        self.scan_start()?;
        while !self.eof() {
            if !self.scan_segment()? {
                return Err(self.unexpected());
            }
        }
        Ok(())
    }

    /// Leading `$`, `@` or `.` all refer to the root. A bare name or quoted
    /// name is an implicit member of the root.
    fn scan_start(&mut self) -> Result<(), PathError> {
        match self.current() {
            Some('$') if !self.peek(1).is_some_and(is_member_char) => {
                self.tokens.push(Token::RootRef);
                self.pos += 1;
            }
            Some('@') => {
                self.tokens.push(Token::RootRef);
                self.pos += 1;
            }
            Some('.') => {
                self.tokens.push(Token::RootRef);
                if self.peek(1).is_none() {
                    self.pos += 1;
                }
            }
            Some(c) if c == '$' || is_member_char(c) || is_quote(c) => {
                let name = self.capture_member_name()?;
                self.tokens.push(Token::dot(name));
            }
            _ => {}
        }
        Ok(())
    }

    /// Scan one selector segment. Returns false when the current character
    /// does not start a segment.
    fn scan_segment(&mut self) -> Result<bool, PathError> {
        match self.current() {
            Some('.') => {
                match self.peek(1) {
                    Some('.') => {
                        self.pos += 2;
                        let name = if self.current() == Some('*') {
                            self.pos += 1;
                            "*".to_string()
                        } else {
                            self.capture_member_name()?
                        };
                        self.tokens.push(Token::DescendantSelector {
                            name,
                            case_sensitive: false,
                        });
                    }
                    Some('*') => {
                        self.pos += 2;
                        self.tokens.push(Token::DotWildSelector);
                    }
                    // `a.[*]` is the same as `a[*]`
                    Some('[') => self.pos += 1,
                    None if self.tokens == [Token::RootRef] => self.pos += 1,
                    _ => {
                        self.pos += 1;
                        let name = self.capture_member_name()?;
                        self.tokens.push(Token::dot(name));
                    }
                }
                Ok(true)
            }
            Some('+') => {
                self.pos += 1;
                let name = self.capture_member_name()?;
                self.tokens.push(Token::DotSelector {
                    name,
                    case_sensitive: true,
                });
                Ok(true)
            }
            Some('[') => {
                self.scan_bracket()?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn capture_member_name(&mut self) -> Result<String, PathError> {
        match self.current() {
            Some(c) if is_quote(c) => self.capture_quoted(),
            _ => self.capture_plain_name(),
        }
    }

    fn capture_quoted(&mut self) -> Result<String, PathError> {
        let start = self.pos;
        let quote = self.current().ok_or_else(|| self.unexpected())?;
        self.pos += 1;
        let mut value = String::new();
        loop {
            match self.current() {
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(value);
                }
                Some(c) => {
                    value.push(c);
                    self.pos += 1;
                }
                None => {
                    return Err(PathError::UnterminatedString {
                        expression: self.expression.to_string(),
                        position: start,
                    })
                }
            }
        }
    }

    fn capture_plain_name(&mut self) -> Result<String, PathError> {
        let start = self.pos;
        if self.current() == Some('$') && self.peek(1).is_some_and(is_member_char) {
            self.pos += 1;
        }
        while self.current().is_some_and(is_member_char) {
            self.pos += 1;
        }
        let raw: String = self.chars[start..self.pos].iter().collect();
        let name = raw.trim_matches('-');
        if name.is_empty() {
            self.pos = start;
            return Err(self.unexpected());
        }
        Ok(name.to_string())
    }

    fn scan_bracket(&mut self) -> Result<(), PathError> {
        let open = self.pos;
        self.pos += 1;
        self.skip_whitespace();
        match self.current() {
            None => Err(self.unclosed_bracket(open)),
            Some('?') => {
                self.pos += 1;
                self.scan_filter(open)
            }
            Some('*') => {
                self.pos += 1;
                self.expect_close(open)?;
                self.tokens.push(Token::IndexWildSelector);
                Ok(())
            }
            Some(c) if is_quote(c) => {
                let mut names = vec![self.capture_quoted()?];
                self.skip_whitespace();
                while self.current() == Some(',') {
                    self.pos += 1;
                    self.skip_whitespace();
                    if !self.current().is_some_and(is_quote) {
                        return Err(self.unexpected_or_unclosed(open));
                    }
                    names.push(self.capture_quoted()?);
                    self.skip_whitespace();
                }
                self.expect_close(open)?;
                if names.len() == 1 {
                    self.tokens.push(Token::dot(names.remove(0)));
                } else {
                    self.tokens.push(Token::UnionMember(names));
                }
                Ok(())
            }
            Some(c) if c == '-' || c == ':' || c.is_ascii_digit() => self.scan_numeric_bracket(open),
            Some(_) => Err(self.unexpected()),
        }
    }

    fn unexpected_or_unclosed(&self, open: usize) -> PathError {
        if self.eof() {
            self.unclosed_bracket(open)
        } else {
            self.unexpected()
        }
    }

    fn expect_close(&mut self, open: usize) -> Result<(), PathError> {
        self.skip_whitespace();
        match self.current() {
            Some(']') => {
                self.pos += 1;
                Ok(())
            }
            _ => Err(self.unexpected_or_unclosed(open)),
        }
    }

    /// `[1]`, `[1,2]` and `[start:stop:step]`
    fn scan_numeric_bracket(&mut self, open: usize) -> Result<(), PathError> {
        let start = self.pos;
        while let Some(c) = self.current() {
            if c == ']' {
                break;
            }
            if !(c.is_ascii_digit() || c == '-' || c == ':' || c == ',' || c.is_whitespace()) {
                return Err(self.unexpected());
            }
            self.pos += 1;
        }
        if self.eof() {
            return Err(self.unclosed_bracket(open));
        }
        let body: String = self.chars[start..self.pos].iter().collect();
        self.pos += 1;

        if body.contains(':') {
            let parts: Vec<&str> = body.split(':').collect();
            if parts.len() > 3 || body.contains(',') {
                return Err(self.invalid_number(start));
            }
            let mut bounds = [None, None, None];
            for (i, part) in parts.iter().enumerate() {
                let part = part.trim();
                if !part.is_empty() {
                    bounds[i] = Some(self.parse_integer(part, start)?);
                }
            }
            self.tokens.push(Token::ArraySlice {
                start: bounds[0],
                stop: bounds[1],
                step: bounds[2],
            });
        } else if body.contains(',') {
            let items = body
                .split(',')
                .map(|part| self.parse_integer(part.trim(), start))
                .collect::<Result<Vec<_>, _>>()?;
            self.tokens.push(Token::UnionIndex(items));
        } else {
            let index = self.parse_integer(body.trim(), start)?;
            self.tokens.push(Token::IndexSelector(index));
        }
        Ok(())
    }

    fn parse_integer(&self, text: &str, position: usize) -> Result<i64, PathError> {
        text.parse::<i64>()
            .map_err(|_| self.invalid_number(position))
    }

    fn invalid_number(&self, position: usize) -> PathError {
        PathError::InvalidNumber {
            expression: self.expression.to_string(),
            position,
        }
    }

    fn unterminated_filter(&self, open: usize) -> PathError {
        PathError::UnterminatedFilter {
            expression: self.expression.to_string(),
            position: open,
        }
    }

    /// Scan the predicate of `[?...]` up to and including the closing `]`
    fn scan_filter(&mut self, open: usize) -> Result<(), PathError> {
        let first = self.tokens.len();
        self.tokens.push(Token::StartFilter);
        let mut depth = 0usize;
        loop {
            self.skip_whitespace();
            let c = self.current().ok_or_else(|| self.unterminated_filter(open))?;
            match c {
                ']' if depth == 0 => {
                    self.pos += 1;
                    break;
                }
                ']' => return Err(self.unterminated_filter(open)),
                '(' => {
                    self.pos += 1;
                    depth += 1;
                    self.tokens.push(Token::StartGroup);
                }
                ')' if depth == 0 => return Err(self.unexpected()),
                ')' => {
                    self.pos += 1;
                    depth -= 1;
                    self.tokens.push(Token::EndGroup);
                }
                '@' => {
                    self.pos += 1;
                    self.tokens.push(Token::CurrentRef);
                    self.scan_filter_path()?;
                }
                '$' => {
                    self.pos += 1;
                    self.tokens.push(Token::RootRef);
                    self.scan_filter_path()?;
                }
                '!' if self.peek(1) == Some('=') => {
                    self.pos += 2;
                    self.push_comparison(ComparisonOp::Ne);
                }
                '!' => {
                    self.pos += 1;
                    self.tokens.push(Token::NotOperator);
                }
                '=' if self.peek(1) == Some('=') => {
                    self.pos += 2;
                    self.push_comparison(ComparisonOp::Eq);
                }
                '~' if self.peek(1) == Some('=') => {
                    self.pos += 2;
                    self.push_comparison(ComparisonOp::RegEx);
                }
                '<' | '>' => {
                    let or_equal = self.peek(1) == Some('=');
                    self.pos += if or_equal { 2 } else { 1 };
                    let op = match (c, or_equal) {
                        ('<', false) => ComparisonOp::Lt,
                        ('<', true) => ComparisonOp::Le,
                        ('>', false) => ComparisonOp::Gt,
                        _ => ComparisonOp::Ge,
                    };
                    self.push_comparison(op);
                }
                '&' | '|' if self.peek(1) == Some(c) => {
                    self.pos += 2;
                    let op = if c == '&' { LogicalOp::And } else { LogicalOp::Or };
                    self.tokens.push(Token::LogicalOperator(op));
                }
                '=' | '~' | '&' | '|' => return Err(self.unknown_operator(&c.to_string())),
                c if is_quote(c) => {
                    let value = self.capture_quoted()?;
                    self.tokens.push(Token::String(value));
                }
                c if c.is_ascii_digit() || (c == '-' && self.peek(1).is_some_and(|n| n.is_ascii_digit())) => {
                    self.scan_integer_literal()?;
                }
                c if c.is_alphabetic() => self.scan_word()?,
                _ => return Err(self.unexpected()),
            }
        }
        if depth != 0 {
            return Err(self.unterminated_filter(open));
        }
        self.unwrap_outer_group(first);
        self.tokens.push(Token::EndFilter);
        Ok(())
    }

    fn push_comparison(&mut self, op: ComparisonOp) {
        self.tokens.push(Token::ComparisonOperator(op));
    }

    /// Member selectors following `@` or `$` inside a filter
    fn scan_filter_path(&mut self) -> Result<(), PathError> {
        while self.scan_segment()? {}
        Ok(())
    }

    fn scan_integer_literal(&mut self) -> Result<(), PathError> {
        let start = self.pos;
        if self.current() == Some('-') {
            self.pos += 1;
        }
        while self.current().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        let value = self.parse_integer(&text, start)?;
        self.tokens.push(Token::Integer(value));
        Ok(())
    }

    fn scan_word(&mut self) -> Result<(), PathError> {
        let start = self.pos;
        while self.current().is_some_and(char::is_alphanumeric) {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        if word.eq_ignore_ascii_case("true") {
            self.tokens.push(Token::Boolean(true));
        } else if word.eq_ignore_ascii_case("false") {
            self.tokens.push(Token::Boolean(false));
        } else {
            self.pos = start;
            return Err(self.unexpected());
        }
        Ok(())
    }

    /// `[?(...)]` and `[?...]` produce the same tokens: drop a group that
    /// spans the whole predicate.
    fn unwrap_outer_group(&mut self, first: usize) {
        let body = first + 1;
        if self.tokens.get(body) != Some(&Token::StartGroup) {
            return;
        }
        let mut depth = 0usize;
        let mut close = None;
        for (i, token) in self.tokens.iter().enumerate().skip(body) {
            match token {
                Token::StartGroup => depth += 1,
                Token::EndGroup => {
                    depth -= 1;
                    if depth == 0 {
                        close = Some(i);
                        break;
                    }
                }
                _ => {}
            }
        }
        if close == Some(self.tokens.len() - 1) {
            self.tokens.pop();
            self.tokens.remove(body);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slice(start: Option<i64>, stop: Option<i64>, step: Option<i64>) -> Token {
        Token::ArraySlice { start, stop, step }
    }

    #[test]
    fn test_tokenize_simple() {
        assert_eq!(tokenize("store").unwrap(), vec![Token::dot("store")]);
        assert_eq!(tokenize(".").unwrap(), vec![Token::RootRef]);
        assert_eq!(tokenize("@").unwrap(), vec![Token::RootRef]);
        assert_eq!(tokenize("$.").unwrap(), vec![Token::RootRef]);
        assert_eq!(tokenize("$schema").unwrap(), vec![Token::dot("$schema")]);
        assert_eq!(
            tokenize("$.name").unwrap(),
            vec![Token::RootRef, Token::dot("name")]
        );
        assert_eq!(
            tokenize(".name").unwrap(),
            vec![Token::RootRef, Token::dot("name")]
        );
    }

    #[test]
    fn test_tokenize_member_names() {
        assert_eq!(tokenize("member_name").unwrap(), vec![Token::dot("member_name")]);
        assert_eq!(tokenize("member-name").unwrap(), vec![Token::dot("member-name")]);
        assert_eq!(tokenize("-member-name-").unwrap(), vec![Token::dot("member-name")]);
    }

    #[test]
    fn test_tokenize_case_sensitive_marker() {
        assert_eq!(
            tokenize("$+name").unwrap(),
            vec![
                Token::RootRef,
                Token::DotSelector {
                    name: "name".to_string(),
                    case_sensitive: true
                }
            ]
        );
    }

    #[test]
    fn test_tokenize_quoted_names() {
        for path in [
            "'store.property'",
            "\"store.property\"",
            "['store.property']",
            "[\"store.property\"]",
        ] {
            assert_eq!(tokenize(path).unwrap(), vec![Token::dot("store.property")], "{}", path);
        }
    }

    #[test]
    fn test_tokenize_bracket_member_chain() {
        assert_eq!(
            tokenize("$['store'].book[0].author").unwrap(),
            vec![
                Token::RootRef,
                Token::dot("store"),
                Token::dot("book"),
                Token::IndexSelector(0),
                Token::dot("author"),
            ]
        );
    }

    #[test]
    fn test_tokenize_index_and_wildcards() {
        assert_eq!(
            tokenize("$[10]").unwrap(),
            vec![Token::RootRef, Token::IndexSelector(10)]
        );
        assert_eq!(
            tokenize("$[-1]").unwrap(),
            vec![Token::RootRef, Token::IndexSelector(-1)]
        );
        assert_eq!(
            tokenize("$[*]").unwrap(),
            vec![Token::RootRef, Token::IndexWildSelector]
        );
        assert_eq!(
            tokenize("$.*").unwrap(),
            vec![Token::RootRef, Token::DotWildSelector]
        );
        assert_eq!(tokenize("a.[*][*].b").unwrap(), tokenize("a[*][*].b").unwrap());
        assert_eq!(tokenize("a.[*].[*].b").unwrap(), tokenize("a[*][*].b").unwrap());
    }

    #[test]
    fn test_tokenize_descendant() {
        assert_eq!(
            tokenize("$..name").unwrap(),
            vec![
                Token::RootRef,
                Token::DescendantSelector {
                    name: "name".to_string(),
                    case_sensitive: false
                }
            ]
        );
        assert_eq!(
            tokenize("$..*").unwrap(),
            vec![
                Token::RootRef,
                Token::DescendantSelector {
                    name: "*".to_string(),
                    case_sensitive: false
                }
            ]
        );
    }

    #[test]
    fn test_tokenize_slices() {
        assert_eq!(
            tokenize("$.items[-1:]").unwrap()[2],
            slice(Some(-1), None, None)
        );
        assert_eq!(
            tokenize("$.items[1:2:-1]").unwrap()[2],
            slice(Some(1), Some(2), Some(-1))
        );
        assert_eq!(tokenize("$.items[:2]").unwrap()[2], slice(None, Some(2), None));
        assert_eq!(tokenize("$.items[::2]").unwrap()[2], slice(None, None, Some(2)));
        assert_eq!(
            tokenize("$.items[::-1].id").unwrap(),
            vec![
                Token::RootRef,
                Token::dot("items"),
                slice(None, None, Some(-1)),
                Token::dot("id"),
            ]
        );
    }

    #[test]
    fn test_tokenize_unions() {
        assert_eq!(tokenize("$[1,2]").unwrap()[1], Token::UnionIndex(vec![1, 2]));
        assert_eq!(tokenize("$[ 1 , 2 ]").unwrap()[1], Token::UnionIndex(vec![1, 2]));
        let expected = Token::UnionMember(vec!["name".to_string(), "value".to_string()]);
        assert_eq!(tokenize("$['name','value']").unwrap()[1], expected);
        assert_eq!(tokenize("$[ \"name\" , \"value\" ]").unwrap()[1], expected);
    }

    #[test]
    fn test_tokenize_filter_boolean() {
        let expected = vec![
            Token::RootRef,
            Token::StartFilter,
            Token::CurrentRef,
            Token::dot("enabled"),
            Token::ComparisonOperator(ComparisonOp::Eq),
            Token::Boolean(true),
            Token::EndFilter,
        ];
        assert_eq!(tokenize("$[?(@.enabled==true)]").unwrap(), expected);
        assert_eq!(tokenize("$[?@.enabled==True]").unwrap(), expected);
    }

    #[test]
    fn test_tokenize_filter_literals() {
        let actual = tokenize("$[?(@.price < 10)]").unwrap();
        assert_eq!(actual.len(), 7);
        assert_eq!(actual[4], Token::ComparisonOperator(ComparisonOp::Lt));
        assert_eq!(actual[5], Token::Integer(10));
        assert_eq!(tokenize("$[?(@.price<10)]").unwrap(), actual);

        let actual = tokenize("$[?(@.id=='1')]").unwrap();
        assert_eq!(actual[5], Token::String("1".to_string()));
        assert_eq!(tokenize("$[?(@.id == \"1\")]").unwrap(), actual);
    }

    #[test]
    fn test_tokenize_filter_exists() {
        let actual = tokenize("$[?@.Spec.Properties.Kind].TargetName").unwrap();
        assert_eq!(
            actual,
            vec![
                Token::RootRef,
                Token::StartFilter,
                Token::CurrentRef,
                Token::dot("Spec"),
                Token::dot("Properties"),
                Token::dot("Kind"),
                Token::EndFilter,
                Token::dot("TargetName"),
            ]
        );
    }

    #[test]
    fn test_tokenize_filter_not() {
        let expected = vec![
            Token::RootRef,
            Token::StartFilter,
            Token::NotOperator,
            Token::CurrentRef,
            Token::dot("enabled"),
            Token::EndFilter,
        ];
        assert_eq!(tokenize("$[?(!@.enabled)]").unwrap(), expected);
        assert_eq!(tokenize("$[?!@.enabled]").unwrap(), expected);
    }

    #[test]
    fn test_tokenize_filter_or() {
        let actual = tokenize("$[?(@.on == true || @.enabled == true)]").unwrap();
        assert_eq!(actual.len(), 12);
        assert_eq!(actual[6], Token::LogicalOperator(LogicalOp::Or));
        assert_eq!(actual[11], Token::EndFilter);

        let actual = tokenize("$[?(@.on || @.enabled == true)]").unwrap();
        assert_eq!(actual.len(), 10);
        assert_eq!(actual[4], Token::LogicalOperator(LogicalOp::Or));
    }

    #[test]
    fn test_tokenize_filter_inner_groups_kept() {
        let actual = tokenize("$[?(@.a == 1) && (@.b == 2)]").unwrap();
        assert_eq!(actual[2], Token::StartGroup);
        assert_eq!(actual[actual.len() - 2], Token::EndGroup);
    }

    #[test]
    fn test_tokenize_malformed() {
        assert_eq!(tokenize("  "), Err(PathError::EmptyExpression));
        assert!(matches!(
            tokenize("$[0"),
            Err(PathError::UnclosedBracket { position: 1, .. })
        ));
        assert!(matches!(
            tokenize("$[?(@.a == 1)"),
            Err(PathError::UnterminatedFilter { .. })
        ));
        assert!(matches!(
            tokenize("$[?(@.a = 1)]"),
            Err(PathError::UnknownOperator { ref operator, .. }) if operator == "="
        ));
        assert!(matches!(
            tokenize("$[?(@.a & @.b)]"),
            Err(PathError::UnknownOperator { .. })
        ));
        assert!(matches!(
            tokenize("$['name"),
            Err(PathError::UnterminatedString { .. })
        ));
        assert!(matches!(
            tokenize("$[1:2:3:4]"),
            Err(PathError::InvalidNumber { .. })
        ));
        assert!(matches!(
            tokenize("$.a b"),
            Err(PathError::UnexpectedChar { found: ' ', .. })
        ));
    }
}

//! Extraction of GraphQL documents embedded in host-language (Rust) source
//! files.
//!
//! The loader treats `.graphql`/`.gql` files as whole documents; anything
//! else is scanned here for string literals passed to a GraphQL-tagged macro
//! invocation such as `gql!("query Greeting { greeting }")` or
//! `graphql!(r#"..."#)`. The scan is purely lexical: comments, unrelated
//! strings, char literals and lifetimes are skipped the way a Rust lexer
//! would, so a `gql!` inside a comment or an ordinary string is not plucked.

use crate::diagnostics::Location;

/// Macro names whose string-literal argument is treated as a GraphQL
/// document.
pub(crate) const GRAPHQL_TAGS: &[&str] = &["gql", "graphql"];

/// One embedded document, with the position of the literal's first content
/// character so diagnostics can point into the host file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EmbeddedDocument {
    pub(crate) body: String,
    pub(crate) location: Location,
}

/// A host-language lexical error. The whole file is rejected: recovering
/// mid-literal would only produce garbage documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExtractError {
    pub(crate) message: String,
    pub(crate) location: Location,
}

pub(crate) fn extract_embedded_documents(
    source: &str,
    tags: &[&str],
) -> Result<Vec<EmbeddedDocument>, ExtractError> {
    Scanner::new(source, tags).run()
}

struct Scanner<'a> {
    source: &'a str,
    bytes: &'a [u8],
    tags: &'a [&'a str],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(source: &'a str, tags: &'a [&'a str]) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            tags,
            pos: 0,
        }
    }

    fn run(mut self) -> Result<Vec<EmbeddedDocument>, ExtractError> {
        let mut documents = vec![];

        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b'/' if self.peek(1) == Some(b'/') => self.skip_line_comment(),
                b'/' if self.peek(1) == Some(b'*') => self.skip_block_comment()?,
                b'"' => {
                    self.skip_string_literal()?;
                }
                b'r' | b'b' if self.at_raw_string_start() => {
                    self.skip_raw_string_literal()?;
                }
                b'b' if self.peek(1) == Some(b'"') => {
                    self.pos += 1;
                    self.skip_string_literal()?;
                }
                b'\'' => self.skip_char_literal_or_lifetime(),
                byte if is_identifier_start(byte) => {
                    if let Some(document) = self.identifier_or_invocation()? {
                        documents.push(document);
                    }
                }
                _ => self.pos += 1,
            }
        }

        Ok(documents)
    }

    fn peek(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.pos + ahead).copied()
    }

    fn location_at(&self, offset: usize) -> Location {
        let prefix = &self.source[..offset];
        let line = prefix.bytes().filter(|&b| b == b'\n').count() + 1;
        let column = match prefix.rfind('\n') {
            Some(newline) => prefix[newline + 1..].chars().count() + 1,
            None => prefix.chars().count() + 1,
        };
        Location { line, column }
    }

    fn skip_line_comment(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
            self.pos += 1;
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), ExtractError> {
        let start = self.pos;
        self.pos += 2;
        let mut depth = 1usize;
        while self.pos < self.bytes.len() {
            if self.bytes[self.pos] == b'/' && self.peek(1) == Some(b'*') {
                depth += 1;
                self.pos += 2;
            } else if self.bytes[self.pos] == b'*' && self.peek(1) == Some(b'/') {
                depth -= 1;
                self.pos += 2;
                if depth == 0 {
                    return Ok(());
                }
            } else {
                self.pos += 1;
            }
        }
        Err(ExtractError {
            message: "unterminated block comment".to_string(),
            location: self.location_at(start),
        })
    }

    /// Skip a `"…"` literal, returning its unescaped contents and the offset
    /// of the first content byte.
    fn skip_string_literal(&mut self) -> Result<(String, usize), ExtractError> {
        let quote = self.pos;
        self.pos += 1;
        let content_start = self.pos;
        let mut contents = String::new();

        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b'"' => {
                    self.pos += 1;
                    return Ok((contents, content_start));
                }
                b'\\' => {
                    self.pos += 1;
                    match self.peek(0) {
                        Some(b'n') => contents.push('\n'),
                        Some(b'r') => contents.push('\r'),
                        Some(b't') => contents.push('\t'),
                        Some(b'0') => contents.push('\0'),
                        Some(b'\\') => contents.push('\\'),
                        Some(b'"') => contents.push('"'),
                        Some(b'\'') => contents.push('\''),
                        // A `\` at end of line elides the newline and
                        // following indentation.
                        Some(b'\n') => {
                            self.pos += 1;
                            while matches!(self.peek(0), Some(b' ' | b'\t' | b'\r')) {
                                self.pos += 1;
                            }
                            continue;
                        }
                        // Unknown escapes are kept verbatim; this scanner is
                        // not a conformance lexer.
                        Some(other) => {
                            contents.push('\\');
                            contents.push(other as char);
                        }
                        None => break,
                    }
                    self.pos += 1;
                }
                _ => {
                    let rest = &self.source[self.pos..];
                    let ch = rest.chars().next().unwrap_or('\u{FFFD}');
                    contents.push(ch);
                    self.pos += ch.len_utf8();
                }
            }
        }

        Err(ExtractError {
            message: "unterminated string literal".to_string(),
            location: self.location_at(quote),
        })
    }

    fn at_raw_string_start(&self) -> bool {
        let mut ahead = 1;
        if self.bytes[self.pos] == b'b' {
            if self.peek(1) != Some(b'r') {
                return false;
            }
            ahead = 2;
        }
        loop {
            match self.peek(ahead) {
                Some(b'#') => ahead += 1,
                Some(b'"') => return true,
                _ => return false,
            }
        }
    }

    /// Skip an `r"…"` / `r#"…"#` literal (any hash depth), returning its
    /// contents verbatim and the offset of the first content byte.
    fn skip_raw_string_literal(&mut self) -> Result<(String, usize), ExtractError> {
        let start = self.pos;
        self.pos += 1; // `r`
        if self.bytes.get(self.pos) == Some(&b'r') {
            self.pos += 1; // `br`
        }
        let mut hashes = 0;
        while self.peek(0) == Some(b'#') {
            hashes += 1;
            self.pos += 1;
        }
        self.pos += 1; // opening quote
        let content_start = self.pos;

        let terminator = format!("\"{}", "#".repeat(hashes));
        match self.source[content_start..].find(&terminator) {
            Some(found) => {
                let content_end = content_start + found;
                self.pos = content_end + terminator.len();
                Ok((self.source[content_start..content_end].to_string(), content_start))
            }
            None => Err(ExtractError {
                message: "unterminated raw string literal".to_string(),
                location: self.location_at(start),
            }),
        }
    }

    fn skip_char_literal_or_lifetime(&mut self) {
        // `'x'` or `'\n'` is a char literal; `'static` is a lifetime. A
        // lifetime is just skipped past its opening quote.
        if self.peek(1) == Some(b'\\') {
            self.pos += 2; // quote + backslash
            while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\'' {
                self.pos += 1;
            }
            self.pos += 1;
        } else {
            let rest = &self.source[self.pos + 1..];
            let mut chars = rest.chars();
            let first = chars.next();
            if first.is_some() && chars.next() == Some('\'') {
                self.pos += 1 + first.map(char::len_utf8).unwrap_or(0) + 1;
            } else {
                self.pos += 1;
            }
        }
    }

    /// Consume an identifier; if it is one of the GraphQL tags and is
    /// followed by `! ( "…" )` (or `[`/`{` delimiters), extract the literal.
    fn identifier_or_invocation(&mut self) -> Result<Option<EmbeddedDocument>, ExtractError> {
        let start = self.pos;
        while self.pos < self.bytes.len() && is_identifier_continue(self.bytes[self.pos]) {
            self.pos += 1;
        }
        let identifier = &self.source[start..self.pos];

        if !self.tags.contains(&identifier) {
            return Ok(None);
        }

        let mut probe = self.pos;
        while matches!(self.bytes.get(probe), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            probe += 1;
        }
        if self.bytes.get(probe) != Some(&b'!') {
            return Ok(None);
        }
        probe += 1;
        while matches!(self.bytes.get(probe), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            probe += 1;
        }
        if !matches!(self.bytes.get(probe), Some(b'(' | b'[' | b'{')) {
            return Ok(None);
        }
        probe += 1;
        while matches!(self.bytes.get(probe), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            probe += 1;
        }

        self.pos = probe;
        let (body, content_start) = match self.bytes.get(probe) {
            Some(b'"') => self.skip_string_literal()?,
            Some(b'r' | b'b') if self.at_raw_string_start() => self.skip_raw_string_literal()?,
            // Not a string literal (for example an interpolated variable):
            // leave it for the lexer loop and pluck nothing.
            _ => return Ok(None),
        };

        Ok(Some(EmbeddedDocument {
            body,
            location: self.location_at(content_start),
        }))
    }
}

fn is_identifier_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_'
}

fn is_identifier_continue(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(source: &str) -> Vec<EmbeddedDocument> {
        extract_embedded_documents(source, GRAPHQL_TAGS).unwrap()
    }

    #[test]
    fn plucks_a_raw_string_invocation() {
        let source = r##"
const GREETING: &str = "unrelated";

fn documents() {
    let query = gql!(r#"
        query GreetingQuery {
            greeting
        }
    "#);
}
"##;

        let documents = extract(source);
        assert_eq!(documents.len(), 1);
        assert!(documents[0].body.contains("query GreetingQuery"));
        assert_eq!(documents[0].location, Location { line: 5, column: 25 });
    }

    #[test]
    fn plucks_a_plain_string_with_escapes() {
        let documents = extract(r#"let q = graphql!("query Q {\n  f\n}");"#);
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].body, "query Q {\n  f\n}");
    }

    #[test]
    fn plucks_multiple_invocations_in_one_file() {
        let source = r#"
let a = gql!("query A { a }");
let b = gql!("query B { b }");
"#;
        let bodies: Vec<_> = extract(source).into_iter().map(|d| d.body).collect();
        assert_eq!(bodies, ["query A { a }", "query B { b }"]);
    }

    #[test]
    fn ignores_invocations_inside_comments_and_strings() {
        let source = r#"
// let a = gql!("query CommentedOut { a }");
/* gql!("query BlockCommented { b }") */
let s = "gql!(\"query InString { c }\")";
let real = gql!("query Real { d }");
"#;
        let bodies: Vec<_> = extract(source).into_iter().map(|d| d.body).collect();
        assert_eq!(bodies, ["query Real { d }"]);
    }

    #[test]
    fn ignores_longer_identifiers_and_non_string_arguments() {
        let source = r#"
let a = not_gql!("query A { a }");
let b = gql!(SOME_CONSTANT);
let c = gql_helper("query C { c }");
"#;
        assert_eq!(extract(source), vec![]);
    }

    #[test]
    fn reports_unterminated_literals() {
        let error = extract_embedded_documents("let a = gql!(\"query {", GRAPHQL_TAGS).unwrap_err();
        assert_eq!(error.message, "unterminated string literal");
        assert_eq!(error.location, Location { line: 1, column: 14 });
    }
}

//! Document discovery: glob expansion, file reads, and extraction of parsed
//! GraphQL documents with their source locations.

use std::collections::BTreeSet;
use std::path::Path;
use std::path::PathBuf;

use apollo_compiler::ast;
use apollo_compiler::validation::WithErrors;
use futures::stream;
use futures::StreamExt;
use glob::Pattern;

use crate::diagnostics::DiagnosticSink;
use crate::diagnostics::Location;
use crate::extract::extract_embedded_documents;
use crate::extract::GRAPHQL_TAGS;
use crate::generate::GenerateError;

/// How many file reads are allowed in flight at once. Reads are buffered in
/// order, so concurrency does not affect the order of the resulting sources.
const CONCURRENT_READS: usize = 16;

/// One GraphQL document extracted from one location in one file. Immutable
/// once loaded; `document` is `None` when parsing failed (the parse failure
/// itself is recorded in the diagnostic sink, not here).
#[derive(Debug, Clone)]
pub(crate) struct DocumentSource {
    /// The owning file, as matched by the documents patterns.
    pub(crate) file: String,
    /// Where this document starts within the owning file.
    pub(crate) location: Location,
    pub(crate) document: Option<ast::Document>,
}

impl DocumentSource {
    /// Map a position within this document's text to a position within the
    /// owning file. Only the first line of an embedded document is shifted
    /// by the embedding column.
    pub(crate) fn resolve_location(&self, line: usize, column: usize) -> Location {
        if line <= 1 {
            Location {
                line: self.location.line,
                column: self.location.column + column.saturating_sub(1),
            }
        } else {
            Location {
                line: self.location.line + line - 1,
                column,
            }
        }
    }
}

/// Expand the documents patterns into the deduplicated, lexicographically
/// sorted set of matching files. `!`-prefixed patterns exclude matches.
///
/// Glob expansion order is not guaranteed to be stable, so the sort is what
/// makes everything downstream (diagnostic order, manifest contents)
/// deterministic.
pub fn collect_file_paths(patterns: &[String]) -> Result<Vec<PathBuf>, GenerateError> {
    let mut includes = vec![];
    let mut excludes = vec![];

    for pattern in patterns {
        match pattern.strip_prefix('!') {
            Some(excluded) => excludes.push(Pattern::new(excluded)?),
            None => includes.push(pattern.as_str()),
        }
    }

    let mut paths = BTreeSet::new();
    for pattern in includes {
        for entry in glob::glob(pattern)? {
            let path = entry?;
            if !path.is_file() {
                continue;
            }
            if excludes.iter().any(|exclude| exclude.matches_path(&path)) {
                continue;
            }
            paths.insert(path);
        }
    }

    Ok(paths.into_iter().collect())
}

/// Read every file and extract its document sources. Parse failures become
/// fatal diagnostics and a source with no document; only I/O failures abort.
pub(crate) async fn load_document_sources(
    paths: &[PathBuf],
    sink: &mut DiagnosticSink,
) -> Result<Vec<DocumentSource>, GenerateError> {
    let mut reads = stream::iter(paths.iter().cloned())
        .map(|path| async move {
            let contents = tokio::fs::read_to_string(&path).await;
            (path, contents)
        })
        .buffered(CONCURRENT_READS);

    let mut sources = vec![];
    while let Some((path, contents)) = reads.next().await {
        let contents = contents.map_err(|source| GenerateError::ReadFile {
            path: path.clone(),
            source,
        })?;
        sources.extend(sources_from_file(&path, &contents, sink));
    }

    tracing::debug!(
        "extracted {} document sources from {} files",
        sources.len(),
        paths.len()
    );

    Ok(sources)
}

fn sources_from_file(path: &Path, contents: &str, sink: &mut DiagnosticSink) -> Vec<DocumentSource> {
    let file = path.display().to_string();

    if matches!(
        path.extension().and_then(|extension| extension.to_str()),
        Some("graphql" | "gql")
    ) {
        let location = Location { line: 1, column: 1 };
        return vec![parse_source(file, contents, location, sink)];
    }

    match extract_embedded_documents(contents, GRAPHQL_TAGS) {
        Ok(embedded) => embedded
            .into_iter()
            .map(|document| parse_source(file.clone(), &document.body, document.location, sink))
            .collect(),
        Err(error) => {
            sink.error(file.clone(), Some(error.location), error.message);
            vec![DocumentSource {
                file,
                location: error.location,
                document: None,
            }]
        }
    }
}

/// Parse one document's text. A syntax error is recorded with the parser's
/// message at its best-effort location (resolved into the owning file) and
/// yields a source with no document.
fn parse_source(
    file: String,
    text: &str,
    location: Location,
    sink: &mut DiagnosticSink,
) -> DocumentSource {
    let source = DocumentSource {
        file,
        location,
        document: None,
    };

    match ast::Document::parse(text, &source.file) {
        Ok(document) => DocumentSource {
            document: Some(document),
            ..source
        },
        Err(WithErrors { errors, .. }) => {
            let (message, error_location) = errors
                .iter()
                .next()
                .map(|diagnostic| {
                    let error = diagnostic.unstable_to_json_compat();
                    let location = error
                        .locations
                        .first()
                        .map(|position| source.resolve_location(position.line, position.column));
                    (error.message, location)
                })
                .unwrap_or_else(|| {
                    ("failed to parse GraphQL document".to_string(), None)
                });

            sink.error(
                source.file.clone(),
                error_location.or(Some(source.location)),
                message,
            );
            source
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, relative: &str, contents: &str) {
        let path = dir.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn paths_are_deduplicated_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/b.graphql", "query B { b }");
        write(dir.path(), "src/a.graphql", "query A { a }");
        write(dir.path(), "src/nested/c.graphql", "query C { c }");

        let root = dir.path().display();
        // Overlapping patterns must not produce duplicates.
        let paths = collect_file_paths(&[
            format!("{root}/src/**/*.graphql"),
            format!("{root}/src/*.graphql"),
        ])
        .unwrap();

        let relative: Vec<String> = paths
            .iter()
            .map(|path| {
                path.strip_prefix(dir.path())
                    .unwrap()
                    .display()
                    .to_string()
            })
            .collect();
        assert_eq!(relative, ["src/a.graphql", "src/b.graphql", "src/nested/c.graphql"]);
    }

    #[test]
    fn exclusion_patterns_remove_matches() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/keep.graphql", "query Keep { k }");
        write(dir.path(), "src/skip.ignored.graphql", "query Skip { s }");

        let root = dir.path().display();
        let paths = collect_file_paths(&[
            format!("{root}/src/**/*.graphql"),
            "!**/*.ignored.graphql".to_string(),
        ])
        .unwrap();

        assert_eq!(paths.len(), 1);
        assert!(paths[0].ends_with("src/keep.graphql"));
    }

    #[tokio::test]
    async fn graphql_files_are_parsed_whole() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/query.graphql", "query Greeting { greeting }");

        let paths = collect_file_paths(&[format!("{}/src/*.graphql", dir.path().display())]).unwrap();
        let mut sink = DiagnosticSink::default();
        let sources = load_document_sources(&paths, &mut sink).await.unwrap();

        assert!(sink.is_empty());
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].location, Location { line: 1, column: 1 });
        assert!(sources[0].document.is_some());
    }

    #[tokio::test]
    async fn rust_files_yield_one_source_per_embedded_document() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "src/component.rs",
            r#"
let greeting = gql!("query Greeting { greeting }");
let farewell = gql!("query Farewell { farewell }");
"#,
        );

        let paths = collect_file_paths(&[format!("{}/src/*.rs", dir.path().display())]).unwrap();
        let mut sink = DiagnosticSink::default();
        let sources = load_document_sources(&paths, &mut sink).await.unwrap();

        assert!(sink.is_empty());
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].location.line, 2);
        assert_eq!(sources[1].location.line, 3);
    }

    #[tokio::test]
    async fn graphql_syntax_errors_become_fatal_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/broken.graphql", "query {{{{");

        let paths = collect_file_paths(&[format!("{}/src/*.graphql", dir.path().display())]).unwrap();
        let mut sink = DiagnosticSink::default();
        let sources = load_document_sources(&paths, &mut sink).await.unwrap();

        assert!(sink.has_fatal());
        assert_eq!(sources.len(), 1);
        assert!(sources[0].document.is_none());
    }

    #[test]
    fn embedded_locations_resolve_into_the_host_file() {
        let source = DocumentSource {
            file: "src/component.rs".to_string(),
            location: Location { line: 10, column: 22 },
            document: None,
        };

        // First line shifts by the embedding column.
        assert_eq!(
            source.resolve_location(1, 3),
            Location { line: 10, column: 24 }
        );
        // Later lines only shift by the embedding line.
        assert_eq!(
            source.resolve_location(4, 3),
            Location { line: 13, column: 3 }
        );
    }
}

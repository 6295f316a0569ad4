//! Name validation across every discovered document: anonymous operations,
//! multi-operation documents, and duplicate operation/fragment names.

use apollo_compiler::ast;
use apollo_compiler::Node;
use indexmap::IndexMap;

use crate::diagnostics::DiagnosticSink;
use crate::diagnostics::Location;
use crate::loader::DocumentSource;

/// One registered top-level definition: which source defines it, and where.
#[derive(Debug, Clone)]
pub(crate) struct RegisteredDefinition {
    pub(crate) source_index: usize,
    pub(crate) location: Option<Location>,
}

/// Operation and fragment names across the whole discovered set. The two
/// namespaces are separate; within each, names must be globally unique
/// (fragments resolve through a global registry, so per-document scoping
/// would not be enough).
#[derive(Debug, Default)]
pub(crate) struct NameRegistry {
    pub(crate) operations: IndexMap<String, Vec<RegisteredDefinition>>,
    pub(crate) fragments: IndexMap<String, Vec<RegisteredDefinition>>,
}

/// Where a definition sits in its owning file, best effort.
fn definition_location<T>(source: &DocumentSource, node: &Node<T>) -> Option<Location> {
    let document = source.document.as_ref()?;
    node.line_column_range(&document.sources)
        .map(|range| source.resolve_location(range.start.line, range.start.column))
}

/// Classify every top-level definition of every parsed source, accumulating
/// diagnostics instead of failing fast. Duplicate names produce symmetric
/// all-pairs diagnostics: with three files sharing a name, each file gets one
/// diagnostic per sibling.
pub(crate) fn validate_sources(
    sources: &[DocumentSource],
    sink: &mut DiagnosticSink,
) -> NameRegistry {
    let mut registry = NameRegistry::default();

    for (source_index, source) in sources.iter().enumerate() {
        let Some(document) = &source.document else {
            continue;
        };

        let operation_count = document
            .definitions
            .iter()
            .filter(|definition| {
                matches!(definition, ast::Definition::OperationDefinition(_))
            })
            .count();
        if operation_count > 1 {
            sink.error(
                source.file.clone(),
                Some(source.location),
                "Multi-operation GraphQL documents are not supported. Please split each operation into its own document.",
            );
            continue;
        }

        for definition in &document.definitions {
            match definition {
                ast::Definition::OperationDefinition(operation) => {
                    let Some(name) = operation.name.as_ref() else {
                        let kind =
                            persisted_query_lists::OperationType::from(operation.operation_type);
                        sink.error(
                            source.file.clone(),
                            definition_location(source, operation).or(Some(source.location)),
                            format!(
                                "Anonymous GraphQL operations are not supported. Please name your {kind}."
                            ),
                        );
                        continue;
                    };

                    register(
                        &mut registry.operations,
                        name.to_string(),
                        RegisteredDefinition {
                            source_index,
                            location: definition_location(source, operation),
                        },
                        sources,
                        source_index,
                        sink,
                        DefinitionKind::Operation,
                    );
                }
                ast::Definition::FragmentDefinition(fragment) => {
                    register(
                        &mut registry.fragments,
                        fragment.name.to_string(),
                        RegisteredDefinition {
                            source_index,
                            location: definition_location(source, fragment),
                        },
                        sources,
                        source_index,
                        sink,
                        DefinitionKind::Fragment,
                    );
                }
                _ => {}
            }
        }
    }

    registry
}

#[derive(Clone, Copy)]
enum DefinitionKind {
    Operation,
    Fragment,
}

impl DefinitionKind {
    fn duplicate_message(self, name: &str, sibling_file: &str) -> String {
        match self {
            DefinitionKind::Operation => {
                format!(r#"Operation named "{name}" already defined in: {sibling_file}"#)
            }
            DefinitionKind::Fragment => {
                format!(r#"Fragment named "{name}" already defined in: {sibling_file}"#)
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn register(
    index: &mut IndexMap<String, Vec<RegisteredDefinition>>,
    name: String,
    definition: RegisteredDefinition,
    sources: &[DocumentSource],
    source_index: usize,
    sink: &mut DiagnosticSink,
    kind: DefinitionKind,
) {
    let registered = index.entry(name.clone()).or_default();

    for sibling in registered.iter() {
        let sibling_source = &sources[sibling.source_index];
        let source = &sources[source_index];
        sink.error(
            source.file.clone(),
            definition.location.or(Some(source.location)),
            kind.duplicate_message(&name, &sibling_source.file),
        );
        sink.error(
            sibling_source.file.clone(),
            sibling.location.or(Some(sibling_source.location)),
            kind.duplicate_message(&name, &source.file),
        );
    }

    registered.push(definition);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticSink;

    fn source(file: &str, text: &str) -> DocumentSource {
        DocumentSource {
            file: file.to_string(),
            location: Location { line: 1, column: 1 },
            document: Some(ast::Document::parse(text, file).unwrap()),
        }
    }

    fn messages(sink: DiagnosticSink) -> Vec<(String, String)> {
        sink.into_report()
            .files()
            .flat_map(|(file, diagnostics)| {
                diagnostics
                    .iter()
                    .map(|diagnostic| (file.to_string(), diagnostic.message.clone()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    #[test]
    fn registers_operations_and_fragments_by_name() {
        let sources = [
            source("src/a.graphql", "query GreetingQuery { ...F }"),
            source("src/f.graphql", "fragment F on Query { f }"),
        ];
        let mut sink = DiagnosticSink::default();
        let registry = validate_sources(&sources, &mut sink);

        assert!(sink.is_empty());
        assert_eq!(registry.operations.len(), 1);
        assert_eq!(registry.fragments.len(), 1);
        assert_eq!(registry.operations["GreetingQuery"][0].source_index, 0);
        assert_eq!(registry.fragments["F"][0].source_index, 1);
    }

    #[test]
    fn anonymous_operations_are_rejected_with_their_kind() {
        let sources = [source("src/anonymous.graphql", "mutation { doIt }")];
        let mut sink = DiagnosticSink::default();
        let registry = validate_sources(&sources, &mut sink);

        assert!(registry.operations.is_empty());
        assert_eq!(
            messages(sink),
            [(
                "src/anonymous.graphql".to_string(),
                "Anonymous GraphQL operations are not supported. Please name your mutation."
                    .to_string()
            )]
        );
    }

    #[test]
    fn duplicate_operation_names_get_symmetric_diagnostics() {
        let sources = [
            source("src/a.graphql", "query GreetingQuery { greeting }"),
            source("src/b.graphql", "query GreetingQuery { greeting }"),
        ];
        let mut sink = DiagnosticSink::default();
        validate_sources(&sources, &mut sink);

        let mut reported = messages(sink);
        reported.sort();
        assert_eq!(
            reported,
            [
                (
                    "src/a.graphql".to_string(),
                    r#"Operation named "GreetingQuery" already defined in: src/b.graphql"#
                        .to_string()
                ),
                (
                    "src/b.graphql".to_string(),
                    r#"Operation named "GreetingQuery" already defined in: src/a.graphql"#
                        .to_string()
                ),
            ]
        );
    }

    #[test]
    fn three_way_duplicates_report_one_diagnostic_per_sibling() {
        let sources = [
            source("src/a.graphql", "fragment F on T { a }"),
            source("src/b.graphql", "fragment F on T { b }"),
            source("src/c.graphql", "fragment F on T { c }"),
        ];
        let mut sink = DiagnosticSink::default();
        validate_sources(&sources, &mut sink);

        // a↔b, a↔c, b↔c: six diagnostics, two per file.
        let reported = messages(sink);
        assert_eq!(reported.len(), 6);
        for file in ["src/a.graphql", "src/b.graphql", "src/c.graphql"] {
            assert_eq!(
                reported.iter().filter(|(reported_file, _)| reported_file == file).count(),
                2
            );
        }
    }

    #[test]
    fn multi_operation_documents_are_rejected_whole() {
        let sources = [source(
            "src/multi.graphql",
            "query A { a } query B { b } fragment F on T { f }",
        )];
        let mut sink = DiagnosticSink::default();
        let registry = validate_sources(&sources, &mut sink);

        assert!(sink.has_fatal());
        assert!(registry.operations.is_empty());
        assert!(registry.fragments.is_empty());
    }

    #[test]
    fn duplicates_within_a_single_file_are_detected() {
        let sources = [source(
            "src/dupes.graphql",
            "fragment F on T { a } fragment F on T { b }",
        )];
        let mut sink = DiagnosticSink::default();
        validate_sources(&sources, &mut sink);

        let reported = messages(sink);
        assert_eq!(reported.len(), 2);
        assert!(reported
            .iter()
            .all(|(file, message)| file == "src/dupes.graphql"
                && message
                    == r#"Fragment named "F" already defined in: src/dupes.graphql"#));
    }
}

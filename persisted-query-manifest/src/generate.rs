//! The manifest generation pipeline: discovery, validation,
//! canonicalization, identification, and the manifest artifact itself.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use apollo_compiler::ast;
use apollo_compiler::Node;
use persisted_query_lists::ManifestOperation;
use persisted_query_lists::PersistedQueryManifest;
use thiserror::Error;

use crate::canonicalize::Canonicalizer;
use crate::canonicalize::FragmentRegistry;
use crate::config::PersistedQueryManifestConfig;
use crate::diagnostics::DiagnosticReport;
use crate::diagnostics::DiagnosticSink;
use crate::loader::collect_file_paths;
use crate::loader::load_document_sources;
use crate::loader::DocumentSource;
use crate::operation_id::default_operation_id;
use crate::operation_id::OperationIdContext;
use crate::registry::validate_sources;

#[derive(Debug, Error)]
pub enum GenerateError {
    /// Validation failed; no manifest is produced. The report renders every
    /// diagnostic grouped by file.
    #[error("{report}")]
    Diagnostics { report: DiagnosticReport },
    #[error("invalid documents pattern: {0}")]
    Pattern(#[from] glob::PatternError),
    #[error("failed to walk documents pattern: {0}")]
    Glob(#[from] glob::GlobError),
    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to serialize manifest: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("failed to write manifest to {path}: {source}")]
    WriteManifest {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Discover, validate, canonicalize, and identify every operation reachable
/// from the configured documents patterns. Returns the manifest, or the full
/// set of fatal diagnostics if anything is wrong; nothing is written to disk
/// either way (see [`write_manifest`]).
pub async fn generate_persisted_query_manifest(
    config: &PersistedQueryManifestConfig,
    config_path: Option<&Path>,
) -> Result<PersistedQueryManifest, GenerateError> {
    let paths = collect_file_paths(&config.documents)?;
    tracing::debug!("discovered {} files", paths.len());

    let mut sink = DiagnosticSink::default();
    let sources = load_document_sources(&paths, &mut sink).await?;
    let registry = validate_sources(&sources, &mut sink);

    if sink.has_fatal() {
        return Err(GenerateError::Diagnostics {
            report: sink.into_report(),
        });
    }

    let fragments = FragmentRegistry::from_sources(&sources);
    let canonicalizer = Canonicalizer {
        fragments: &fragments,
        document_transform: config.document_transform.as_deref(),
        add_typename: config.add_typename,
    };

    // The identifier-collision diagnostic belongs to the configuration that
    // supplied the identifier function, not to any document.
    let config_file = config_path
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<virtual>".to_string());

    let mut operation_names: Vec<&String> = registry.operations.keys().collect();
    operation_names.sort();

    let mut ids_to_names: HashMap<String, String> = HashMap::new();
    let mut operations = vec![];

    for name in operation_names {
        // Exactly one definition per name: duplicates were fatal above.
        let Some(registered) = registry.operations[name].first() else {
            continue;
        };
        let source = &sources[registered.source_index];
        let Some(operation) = operation_in(source) else {
            continue;
        };

        let canonical = match canonicalizer.canonicalize(operation) {
            Ok(canonical) => canonical,
            Err(error) => {
                sink.error(source.file.clone(), registered.location, error.to_string());
                continue;
            }
        };

        let id = match config.create_operation_id.as_deref() {
            Some(create_operation_id) => {
                let context =
                    OperationIdContext::new(name, canonical.operation_type, &canonical.body);
                create_operation_id(&canonical.body, &context)
            }
            None => default_operation_id(&canonical.body),
        };

        match ids_to_names.get(&id) {
            Some(existing) => sink.error(
                config_file.clone(),
                None,
                format!(
                    "`create_operation_id` created an ID ({id}) for operation named \"{name}\" \
                     that has already been used for operation named \"{existing}\"."
                ),
            ),
            None => {
                ids_to_names.insert(id.clone(), name.clone());
            }
        }

        operations.push(ManifestOperation {
            id,
            name: name.clone(),
            operation_type: canonical.operation_type,
            body: canonical.body,
        });
    }

    if sink.has_fatal() {
        return Err(GenerateError::Diagnostics {
            report: sink.into_report(),
        });
    }

    tracing::debug!("generated manifest with {} operations", operations.len());
    Ok(PersistedQueryManifest::new(operations))
}

/// Persist a manifest as 2-space-indented JSON.
pub async fn write_manifest(
    manifest: &PersistedQueryManifest,
    output: &Path,
) -> Result<(), GenerateError> {
    let json = serde_json::to_string_pretty(manifest).map_err(GenerateError::Serialize)?;
    tokio::fs::write(output, json)
        .await
        .map_err(|source| GenerateError::WriteManifest {
            path: output.to_path_buf(),
            source,
        })
}

fn operation_in(source: &DocumentSource) -> Option<&Node<ast::OperationDefinition>> {
    source
        .document
        .as_ref()?
        .definitions
        .iter()
        .find_map(|definition| match definition {
            ast::Definition::OperationDefinition(operation) => Some(operation),
            _ => None,
        })
}

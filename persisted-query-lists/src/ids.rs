use std::collections::HashMap;

use apollo_compiler::ast;
use apollo_compiler::Node;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

use crate::canonical_print;
use crate::manifest::PersistedQueryManifest;

/// Lower-case hex SHA-256 digest of an operation body. This is the default
/// persisted query ID: a pure function of the body, stable across runs and
/// platforms.
pub fn operation_hash(body: &str) -> String {
    let mut digest = Sha256::new();
    digest.update(body.as_bytes());
    hex::encode(digest.finalize())
}

/// Compute a persisted query ID for an outgoing document at request time,
/// without consulting a manifest: the hash of the canonically sorted and
/// printed document. Matches the ID the manifest generator assigns when no
/// document transform is configured.
pub fn persisted_query_id(document: &ast::Document) -> String {
    operation_hash(&canonical_print(document))
}

/// Why a dispatched document could not be resolved to a manifest entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationLookupError {
    #[error("anonymous operations are not supported")]
    AnonymousOperation,
    #[error("multi-operation documents are not supported")]
    MultipleOperations,
    #[error("documents without operations are not supported")]
    NoOperations,
    #[error("operation {operation_name} not found in manifest")]
    UnknownOperation { operation_name: String },
}

/// Find the unique, named operation definition in a dispatched document.
/// Definitions are checked in order, so a document whose second definition is
/// an anonymous operation reports [`OperationLookupError::AnonymousOperation`]
/// rather than [`OperationLookupError::MultipleOperations`].
pub fn single_named_operation(
    document: &ast::Document,
) -> Result<&Node<ast::OperationDefinition>, OperationLookupError> {
    let mut found = None;

    for definition in &document.definitions {
        if let ast::Definition::OperationDefinition(operation) = definition {
            if operation.name.is_none() {
                return Err(OperationLookupError::AnonymousOperation);
            }
            if found.is_some() {
                return Err(OperationLookupError::MultipleOperations);
            }
            found = Some(operation);
        }
    }

    found.ok_or(OperationLookupError::NoOperations)
}

/// A name → ID index over a manifest, for clients that send the IDs recorded
/// at generation time instead of hashing at runtime. Lookup matches on the
/// operation name alone; the dispatched body is not compared (use
/// [`crate::ManifestVerificationLayer`] for that).
#[derive(Debug, Clone, Default)]
pub struct ManifestOperationIds {
    ids_by_name: HashMap<String, String>,
}

impl ManifestOperationIds {
    pub fn from_manifest(manifest: &PersistedQueryManifest) -> Self {
        Self {
            ids_by_name: manifest
                .operations
                .iter()
                .map(|operation| (operation.name.clone(), operation.id.clone()))
                .collect(),
        }
    }

    pub fn id_for_document(
        &self,
        document: &ast::Document,
    ) -> Result<String, OperationLookupError> {
        let operation = single_named_operation(document)?;
        let Some(name) = operation.name.as_ref() else {
            return Err(OperationLookupError::AnonymousOperation);
        };

        self.ids_by_name
            .get(name.as_str())
            .cloned()
            .ok_or_else(|| OperationLookupError::UnknownOperation {
                operation_name: name.to_string(),
            })
    }
}

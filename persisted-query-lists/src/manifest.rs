use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// The `format` field every persisted query manifest must carry.
pub const MANIFEST_FORMAT: &str = "apollo-persisted-query-manifest";

/// The manifest schema version this crate understands.
pub const MANIFEST_VERSION: u64 = 1;

/// The kind of a top-level executable operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Query,
    Mutation,
    Subscription,
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperationType::Query => "query",
            OperationType::Mutation => "mutation",
            OperationType::Subscription => "subscription",
        })
    }
}

impl From<apollo_compiler::ast::OperationType> for OperationType {
    fn from(operation_type: apollo_compiler::ast::OperationType) -> Self {
        use apollo_compiler::ast::OperationType as Ast;
        match operation_type {
            Ast::Query => OperationType::Query,
            Ast::Mutation => OperationType::Mutation,
            Ast::Subscription => OperationType::Subscription,
        }
    }
}

/// A single manifest entry: an operation ID, the operation's name and kind,
/// and its canonical body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestOperation {
    /// The operation ID (usually a hash of the body).
    pub id: String,
    /// The operation name. Unique within a manifest.
    pub name: String,
    /// The operation kind.
    #[serde(rename = "type")]
    pub operation_type: OperationType,
    /// The canonical printed body, including every fragment the operation
    /// depends on.
    pub body: String,
}

/// A versioned persisted query manifest, as written by the generator and
/// loaded by servers and verification layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedQueryManifest {
    pub format: String,
    pub version: u64,
    pub operations: Vec<ManifestOperation>,
}

/// Reasons a manifest document was rejected at load time.
#[derive(Debug, Error)]
pub enum ManifestFormatError {
    #[error("manifest format is not '{MANIFEST_FORMAT}'")]
    UnsupportedFormat { found: String },
    #[error("persisted query manifest version is not {MANIFEST_VERSION}")]
    UnsupportedVersion { found: u64 },
    #[error("could not parse persisted query manifest: {0}")]
    Parse(#[from] serde_json::Error),
}

impl PersistedQueryManifest {
    /// Wrap a set of operations in the current manifest envelope.
    pub fn new(operations: Vec<ManifestOperation>) -> Self {
        Self {
            format: MANIFEST_FORMAT.to_string(),
            version: MANIFEST_VERSION,
            operations,
        }
    }

    pub fn validate(self) -> Result<Self, ManifestFormatError> {
        if self.format != MANIFEST_FORMAT {
            return Err(ManifestFormatError::UnsupportedFormat { found: self.format });
        }

        if self.version != MANIFEST_VERSION {
            return Err(ManifestFormatError::UnsupportedVersion { found: self.version });
        }

        Ok(self)
    }

    pub fn parse_and_validate(raw: &str) -> Result<Self, ManifestFormatError> {
        serde_json::from_str::<PersistedQueryManifest>(raw)?.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW_MANIFEST: &str = r#"{
        "format": "apollo-persisted-query-manifest",
        "version": 1,
        "operations": [
            {
                "id": "5678",
                "name": "TypenameQuery",
                "type": "query",
                "body": "query TypenameQuery {\n  __typename\n}"
            }
        ]
    }"#;

    #[test]
    fn parses_and_validates_a_manifest() {
        let manifest = PersistedQueryManifest::parse_and_validate(RAW_MANIFEST).unwrap();
        assert_eq!(manifest.format, MANIFEST_FORMAT);
        assert_eq!(manifest.version, 1);
        assert_eq!(manifest.operations.len(), 1);
        assert_eq!(manifest.operations[0].id, "5678");
        assert_eq!(manifest.operations[0].name, "TypenameQuery");
        assert_eq!(manifest.operations[0].operation_type, OperationType::Query);
    }

    #[test]
    fn rejects_unknown_format() {
        let manifest = PersistedQueryManifest {
            format: "not-a-manifest".to_string(),
            version: 1,
            operations: vec![],
        };
        assert!(matches!(
            manifest.validate(),
            Err(ManifestFormatError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn rejects_unknown_version() {
        let manifest = PersistedQueryManifest {
            format: MANIFEST_FORMAT.to_string(),
            version: 2,
            operations: vec![],
        };
        assert!(matches!(
            manifest.validate(),
            Err(ManifestFormatError::UnsupportedVersion { found: 2 })
        ));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            PersistedQueryManifest::parse_and_validate("{"),
            Err(ManifestFormatError::Parse(_))
        ));
    }

    #[test]
    fn round_trips_operation_type_field_name() {
        let manifest = PersistedQueryManifest::parse_and_validate(RAW_MANIFEST).unwrap();
        let serialized = serde_json::to_string(&manifest).unwrap();
        assert!(serialized.contains(r#""type":"query""#));
    }
}

//! Generator configuration: programmatic options plus config-file loading
//! and discovery.
//!
//! `documents`, `output`, and `add_typename` can come from a JSON or YAML
//! config file. The function-valued options (`create_operation_id`,
//! `document_transform`) are only available through this struct: a Rust
//! config file cannot carry code.

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use apollo_compiler::ast;
use serde::Deserialize;
use thiserror::Error;

use crate::operation_id::OperationIdContext;

/// Transform applied to each fragment-resolved document before
/// canonicalization, e.g. [`crate::transforms::hide_literals`].
pub type DocumentTransform = Arc<dyn Fn(ast::Document) -> ast::Document + Send + Sync>;

/// Custom identifier function: canonical body and context in, manifest ID
/// out.
pub type CreateOperationId =
    Arc<dyn Fn(&str, &OperationIdContext<'_>) -> String + Send + Sync>;

/// Default glob patterns for document discovery.
pub const DEFAULT_DOCUMENT_PATTERNS: &[&str] =
    &["src/**/*.graphql", "src/**/*.gql", "src/**/*.rs"];

/// Default manifest output path.
pub const DEFAULT_OUTPUT: &str = "persisted-query-manifest.json";

pub struct PersistedQueryManifestConfig {
    /// Paths to your GraphQL documents: queries, mutations, subscriptions,
    /// and fragments. Prefix a pattern with `!` to exclude its matches.
    pub documents: Vec<String>,
    /// Path where the manifest file will be written.
    pub output: PathBuf,
    /// Complete every non-root selection set with a `__typename` field, the
    /// way normalizing client caches expect. On by default.
    pub add_typename: bool,
    /// Function that generates a manifest operation ID for a given canonical
    /// body. Defaults to a SHA-256 hash of the body.
    pub create_operation_id: Option<CreateOperationId>,
    /// Transform applied to each document before it is saved to the
    /// manifest.
    pub document_transform: Option<DocumentTransform>,
}

impl Default for PersistedQueryManifestConfig {
    fn default() -> Self {
        Self {
            documents: DEFAULT_DOCUMENT_PATTERNS
                .iter()
                .map(|pattern| pattern.to_string())
                .collect(),
            output: PathBuf::from(DEFAULT_OUTPUT),
            add_typename: true,
            create_operation_id: None,
            document_transform: None,
        }
    }
}

impl std::fmt::Debug for PersistedQueryManifestConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistedQueryManifestConfig")
            .field("documents", &self.documents)
            .field("output", &self.output)
            .field("add_typename", &self.add_typename)
            .field(
                "create_operation_id",
                &self.create_operation_id.as_ref().map(|_| "<fn>"),
            )
            .field(
                "document_transform",
                &self.document_transform.as_ref().map(|_| "<fn>"),
            )
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("unsupported config file extension: {path} (expected .json, .yml or .yaml)")]
    UnsupportedExtension { path: PathBuf },
}

/// `documents` may be a single pattern or a list of patterns.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DocumentPatterns {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    documents: Option<DocumentPatterns>,
    output: Option<PathBuf>,
    add_typename: Option<bool>,
}

impl PersistedQueryManifestConfig {
    /// Load options from a JSON or YAML config file, filling in defaults for
    /// anything unset.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let file: ConfigFile = match path.extension().and_then(|extension| extension.to_str()) {
            Some("json") => {
                serde_json::from_str(&contents).map_err(|error| ConfigError::Parse {
                    path: path.to_path_buf(),
                    message: error.to_string(),
                })?
            }
            Some("yml" | "yaml") => {
                serde_yaml::from_str(&contents).map_err(|error| ConfigError::Parse {
                    path: path.to_path_buf(),
                    message: error.to_string(),
                })?
            }
            _ => {
                return Err(ConfigError::UnsupportedExtension {
                    path: path.to_path_buf(),
                })
            }
        };

        let mut config = Self::default();
        match file.documents {
            Some(DocumentPatterns::One(pattern)) => config.documents = vec![pattern],
            Some(DocumentPatterns::Many(patterns)) => config.documents = patterns,
            None => {}
        }
        if let Some(output) = file.output {
            config.output = output;
        }
        if let Some(add_typename) = file.add_typename {
            config.add_typename = add_typename;
        }

        Ok(config)
    }

    /// Look for a config file in `directory`, trying the conventional names
    /// in order. Returns the loaded config together with the path it came
    /// from, or `None` when no config file exists.
    pub fn discover(directory: &Path) -> Result<Option<(Self, PathBuf)>, ConfigError> {
        const MODULE: &str = "persisted-query-manifest";

        for extension in ["json", "yml", "yaml"] {
            for name in [
                format!(".{MODULE}.config.{extension}"),
                format!("{MODULE}.config.{extension}"),
            ] {
                let candidate = directory.join(name);
                if candidate.is_file() {
                    return Ok(Some((Self::from_file(&candidate)?, candidate)));
                }
            }
        }

        Ok(None)
    }
}

//! Generate a persisted query manifest from the GraphQL documents in a
//! source tree.
//!
//! The pipeline discovers documents via glob patterns (whole
//! `.graphql`/`.gql` files, plus `gql!`/`graphql!` string literals embedded
//! in Rust sources), validates that operation and fragment names are unique
//! across the whole set, resolves fragment spreads through a global registry,
//! canonicalizes each operation (optional transform, `__typename`
//! completion, deterministic ordering, normalized printing), assigns each a
//! stable content-addressed ID, and writes the versioned
//! `persisted-query-manifest.json` artifact.
//!
//! The companion `persisted-query-lists` crate consumes that artifact at
//! request time.

pub mod transforms;

mod canonicalize;
mod config;
mod diagnostics;
mod extract;
mod generate;
mod loader;
mod operation_id;
mod registry;

pub use canonicalize::CanonicalizeError;
pub use config::ConfigError;
pub use config::CreateOperationId;
pub use config::DocumentTransform;
pub use config::PersistedQueryManifestConfig;
pub use config::DEFAULT_DOCUMENT_PATTERNS;
pub use config::DEFAULT_OUTPUT;
pub use diagnostics::Diagnostic;
pub use diagnostics::DiagnosticReport;
pub use diagnostics::Location;
pub use generate::generate_persisted_query_manifest;
pub use generate::write_manifest;
pub use generate::GenerateError;
pub use loader::collect_file_paths;
pub use operation_id::default_operation_id;
pub use operation_id::OperationIdContext;
pub use persisted_query_lists::ManifestOperation;
pub use persisted_query_lists::OperationType;
pub use persisted_query_lists::PersistedQueryManifest;

//! Runtime support for Apollo persisted query lists.
//!
//! A persisted query manifest is generated at build time (see the
//! `persisted-query-manifest` crate) and shipped to the server. This crate
//! contains the pieces a client transport needs at request time:
//!
//! * [`sort_top_level_definitions`] and [`canonical_print`], the canonical
//!   ordering and printing that both sides of the protocol agree on,
//! * [`persisted_query_id`] and [`ManifestOperationIds`] for turning an
//!   outgoing document into a persisted query ID,
//! * [`ManifestVerificationLayer`], a [`tower::Layer`] that checks outgoing
//!   operations against a loaded manifest and reports mismatches without
//!   getting in the way of the request.

mod ids;
mod manifest;
mod sort;
mod verify;

pub use ids::operation_hash;
pub use ids::persisted_query_id;
pub use ids::single_named_operation;
pub use ids::ManifestOperationIds;
pub use ids::OperationLookupError;
pub use manifest::ManifestFormatError;
pub use manifest::ManifestOperation;
pub use manifest::OperationType;
pub use manifest::PersistedQueryManifest;
pub use manifest::MANIFEST_FORMAT;
pub use manifest::MANIFEST_VERSION;
pub use sort::canonical_print;
pub use sort::sort_top_level_definitions;
pub use verify::ManifestLoadError;
pub use verify::ManifestVerificationLayer;
pub use verify::ManifestVerificationService;
pub use verify::VerificationFailure;

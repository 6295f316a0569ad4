//! Operation identifiers: the default content hash and the context handed to
//! custom identifier functions.

use persisted_query_lists::operation_hash;
use persisted_query_lists::OperationType;

/// The default operation ID: a lower-case hex SHA-256 digest of the canonical
/// body. A pure function of the body, so it is guaranteed collision-free for
/// distinct bodies (up to hash collisions) and stable across runs and
/// platforms.
pub fn default_operation_id(body: &str) -> String {
    operation_hash(body)
}

/// Context passed to a custom `create_operation_id` function alongside the
/// canonical body.
pub struct OperationIdContext<'a> {
    pub operation_name: &'a str,
    pub operation_type: OperationType,
    body: &'a str,
}

impl<'a> OperationIdContext<'a> {
    pub(crate) fn new(
        operation_name: &'a str,
        operation_type: OperationType,
        body: &'a str,
    ) -> Self {
        Self {
            operation_name,
            operation_type,
            body,
        }
    }

    /// The ID the default identifier function would produce, for custom
    /// functions that only override some operations.
    pub fn create_default_id(&self) -> String {
        default_operation_id(self.body)
    }
}

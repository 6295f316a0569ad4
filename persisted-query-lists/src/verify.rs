use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;

use apollo_compiler::ast;
use futures::future::BoxFuture;
use futures::future::Shared;
use futures::FutureExt;
use thiserror::Error;
use tower::BoxError;
use tower::Layer;
use tower::Service;

use crate::canonical_print;
use crate::ids::single_named_operation;
use crate::ids::OperationLookupError;
use crate::manifest::PersistedQueryManifest;

/// Details handed to the verification callback when a dispatched operation
/// does not line up with the loaded manifest. Verification is advisory: the
/// request is forwarded regardless, and the callback decides what to do with
/// the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationFailure {
    /// The document's operation has no name, so it cannot be matched against
    /// a manifest entry.
    AnonymousOperation,
    /// The document contains more than one operation definition.
    MultipleOperations,
    /// The document contains no operation definition at all (for example a
    /// fragment-only dispatch).
    NoOperations,
    /// The operation name does not appear in the manifest.
    UnknownOperation { operation_name: String },
    /// The operation name is in the manifest, but the canonical body of the
    /// dispatched document differs from the body recorded at generation time.
    OperationMismatch {
        operation_name: String,
        /// Canonical print of what was actually dispatched.
        dispatched_body: String,
        /// The body stored in the manifest for this operation name.
        manifest_body: String,
    },
}

impl From<OperationLookupError> for VerificationFailure {
    fn from(error: OperationLookupError) -> Self {
        match error {
            OperationLookupError::AnonymousOperation => VerificationFailure::AnonymousOperation,
            OperationLookupError::MultipleOperations => VerificationFailure::MultipleOperations,
            OperationLookupError::NoOperations => VerificationFailure::NoOperations,
            OperationLookupError::UnknownOperation { operation_name } => {
                VerificationFailure::UnknownOperation { operation_name }
            }
        }
    }
}

type VerificationCallback = Arc<dyn Fn(VerificationFailure) + Send + Sync>;

/// An unreadable manifest is an operational misconfiguration, not a content
/// mismatch: it is reported through the request's error channel, never
/// through the verification callback.
#[derive(Debug, Clone, Error)]
#[error("failed to load persisted query manifest: {0}")]
pub struct ManifestLoadError(Arc<BoxError>);

/// The manifest's operations indexed by name, with bodies normalized the
/// same way dispatched documents are, so comparison is insensitive to
/// formatting and top-level definition order.
#[derive(Debug)]
struct VerificationIndex {
    operations_by_name: HashMap<String, IndexedOperation>,
}

#[derive(Debug)]
struct IndexedOperation {
    normalized_body: String,
    manifest_body: String,
}

impl VerificationIndex {
    fn new(manifest: &PersistedQueryManifest) -> Self {
        let operations_by_name = manifest
            .operations
            .iter()
            .map(|operation| {
                // A manifest body that does not parse stays around
                // unnormalized, so it still works as a byte-for-byte entry.
                let normalized_body =
                    match ast::Document::parse(&operation.body, "from_manifest") {
                        Ok(document) => canonical_print(&document),
                        Err(_) => operation.body.clone(),
                    };
                (
                    operation.name.clone(),
                    IndexedOperation {
                        normalized_body,
                        manifest_body: operation.body.clone(),
                    },
                )
            })
            .collect::<HashMap<_, _>>();

        tracing::debug!(
            "loaded verification manifest ({} operations)",
            operations_by_name.len()
        );

        Self { operations_by_name }
    }

    fn verify(&self, document: &ast::Document) -> Result<(), VerificationFailure> {
        let operation = single_named_operation(document)?;
        let Some(name) = operation.name.as_ref() else {
            return Err(VerificationFailure::AnonymousOperation);
        };

        let Some(indexed) = self.operations_by_name.get(name.as_str()) else {
            return Err(VerificationFailure::UnknownOperation {
                operation_name: name.to_string(),
            });
        };

        let dispatched_body = canonical_print(document);
        if dispatched_body != indexed.normalized_body {
            return Err(VerificationFailure::OperationMismatch {
                operation_name: name.to_string(),
                dispatched_body,
                manifest_body: indexed.manifest_body.clone(),
            });
        }

        Ok(())
    }
}

type SharedManifestLoad = Shared<BoxFuture<'static, Result<Arc<VerificationIndex>, ManifestLoadError>>>;

/// [`Layer`] that verifies every dispatched document against a persisted
/// query manifest.
///
/// The manifest loader runs at most once: its result (or its error) is
/// memoized behind a shared future, so concurrent requests issued before the
/// load completes all await the same load, and a load failure is surfaced to
/// every subsequent request as an error. Verification failures, by contrast,
/// only ever reach the callback; the request itself is always forwarded to
/// the inner service.
#[derive(Clone)]
pub struct ManifestVerificationLayer {
    manifest: SharedManifestLoad,
    on_verification_failed: VerificationCallback,
}

impl ManifestVerificationLayer {
    /// `load` may resolve immediately (wrap an in-memory manifest in
    /// [`std::future::ready`], or use [`ManifestVerificationLayer::from_manifest`])
    /// or hit the filesystem/network. It is not retried.
    pub fn new<F>(
        load: F,
        on_verification_failed: impl Fn(VerificationFailure) + Send + Sync + 'static,
    ) -> Self
    where
        F: Future<Output = Result<PersistedQueryManifest, BoxError>> + Send + 'static,
    {
        let manifest = load
            .map(|result| {
                result
                    .map(|manifest| Arc::new(VerificationIndex::new(&manifest)))
                    .map_err(|error| ManifestLoadError(Arc::new(error)))
            })
            .boxed()
            .shared();

        Self {
            manifest,
            on_verification_failed: Arc::new(on_verification_failed),
        }
    }

    /// Verify against a manifest that is already in memory.
    pub fn from_manifest(
        manifest: PersistedQueryManifest,
        on_verification_failed: impl Fn(VerificationFailure) + Send + Sync + 'static,
    ) -> Self {
        Self::new(std::future::ready(Ok(manifest)), on_verification_failed)
    }
}

impl<S> Layer<S> for ManifestVerificationLayer {
    type Service = ManifestVerificationService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ManifestVerificationService {
            inner,
            manifest: self.manifest.clone(),
            on_verification_failed: self.on_verification_failed.clone(),
        }
    }
}

/// [`Service`] produced by [`ManifestVerificationLayer`]. The request type is
/// the dispatched [`ast::Document`] itself; transport concerns stay with the
/// inner service.
#[derive(Clone)]
pub struct ManifestVerificationService<S> {
    inner: S,
    manifest: SharedManifestLoad,
    on_verification_failed: VerificationCallback,
}

impl<S> Service<ast::Document> for ManifestVerificationService<S>
where
    S: Service<ast::Document> + Clone + Send + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send,
{
    type Response = S::Response;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<S::Response, BoxError>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, document: ast::Document) -> Self::Future {
        let manifest = self.manifest.clone();
        let on_verification_failed = self.on_verification_failed.clone();
        // Take the service that was driven to readiness and leave a fresh
        // clone in its place.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        async move {
            let index = manifest.await?;

            if let Err(failure) = index.verify(&document) {
                tracing::debug!(?failure, "persisted query manifest verification failed");
                on_verification_failed.as_ref()(failure);
            }

            inner.call(document).await.map_err(Into::into)
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;
    use std::sync::Mutex;

    use tower::util::service_fn;
    use tower::ServiceExt;

    use super::*;
    use crate::manifest::ManifestOperation;
    use crate::manifest::OperationType;

    fn manifest() -> PersistedQueryManifest {
        PersistedQueryManifest::new(vec![ManifestOperation {
            id: "foobar-id".to_string(),
            name: "Foobar".to_string(),
            operation_type: OperationType::Query,
            body: "query Foobar {\n  f\n}".to_string(),
        }])
    }

    #[derive(Clone, Default)]
    struct Failures(Arc<Mutex<Vec<VerificationFailure>>>);

    impl Failures {
        fn callback(&self) -> impl Fn(VerificationFailure) + Send + Sync + 'static {
            let failures = self.0.clone();
            move |failure| failures.lock().unwrap().push(failure)
        }

        fn take(&self) -> Vec<VerificationFailure> {
            std::mem::take(&mut *self.0.lock().unwrap())
        }
    }

    async fn dispatch(
        layer: &ManifestVerificationLayer,
        source: &str,
    ) -> Result<&'static str, BoxError> {
        let service = layer.layer(service_fn(|_document: ast::Document| async {
            Ok::<_, BoxError>("forwarded")
        }));
        let document = ast::Document::parse(source, "request.graphql").unwrap();
        service.oneshot(document).await
    }

    #[tokio::test]
    async fn matching_operation_passes_and_forwards() {
        let failures = Failures::default();
        let layer = ManifestVerificationLayer::from_manifest(manifest(), failures.callback());

        // Formatting differences do not matter.
        let response = dispatch(&layer, "query Foobar { f }").await.unwrap();

        assert_eq!(response, "forwarded");
        assert_eq!(failures.take(), vec![]);
    }

    #[tokio::test]
    async fn anonymous_operation_is_reported_but_forwarded() {
        let failures = Failures::default();
        let layer = ManifestVerificationLayer::from_manifest(manifest(), failures.callback());

        let response = dispatch(&layer, "{ x }").await.unwrap();

        assert_eq!(response, "forwarded");
        assert_eq!(failures.take(), vec![VerificationFailure::AnonymousOperation]);
    }

    #[tokio::test]
    async fn multi_operation_document_is_reported() {
        let failures = Failures::default();
        let layer = ManifestVerificationLayer::from_manifest(manifest(), failures.callback());

        dispatch(&layer, "query Q { a } query QQ { b }").await.unwrap();

        assert_eq!(failures.take(), vec![VerificationFailure::MultipleOperations]);
    }

    #[tokio::test]
    async fn fragment_only_document_is_reported() {
        let failures = Failures::default();
        let layer = ManifestVerificationLayer::from_manifest(manifest(), failures.callback());

        dispatch(&layer, "fragment F on T { f }").await.unwrap();

        assert_eq!(failures.take(), vec![VerificationFailure::NoOperations]);
    }

    #[tokio::test]
    async fn unknown_operation_name_is_reported() {
        let failures = Failures::default();
        let layer = ManifestVerificationLayer::from_manifest(manifest(), failures.callback());

        dispatch(&layer, "query Foo { f }").await.unwrap();

        assert_eq!(
            failures.take(),
            vec![VerificationFailure::UnknownOperation {
                operation_name: "Foo".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn different_body_is_reported_with_the_manifest_body() {
        let failures = Failures::default();
        let layer = ManifestVerificationLayer::from_manifest(manifest(), failures.callback());

        dispatch(&layer, "query Foobar { different }").await.unwrap();

        match failures.take().as_slice() {
            [VerificationFailure::OperationMismatch {
                operation_name,
                manifest_body,
                ..
            }] => {
                assert_eq!(operation_name, "Foobar");
                assert_eq!(manifest_body, "query Foobar {\n  f\n}");
            }
            other => panic!("expected an OperationMismatch failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn load_errors_propagate_to_every_request_without_callbacks() {
        let failures = Failures::default();
        let layer = ManifestVerificationLayer::new(
            std::future::ready(Err::<PersistedQueryManifest, BoxError>(
                "no manifest here".into(),
            )),
            failures.callback(),
        );

        let first = dispatch(&layer, "query Foobar { f }").await;
        let second = dispatch(&layer, "query Foobar { f }").await;

        assert!(first.unwrap_err().to_string().contains("no manifest here"));
        assert!(second.unwrap_err().to_string().contains("no manifest here"));
        assert_eq!(failures.take(), vec![]);
    }

    #[tokio::test]
    async fn manifest_loader_runs_once_across_requests() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counting_loads = loads.clone();
        let failures = Failures::default();
        let layer = ManifestVerificationLayer::new(
            async move {
                counting_loads.fetch_add(1, Ordering::SeqCst);
                Ok::<_, BoxError>(manifest())
            },
            failures.callback(),
        );

        dispatch(&layer, "query Foobar { f }").await.unwrap();
        dispatch(&layer, "query Foobar { f }").await.unwrap();

        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }
}

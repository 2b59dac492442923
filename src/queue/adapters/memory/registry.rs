//! In-memory registry of task operations and services.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::queue::{
    domain::{MethodName, ServiceName},
    ports::{Invocation, OperationRegistry, OperationResult, TaskOperation, TaskService},
};

type BoxedOperationFuture = Pin<Box<dyn Future<Output = OperationResult> + Send>>;

/// Adapts an async closure into a [`TaskOperation`].
pub struct FnOperation<F> {
    handler: F,
}

impl<F> fmt::Debug for FnOperation<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnOperation").finish_non_exhaustive()
    }
}

/// Wraps `handler` as a shareable operation handle.
///
/// ```
/// use taskqueue::queue::adapters::memory::operation_fn;
/// use taskqueue::queue::ports::OperationOutput;
///
/// let operation = operation_fn(|_invocation| async { Ok(OperationOutput::succeeded()) });
/// # let _ = operation;
/// ```
pub fn operation_fn<F, Fut>(handler: F) -> Arc<dyn TaskOperation>
where
    F: Fn(Invocation) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = OperationResult> + Send + 'static,
{
    Arc::new(FnOperation {
        handler: move |invocation: Invocation| -> BoxedOperationFuture {
            Box::pin(handler(invocation))
        },
    })
}

#[async_trait]
impl<F> TaskOperation for FnOperation<F>
where
    F: Fn(Invocation) -> BoxedOperationFuture + Send + Sync,
{
    async fn invoke(&self, invocation: Invocation) -> OperationResult {
        (self.handler)(invocation).await
    }
}

/// Service exposing a fixed set of operations by method name.
#[derive(Clone, Default)]
pub struct ServiceMethods {
    methods: HashMap<MethodName, Arc<dyn TaskOperation>>,
}

impl ServiceMethods {
    /// Creates a service without methods.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `operation` under `method`.
    #[must_use]
    pub fn with_method(mut self, method: MethodName, operation: Arc<dyn TaskOperation>) -> Self {
        self.methods.insert(method, operation);
        self
    }
}

impl fmt::Debug for ServiceMethods {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceMethods")
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl TaskService for ServiceMethods {
    fn operation(&self, method: &MethodName) -> Option<Arc<dyn TaskOperation>> {
        self.methods.get(method).cloned()
    }
}

/// Registry backed by hash maps, populated at start-up.
#[derive(Clone, Default)]
pub struct InMemoryOperationRegistry {
    operations: HashMap<MethodName, Arc<dyn TaskOperation>>,
    services: HashMap<ServiceName, Arc<dyn TaskService>>,
}

impl InMemoryOperationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a local operation.
    #[must_use]
    pub fn with_operation(mut self, method: MethodName, operation: Arc<dyn TaskOperation>) -> Self {
        self.operations.insert(method, operation);
        self
    }

    /// Registers a service.
    #[must_use]
    pub fn with_service(mut self, name: ServiceName, service: Arc<dyn TaskService>) -> Self {
        self.services.insert(name, service);
        self
    }
}

impl fmt::Debug for InMemoryOperationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryOperationRegistry")
            .field("operations", &self.operations.keys().collect::<Vec<_>>())
            .field("services", &self.services.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl OperationRegistry for InMemoryOperationRegistry {
    fn operation(&self, method: &MethodName) -> Option<Arc<dyn TaskOperation>> {
        self.operations.get(method).cloned()
    }

    fn service(&self, name: &ServiceName) -> Option<Arc<dyn TaskService>> {
        self.services.get(name).cloned()
    }
}

//! Kernel API handlers the supervisor dispatches to after its checks pass.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use vproc_kernel::{Pid, ResourceHandle};

/// Result of a kernel API call.
///
/// `resources` and `modules` are attributed to the calling process so the
/// termination cascade can find them later.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiOutput {
    pub value: Value,
    pub resources: Vec<ResourceHandle>,
    pub modules: Vec<String>,
}

impl ApiOutput {
    pub fn value(value: Value) -> Self {
        Self {
            value,
            ..Default::default()
        }
    }

    pub fn with_resource(mut self, handle: ResourceHandle) -> Self {
        self.resources.push(handle);
        self
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.modules.push(module.into());
        self
    }
}

impl From<Value> for ApiOutput {
    fn from(value: Value) -> Self {
        ApiOutput::value(value)
    }
}

#[async_trait]
pub trait KernelApi: Send + Sync {
    /// `pid` is only supplied for APIs that act on behalf of the caller.
    async fn invoke(&self, pid: Option<Pid>, args: Vec<Value>) -> anyhow::Result<ApiOutput>;
}

/// Adapter turning an async closure into a [`KernelApi`].
pub struct FnApi<F>(F);

pub fn api_fn<F, Fut>(f: F) -> FnApi<F>
where
    F: Fn(Option<Pid>, Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<ApiOutput>> + Send + 'static,
{
    FnApi(f)
}

#[async_trait]
impl<F, Fut> KernelApi for FnApi<F>
where
    F: Fn(Option<Pid>, Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<ApiOutput>> + Send + 'static,
{
    async fn invoke(&self, pid: Option<Pid>, args: Vec<Value>) -> anyhow::Result<ApiOutput> {
        (self.0)(pid, args).await
    }
}

#[derive(Default, Clone)]
pub struct ApiRegistry {
    handlers: HashMap<String, Arc<dyn KernelApi>>,
}

impl ApiRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn KernelApi>) {
        self.handlers.insert(name.into(), handler);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn KernelApi>> {
        self.handlers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

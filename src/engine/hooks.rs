// ABOUTME: Lifecycle hook trait, caller hook registry and the hook dispatcher
// ABOUTME: Dispatch order is the per-render hook set, then the template chain, then a default

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::trace;

use super::context::{HookSet, LocalContext};
use super::error::BoxError;
use crate::template::{walk, Template, Vars};

pub const TRANS: &str = "trans";
pub const ON_ERROR: &str = "onError";
pub const GET_CACHE: &str = "getCache";
pub const SET_CACHE: &str = "setCache";
pub const PRE_RENDER: &str = "preRender";
pub const POST_RENDER: &str = "postRender";
pub const PRE_CALL: &str = "preCall";
pub const POST_CALL: &str = "postCall";

/// Names the engine provides itself on every hook set
pub const RESERVED: [&str; 3] = ["block", "iterate", "render"];

/// Leading arguments of a hook call
#[derive(Debug, Clone, PartialEq)]
pub enum HookInput {
    Empty,
    Trans {
        item: String,
        category: Option<String>,
    },
    Error(ErrorReport),
    Rendered(String),
}

/// What `onError` is told about a failed block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub block: String,
    pub message: String,
}

/// Trailing arguments every hook receives
#[derive(Clone)]
pub struct HookContext {
    pub lang: String,
    pub block: String,
    /// Template that defined the running block
    pub template: Arc<Template>,
    pub vars: Vars,
    pub local: LocalContext,
    pub hooks: HookSet,
}

impl fmt::Debug for HookContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookContext")
            .field("lang", &self.lang)
            .field("block", &self.block)
            .field("template", &self.template.name())
            .field("index", &self.local.index())
            .finish()
    }
}

/// A lifecycle hook. Returning `Ok(None)` means "not handled".
#[async_trait]
pub trait Hook: Send + Sync {
    async fn call(&self, input: HookInput, cx: HookContext) -> Result<Option<Value>, BoxError>;
}

#[async_trait]
impl<F, Fut> Hook for F
where
    F: Fn(HookInput, HookContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<Value>, BoxError>> + Send + 'static,
{
    async fn call(&self, input: HookInput, cx: HookContext) -> Result<Option<Value>, BoxError> {
        (self)(input, cx).await
    }
}

/// Box an async closure as a shareable hook
pub fn hook_fn<F, Fut>(hook: F) -> Arc<dyn Hook>
where
    F: Fn(HookInput, HookContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<Value>, BoxError>> + Send + 'static,
{
    Arc::new(hook)
}

/// Caller-supplied hooks for one render
#[derive(Clone, Default)]
pub struct Hooks {
    entries: HashMap<String, Arc<dyn Hook>>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F, Fut>(mut self, name: impl Into<String>, hook: F) -> Self
    where
        F: Fn(HookInput, HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<Value>, BoxError>> + Send + 'static,
    {
        self.insert(name, hook_fn(hook));
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, hook: Arc<dyn Hook>) {
        self.entries.insert(name.into(), hook);
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<dyn Hook>> {
        self.entries.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Hook>> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn without_reserved(mut self) -> Self {
        for name in RESERVED {
            if self.entries.remove(name).is_some() {
                trace!(hook = name, "dropping caller hook shadowed by the engine");
            }
        }
        self
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Hooks").field(&self.names()).finish()
    }
}

/// Result used when neither the hook set nor the template chain handles a hook
#[derive(Clone)]
pub enum Fallback {
    Value(Option<Value>),
    Hook(Arc<dyn Hook>),
}

impl Fallback {
    pub fn none() -> Self {
        Fallback::Value(None)
    }
}

/// Resolve and run a named hook.
///
/// The caller's hook set is tried first; if it has no such hook or the hook
/// returns nothing, the nearest template from `chain_start` upward that
/// defines the hook is tried. Ancestors defining the same hook are shadowed.
/// When nobody handles the call the fallback decides the result.
pub async fn dispatch(
    name: &str,
    input: HookInput,
    chain_start: Option<&Arc<Template>>,
    fallback: Fallback,
    cx: &HookContext,
) -> Result<Option<Value>, BoxError> {
    if let Some(hook) = cx.hooks.get(name) {
        trace!(hook = name, block = %cx.block, "calling hook from hook set");
        if let Some(value) = defined(hook.call(input.clone(), cx.clone()).await?) {
            return Ok(Some(value));
        }
    }

    let nearest = walk(chain_start, |template| template.hook(name).map(|hook| (template, hook)));
    if let Some((template, hook)) = nearest {
        trace!(hook = name, block = %cx.block, template = template.name(), "calling template hook");
        if let Some(value) = defined(hook.call(input.clone(), cx.clone()).await?) {
            return Ok(Some(value));
        }
    }

    match fallback {
        Fallback::Value(value) => Ok(value),
        Fallback::Hook(hook) => Ok(defined(hook.call(input, cx.clone()).await?)),
    }
}

fn defined(value: Option<Value>) -> Option<Value> {
    value.filter(|v| !v.is_null())
}

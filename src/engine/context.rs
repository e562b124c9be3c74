// ABOUTME: Per-render hook set and per-invocation local context handed to block code
// ABOUTME: Both expose the continuations that let blocks render further blocks

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use super::error::{BoxError, Result};
use super::executor::{invoke, iterate, start_render, Invocation, RenderOptions, Session};
use super::hooks::{dispatch, Fallback, Hook, HookContext, HookInput, Hooks, TRANS};
use crate::template::{Template, VarSource, Vars};

/// The reusable part of a local context: its own variables and iteration index
#[derive(Debug, Clone, Default)]
pub(crate) struct Scope {
    pub vars: Option<VarSource>,
    pub index: Option<usize>,
}

impl Scope {
    pub(crate) fn item(vars: VarSource, index: usize) -> Self {
        Self {
            vars: Some(vars),
            index: Some(index),
        }
    }
}

pub(crate) fn item_scopes<I>(items: I) -> Vec<Scope>
where
    I: IntoIterator,
    I::Item: Into<VarSource>,
{
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| Scope::item(item.into(), index))
        .collect()
}

/// Options for rendering a block through the hook set
#[derive(Debug, Clone)]
pub struct BlockCall {
    name: String,
    vars: Option<VarSource>,
    template: Option<Arc<Template>>,
    globals: bool,
}

impl BlockCall {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vars: None,
            template: None,
            globals: true,
        }
    }

    /// Local variables for the invoked block
    pub fn with_vars(mut self, vars: impl Into<VarSource>) -> Self {
        self.vars = Some(vars.into());
        self
    }

    /// Resolve from this template instead of the render's entry template
    pub fn from_template(mut self, template: Arc<Template>) -> Self {
        self.template = Some(template);
        self
    }

    /// Do not consult the render's global variables
    pub fn without_globals(mut self) -> Self {
        self.globals = false;
        self
    }
}

/// Engine continuations and caller hooks for one render.
///
/// Built once when a render starts and never mutated afterwards.
#[derive(Clone)]
pub struct HookSet {
    session: Arc<Session>,
}

impl HookSet {
    pub(crate) fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Render a block starting from the render's entry template
    pub fn block(&self, name: &str) -> BoxFuture<'static, Result<String>> {
        self.call(BlockCall::new(name))
    }

    pub fn call(&self, call: BlockCall) -> BoxFuture<'static, Result<String>> {
        let BlockCall {
            name,
            vars,
            template,
            globals,
        } = call;
        let start = template.unwrap_or_else(|| Arc::clone(&self.session.root));
        let globals = if globals {
            self.session.globals.clone()
        } else {
            None
        };

        invoke(
            Arc::clone(&self.session),
            Invocation {
                block: name,
                start: Some(start),
                scope: Scope { vars, index: None },
                globals,
            },
        )
    }

    /// Render a block once per item and join the results in input order
    pub fn iterate<I>(&self, name: &str, items: I, separator: &str) -> BoxFuture<'static, Result<String>>
    where
        I: IntoIterator,
        I::Item: Into<VarSource>,
    {
        iterate(
            Arc::clone(&self.session),
            name.to_string(),
            Arc::clone(&self.session.root),
            item_scopes(items),
            separator.to_string(),
            self.session.globals.clone(),
        )
        .boxed()
    }

    /// Start an independent render with its own budget and hooks
    pub fn render(&self, template: Arc<Template>, options: RenderOptions) -> BoxFuture<'static, Result<String>> {
        start_render(self.session.config.clone(), template, options).boxed()
    }

    pub fn hooks(&self) -> &Hooks {
        &self.session.hooks
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Hook>> {
        self.session.hooks.get(name)
    }

    pub fn lang(&self) -> &str {
        &self.session.lang
    }

    /// Block invocations charged against this render's budget so far
    pub fn calls(&self) -> usize {
        self.session.budget.used()
    }

    pub fn render_id(&self) -> &str {
        &self.session.id
    }
}

impl fmt::Debug for HookSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookSet")
            .field("render_id", &self.session.id)
            .field("hooks", &self.session.hooks)
            .field("calls", &self.calls())
            .finish()
    }
}

pub(crate) struct Frame {
    pub hooks: HookSet,
    pub block: String,
    pub start: Arc<Template>,
    pub defining: Arc<Template>,
    pub globals: Option<VarSource>,
    pub scope: Scope,
    pub vars: Vars,
}

/// Context of one block invocation
#[derive(Clone)]
pub struct LocalContext {
    frame: Arc<Frame>,
}

impl LocalContext {
    pub(crate) fn new(frame: Frame) -> Self {
        Self {
            frame: Arc::new(frame),
        }
    }

    /// Variables attached to this invocation only
    pub fn vars(&self) -> Option<&VarSource> {
        self.frame.scope.vars.as_ref()
    }

    /// Position within an iteration, `None` outside of one
    pub fn index(&self) -> Option<usize> {
        self.frame.scope.index
    }

    pub fn lang(&self) -> &str {
        self.frame.hooks.lang()
    }

    pub fn block_name(&self) -> &str {
        &self.frame.block
    }

    /// Template that defined the running block
    pub fn template(&self) -> &Arc<Template> {
        &self.frame.defining
    }

    /// Render the next definition of this block further up the chain.
    ///
    /// Uses this context's local scope. Past the root it yields an empty string.
    pub fn parent(&self) -> BoxFuture<'static, Result<String>> {
        let frame = &self.frame;
        invoke(
            Arc::clone(&frame.hooks.session),
            Invocation {
                block: frame.block.clone(),
                start: frame.defining.parent().cloned(),
                scope: frame.scope.clone(),
                globals: frame.globals.clone(),
            },
        )
    }

    /// Render another block sharing this context's local scope
    pub fn block(&self, name: &str) -> BoxFuture<'static, Result<String>> {
        let frame = &self.frame;
        invoke(
            Arc::clone(&frame.hooks.session),
            Invocation {
                block: name.to_string(),
                start: Some(Arc::clone(&frame.hooks.session.root)),
                scope: frame.scope.clone(),
                globals: frame.globals.clone(),
            },
        )
    }

    pub fn iterate<I>(&self, name: &str, items: I, separator: &str) -> BoxFuture<'static, Result<String>>
    where
        I: IntoIterator,
        I::Item: Into<VarSource>,
    {
        let frame = &self.frame;
        iterate(
            Arc::clone(&frame.hooks.session),
            name.to_string(),
            Arc::clone(&frame.hooks.session.root),
            item_scopes(items),
            separator.to_string(),
            frame.globals.clone(),
        )
        .boxed()
    }

    /// Translate `item` through the `trans` hook.
    ///
    /// An empty language means no translation; the item is returned as is.
    pub async fn trans(&self, item: &str, category: Option<&str>) -> std::result::Result<String, BoxError> {
        if self.lang().is_empty() {
            return Ok(item.to_string());
        }

        let input = HookInput::Trans {
            item: item.to_string(),
            category: category.map(str::to_string),
        };
        let translated = dispatch(
            TRANS,
            input,
            Some(&self.frame.start),
            Fallback::Value(Some(Value::from(item))),
            &self.hook_context(),
        )
        .await?;

        Ok(match translated {
            Some(Value::String(text)) => text,
            Some(other) => other.to_string(),
            None => item.to_string(),
        })
    }

    pub(crate) fn hook_context(&self) -> HookContext {
        HookContext {
            lang: self.lang().to_string(),
            block: self.frame.block.clone(),
            template: Arc::clone(&self.frame.defining),
            vars: self.frame.vars.clone(),
            local: self.clone(),
            hooks: self.frame.hooks.clone(),
        }
    }

    pub(crate) fn start(&self) -> &Arc<Template> {
        &self.frame.start
    }
}

impl fmt::Debug for LocalContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalContext")
            .field("block", &self.frame.block)
            .field("template", &self.frame.defining.name())
            .field("vars", &self.frame.scope.vars)
            .field("index", &self.frame.scope.index)
            .finish()
    }
}

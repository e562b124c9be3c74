// ABOUTME: Render engine entry point and the per-block execution state machine
// ABOUTME: Charges the call budget, resolves blocks, runs lifecycle hooks and recovers via onError

use futures::future::{try_join_all, BoxFuture, FutureExt};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, debug_span, info_span, trace, warn, Instrument};

use super::budget::CallBudget;
use super::context::{Frame, HookSet, LocalContext, Scope};
use super::error::{find_budget_exceeded, value_kind, BoxError, RenderError, Result};
use super::hooks::{
    dispatch, ErrorReport, Fallback, HookContext, HookInput, Hooks, GET_CACHE, ON_ERROR,
    POST_CALL, POST_RENDER, PRE_CALL, PRE_RENDER, SET_CACHE,
};
use crate::config::EngineConfig;
use crate::template::{resolve_block, Block, Template, VarSource, Vars};

/// Everything shared by the block invocations of one top-level render
pub(crate) struct Session {
    pub id: String,
    pub config: EngineConfig,
    pub budget: CallBudget,
    pub root: Arc<Template>,
    pub globals: Option<VarSource>,
    pub lang: String,
    pub hooks: Hooks,
}

/// One request to render a block
pub(crate) struct Invocation {
    pub block: String,
    /// Template the lookup starts at; `None` once a parent walk passes the root
    pub start: Option<Arc<Template>>,
    pub scope: Scope,
    pub globals: Option<VarSource>,
}

/// Arguments of a render call
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    variables: Option<VarSource>,
    lang: String,
    hooks: Hooks,
    entrypoint: Option<String>,
}

impl RenderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Global variables visible to every block of the render
    pub fn variables(mut self, variables: impl Into<VarSource>) -> Self {
        self.variables = Some(variables.into());
        self
    }

    /// Language tag; empty means no translation
    pub fn lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = lang.into();
        self
    }

    pub fn hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Block to start at; defaults to the engine's configured entrypoint
    pub fn entrypoint(mut self, entrypoint: impl Into<String>) -> Self {
        self.entrypoint = Some(entrypoint.into());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct RenderEngine {
    config: EngineConfig,
}

impl RenderEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Render `template` from its entry block
    pub async fn render(&self, template: Arc<Template>, options: RenderOptions) -> Result<String> {
        start_render(self.config.clone(), template, options).await
    }
}

/// Render with a default-configured engine
pub async fn render(template: Arc<Template>, options: RenderOptions) -> Result<String> {
    RenderEngine::default().render(template, options).await
}

pub(crate) async fn start_render(
    config: EngineConfig,
    template: Arc<Template>,
    options: RenderOptions,
) -> Result<String> {
    let RenderOptions {
        variables,
        lang,
        hooks,
        entrypoint,
    } = options;
    let entrypoint = entrypoint.unwrap_or_else(|| config.entrypoint.clone());

    let session = Arc::new(Session {
        id: uuid::Uuid::new_v4().to_string(),
        budget: CallBudget::new(config.max_calls),
        config,
        root: Arc::clone(&template),
        globals: variables.clone(),
        lang,
        hooks: hooks.without_reserved(),
    });

    let span = info_span!(
        "render",
        render_id = %session.id,
        template = %template.name(),
        entrypoint = %entrypoint
    );

    async move {
        debug!(hooks = ?session.hooks, lang = %session.lang, "render started");

        let result = invoke(
            Arc::clone(&session),
            Invocation {
                block: entrypoint,
                start: Some(template),
                scope: Scope::default(),
                globals: variables,
            },
        )
        .await;

        match &result {
            Ok(output) => debug!(
                calls = session.budget.used(),
                bytes = output.len(),
                "render finished"
            ),
            Err(err) => debug!(calls = session.budget.used(), error = %err, "render failed"),
        }
        result
    }
    .instrument(span)
    .await
}

/// Run the state machine for one block invocation
pub(crate) fn invoke(session: Arc<Session>, call: Invocation) -> BoxFuture<'static, Result<String>> {
    async move {
        let call_number = match session.budget.charge() {
            Ok(n) => n,
            Err(err) => {
                warn!(block = %call.block, limit = session.budget.limit(), "call budget exhausted");
                return Err(err);
            }
        };

        let span = debug_span!("block", block = %call.block, call = call_number);
        run_invocation(session, call).instrument(span).await
    }
    .boxed()
}

async fn run_invocation(session: Arc<Session>, call: Invocation) -> Result<String> {
    let Invocation {
        block: name,
        start,
        scope,
        globals,
    } = call;

    let Some(start) = start else {
        trace!("walked past the root template");
        return Ok(String::new());
    };

    let Some((block, defining)) = resolve_block(&name, &start) else {
        warn!(template = start.name(), "block not found in template chain");
        return Err(RenderError::BlockNotFound { block: name });
    };
    trace!(template = defining.name(), "block resolved");

    let vars = Vars::new(
        scope.vars.clone(),
        globals.clone(),
        Some(Arc::clone(&start)),
        session.lang.clone(),
        name.clone(),
        scope.index,
    );
    let local = LocalContext::new(Frame {
        hooks: HookSet::new(Arc::clone(&session)),
        block: name,
        start,
        defining,
        globals,
        scope,
        vars,
    });
    let cx = local.hook_context();

    match lifecycle(&*block, local.start(), &cx).await {
        Ok(rendered) => Ok(rendered),
        Err(err) => recover(err, local.start(), &cx).await,
    }
}

async fn lifecycle(
    block: &dyn Block,
    start: &Arc<Template>,
    cx: &HookContext,
) -> std::result::Result<String, BoxError> {
    let start = Some(start);

    dispatch(PRE_CALL, HookInput::Empty, start, Fallback::none(), cx).await?;

    let cached = dispatch(GET_CACHE, HookInput::Empty, start, Fallback::none(), cx).await?;
    let rendered = match cached {
        Some(Value::String(hit)) => {
            debug!("cache hit");
            hit
        }
        _ => {
            dispatch(PRE_RENDER, HookInput::Empty, start, Fallback::none(), cx).await?;

            let output = block
                .render(cx.vars.clone(), cx.local.clone(), cx.hooks.clone())
                .await?;
            let rendered = match output {
                Value::String(text) => text,
                other => {
                    return Err(Box::new(RenderError::NonStringResult {
                        kind: value_kind(&other),
                    }))
                }
            };

            dispatch(POST_RENDER, HookInput::Empty, start, Fallback::none(), cx).await?;
            dispatch(
                SET_CACHE,
                HookInput::Rendered(rendered.clone()),
                start,
                Fallback::none(),
                cx,
            )
            .await?;
            rendered
        }
    };

    dispatch(POST_CALL, HookInput::Empty, start, Fallback::none(), cx).await?;
    Ok(rendered)
}

/// Give `onError` a chance to replace a failed block's output
async fn recover(err: BoxError, start: &Arc<Template>, cx: &HookContext) -> Result<String> {
    if let Some(limit) = find_budget_exceeded(err.as_ref()) {
        return Err(RenderError::BudgetExceeded { limit });
    }

    let report = ErrorReport {
        block: cx.block.clone(),
        message: err.to_string(),
    };
    debug!(error = %report.message, "block failed, dispatching onError");

    match dispatch(ON_ERROR, HookInput::Error(report), Some(start), Fallback::none(), cx).await {
        Ok(Some(Value::String(substitute))) => {
            warn!(error = %err, "block failed, onError substituted output");
            Ok(substitute)
        }
        Ok(Some(other)) => Err(RenderError::ErrorHookResult {
            block: cx.block.clone(),
            kind: value_kind(&other),
        }),
        Ok(None) => Err(RenderError::Block {
            block: cx.block.clone(),
            source: err,
        }),
        Err(hook_err) => match find_budget_exceeded(hook_err.as_ref()) {
            Some(limit) => Err(RenderError::BudgetExceeded { limit }),
            None => Err(RenderError::ErrorHook {
                block: cx.block.clone(),
                source: hook_err,
            }),
        },
    }
}

/// Issue one invocation per scope up front, then join in input order
pub(crate) async fn iterate(
    session: Arc<Session>,
    block: String,
    start: Arc<Template>,
    scopes: Vec<Scope>,
    separator: String,
    globals: Option<VarSource>,
) -> Result<String> {
    trace!(block = %block, items = scopes.len(), "iterating block");

    let calls: Vec<_> = scopes
        .into_iter()
        .map(|scope| {
            invoke(
                Arc::clone(&session),
                Invocation {
                    block: block.clone(),
                    start: Some(Arc::clone(&start)),
                    scope,
                    globals: globals.clone(),
                },
            )
        })
        .collect();

    let parts = try_join_all(calls).await?;
    Ok(parts.join(&separator))
}

// ABOUTME: Common utilities and helpers for integration tests
// ABOUTME: Provides template chain fixtures and a recording hook for lifecycle assertions

#![allow(dead_code)]

use serde_json::Value;
use std::sync::{Arc, Mutex};

use blockforge::engine::hook_fn;
use blockforge::engine::hooks::{GET_CACHE, POST_CALL, POST_RENDER, PRE_CALL, PRE_RENDER, SET_CACHE};
use blockforge::{EngineConfig, Hook, HookInput, Hooks, RenderEngine, Template};

/// Build a template whose blocks render fixed text
pub fn layer(name: &str, parent: Option<Arc<Template>>, blocks: &[(&str, &'static str)]) -> Arc<Template> {
    let mut builder = Template::builder(name);
    if let Some(parent) = parent {
        builder = builder.parent(parent);
    }
    for (block, text) in blocks {
        let text = *text;
        builder = builder.block(*block, move |_, _, _| async move { Ok(Value::from(text)) });
    }
    builder.build()
}

pub fn engine(max_calls: usize) -> RenderEngine {
    RenderEngine::new(EngineConfig {
        max_calls,
        ..EngineConfig::default()
    })
}

/// Shared log of hook calls, in call order
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.events()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }

    /// A hook that logs `name:block` and leaves the call unhandled
    pub fn hook(&self, name: &'static str) -> Arc<dyn Hook> {
        let recorder = self.clone();
        hook_fn(move |input, cx| {
            let recorder = recorder.clone();
            async move {
                match input {
                    HookInput::Rendered(text) => {
                        recorder.push(format!("{}:{}:{}", name, cx.block, text))
                    }
                    _ => recorder.push(format!("{}:{}", name, cx.block)),
                }
                Ok(None)
            }
        })
    }

    /// Record every lifecycle hook except `onError`
    pub fn lifecycle(&self) -> Hooks {
        let mut hooks = Hooks::new();
        for name in [PRE_CALL, GET_CACHE, PRE_RENDER, POST_RENDER, SET_CACHE, POST_CALL] {
            hooks.insert(name, self.hook(name));
        }
        hooks
    }
}

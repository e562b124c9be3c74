// ABOUTME: Template data model: block functions, block sources and the parent link
// ABOUTME: Templates are immutable once built and shared between renders through Arc

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use super::vars::{LookupScope, VarSource, Vars};
use crate::engine::context::{HookSet, LocalContext};
use crate::engine::error::BoxError;
use crate::engine::hooks::{hook_fn, Hook, HookContext, HookInput};

/// A renderable block. The value it produces must be a JSON string.
#[async_trait]
pub trait Block: Send + Sync {
    async fn render(
        &self,
        vars: Vars,
        local: LocalContext,
        fnc: HookSet,
    ) -> Result<Value, BoxError>;
}

#[async_trait]
impl<F, Fut> Block for F
where
    F: Fn(Vars, LocalContext, HookSet) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
{
    async fn render(
        &self,
        vars: Vars,
        local: LocalContext,
        fnc: HookSet,
    ) -> Result<Value, BoxError> {
        (self)(vars, local, fnc).await
    }
}

/// Box an async closure as a shareable block
pub fn block_fn<F, Fut>(block: F) -> Arc<dyn Block>
where
    F: Fn(Vars, LocalContext, HookSet) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
{
    Arc::new(block)
}

pub type BlockResolver = Arc<dyn Fn(&str) -> Option<Arc<dyn Block>> + Send + Sync>;

/// Where a template finds its blocks: a fixed table or a lookup function.
#[derive(Clone)]
pub enum BlockSource {
    Map(HashMap<String, Arc<dyn Block>>),
    Resolver(BlockResolver),
}

impl BlockSource {
    pub fn get(&self, name: &str) -> Option<Arc<dyn Block>> {
        match self {
            BlockSource::Map(blocks) => blocks.get(name).cloned(),
            BlockSource::Resolver(resolve) => resolve(name),
        }
    }
}

impl Default for BlockSource {
    fn default() -> Self {
        BlockSource::Map(HashMap::new())
    }
}

impl fmt::Debug for BlockSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockSource::Map(blocks) => {
                let mut names: Vec<&str> = blocks.keys().map(String::as_str).collect();
                names.sort_unstable();
                f.debug_tuple("Map").field(&names).finish()
            }
            BlockSource::Resolver(_) => f.write_str("Resolver"),
        }
    }
}

pub struct Template {
    name: String,
    parent: Option<Arc<Template>>,
    blocks: BlockSource,
    vars: Option<VarSource>,
    fnc: HashMap<String, Arc<dyn Hook>>,
}

impl Template {
    pub fn builder(name: impl Into<String>) -> TemplateBuilder {
        TemplateBuilder::new(name)
    }

    /// Label used in logs and error messages
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Arc<Template>> {
        self.parent.as_ref()
    }

    /// Look up a block defined directly on this template, ignoring ancestors
    pub fn block(&self, name: &str) -> Option<Arc<dyn Block>> {
        self.blocks.get(name)
    }

    pub fn blocks(&self) -> &BlockSource {
        &self.blocks
    }

    pub fn vars(&self) -> Option<&VarSource> {
        self.vars.as_ref()
    }

    pub fn hook(&self, name: &str) -> Option<&Arc<dyn Hook>> {
        self.fnc.get(name)
    }

    /// Number of templates from this one up to the root, inclusive
    pub fn depth(self: &Arc<Self>) -> usize {
        super::chain::chain(Some(self)).count()
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut hooks: Vec<&str> = self.fnc.keys().map(String::as_str).collect();
        hooks.sort_unstable();
        f.debug_struct("Template")
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(|p| p.name()))
            .field("blocks", &self.blocks)
            .field("vars", &self.vars)
            .field("fnc", &hooks)
            .finish()
    }
}

pub struct TemplateBuilder {
    name: String,
    parent: Option<Arc<Template>>,
    blocks: BlockSource,
    vars: Option<VarSource>,
    fnc: HashMap<String, Arc<dyn Hook>>,
}

impl TemplateBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            blocks: BlockSource::default(),
            vars: None,
            fnc: HashMap::new(),
        }
    }

    pub fn parent(mut self, parent: Arc<Template>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Define a block from an async closure.
    ///
    /// Replaces any resolver installed with [`TemplateBuilder::resolve_blocks`].
    pub fn block<F, Fut>(self, name: impl Into<String>, block: F) -> Self
    where
        F: Fn(Vars, LocalContext, HookSet) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
    {
        self.block_impl(name, block_fn(block))
    }

    pub fn block_impl(mut self, name: impl Into<String>, block: Arc<dyn Block>) -> Self {
        match &mut self.blocks {
            BlockSource::Map(blocks) => {
                blocks.insert(name.into(), block);
            }
            BlockSource::Resolver(_) => {
                let mut blocks = HashMap::new();
                blocks.insert(name.into(), block);
                self.blocks = BlockSource::Map(blocks);
            }
        }
        self
    }

    /// Resolve blocks through a function instead of a table
    pub fn resolve_blocks<F>(mut self, resolve: F) -> Self
    where
        F: Fn(&str) -> Option<Arc<dyn Block>> + Send + Sync + 'static,
    {
        self.blocks = BlockSource::Resolver(Arc::new(resolve));
        self
    }

    /// Set a single template-level default variable
    pub fn var(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut map = match self.vars.take() {
            Some(VarSource::Map(map)) => Arc::try_unwrap(map).unwrap_or_else(|map| (*map).clone()),
            _ => Map::new(),
        };
        map.insert(name.into(), value.into());
        self.vars = Some(VarSource::Map(Arc::new(map)));
        self
    }

    pub fn vars(mut self, vars: impl Into<VarSource>) -> Self {
        self.vars = Some(vars.into());
        self
    }

    /// Resolve template-level variables through a function
    pub fn resolve_vars<F>(mut self, resolve: F) -> Self
    where
        F: Fn(&str, &LookupScope<'_>) -> Option<Value> + Send + Sync + 'static,
    {
        self.vars = Some(VarSource::resolver(resolve));
        self
    }

    pub fn hook<F, Fut>(self, name: impl Into<String>, hook: F) -> Self
    where
        F: Fn(HookInput, HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<Value>, BoxError>> + Send + 'static,
    {
        self.hook_impl(name, hook_fn(hook))
    }

    pub fn hook_impl(mut self, name: impl Into<String>, hook: Arc<dyn Hook>) -> Self {
        self.fnc.insert(name.into(), hook);
        self
    }

    pub fn build(self) -> Arc<Template> {
        Arc::new(Template {
            name: self.name,
            parent: self.parent,
            blocks: self.blocks,
            vars: self.vars,
            fnc: self.fnc,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    type Rendered = futures::future::Ready<Result<Value, BoxError>>;

    fn text(body: &'static str) -> impl Fn(Vars, LocalContext, HookSet) -> Rendered + Send + Sync {
        move |_, _, _| futures::future::ready(Ok(Value::from(body)))
    }

    #[test]
    fn test_builder_collects_blocks_vars_and_hooks() {
        let template = Template::builder("page")
            .block("main", text("body"))
            .block("title", text("title"))
            .var("lang", "en")
            .var("count", 3)
            .hook("preCall", |_, _| async { Ok(None) })
            .build();

        assert_eq!(template.name(), "page");
        assert!(template.parent().is_none());
        assert!(template.block("main").is_some());
        assert!(template.block("title").is_some());
        assert!(template.block("footer").is_none());
        assert!(template.hook("preCall").is_some());
        assert!(template.hook("postCall").is_none());

        let scope = LookupScope::new("", "main", None);
        let vars = template.vars().unwrap();
        assert_eq!(vars.lookup("lang", &scope), Some(json!("en")));
        assert_eq!(vars.lookup("count", &scope), Some(json!(3)));
    }

    #[test]
    fn test_block_resolver_source() {
        let template = Template::builder("dynamic")
            .resolve_blocks(|name| {
                if name.starts_with("section_") {
                    let block: Arc<dyn Block> = Arc::new(text("section"));
                    Some(block)
                } else {
                    None
                }
            })
            .build();

        assert!(template.block("section_intro").is_some());
        assert!(template.block("main").is_none());
        assert_eq!(format!("{:?}", template.blocks()), "Resolver");
    }

    #[test]
    fn test_block_after_resolver_switches_to_table() {
        let template = Template::builder("mixed")
            .resolve_blocks(|_| None)
            .block("main", text("main"))
            .build();

        assert!(matches!(template.blocks(), BlockSource::Map(_)));
        assert!(template.block("main").is_some());
    }

    #[test]
    fn test_depth_counts_whole_chain() {
        let root = Template::builder("root").build();
        let middle = Template::builder("middle").parent(Arc::clone(&root)).build();
        let leaf = Template::builder("leaf").parent(Arc::clone(&middle)).build();

        assert_eq!(root.depth(), 1);
        assert_eq!(leaf.depth(), 3);
        assert!(format!("{:?}", leaf).contains("parent: Some(\"middle\")"));
    }
}

// ABOUTME: Variable sources and the layered lookup handed to every block invocation
// ABOUTME: Resolves local scope first, then globals, then the template chain's defaults

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::chain::walk;
use super::model::Template;

pub type VarResolver = Arc<dyn Fn(&str, &LookupScope<'_>) -> Option<Value> + Send + Sync>;

/// Context a variable resolver is called with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupScope<'a> {
    pub lang: &'a str,
    pub block: &'a str,
    pub index: Option<usize>,
}

impl<'a> LookupScope<'a> {
    pub fn new(lang: &'a str, block: &'a str, index: Option<usize>) -> Self {
        Self { lang, block, index }
    }
}

/// A single layer of variables: a fixed table or a lookup function.
///
/// `Null` is never returned from a lookup; it reads as "not defined" so the
/// next layer gets a chance to answer.
#[derive(Clone)]
pub enum VarSource {
    Map(Arc<Map<String, Value>>),
    Resolver(VarResolver),
}

impl VarSource {
    pub fn empty() -> Self {
        VarSource::Map(Arc::new(Map::new()))
    }

    pub fn resolver<F>(resolve: F) -> Self
    where
        F: Fn(&str, &LookupScope<'_>) -> Option<Value> + Send + Sync + 'static,
    {
        VarSource::Resolver(Arc::new(resolve))
    }

    pub fn lookup(&self, name: &str, scope: &LookupScope<'_>) -> Option<Value> {
        let value = match self {
            VarSource::Map(map) => map.get(name).cloned(),
            VarSource::Resolver(resolve) => resolve(name, scope),
        };
        value.filter(|v| !v.is_null())
    }
}

impl Default for VarSource {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Map<String, Value>> for VarSource {
    fn from(map: Map<String, Value>) -> Self {
        VarSource::Map(Arc::new(map))
    }
}

impl From<HashMap<String, Value>> for VarSource {
    fn from(map: HashMap<String, Value>) -> Self {
        VarSource::Map(Arc::new(map.into_iter().collect()))
    }
}

/// Objects become tables; any other value has no named members, so every lookup misses.
impl From<Value> for VarSource {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => VarSource::from(map),
            _ => VarSource::empty(),
        }
    }
}

impl fmt::Debug for VarSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarSource::Map(map) => f.debug_tuple("Map").field(map).finish(),
            VarSource::Resolver(_) => f.write_str("Resolver"),
        }
    }
}

/// Variable lookup for one block invocation.
///
/// Order: local scope, global scope, then the `vars` of the template the
/// request started at, its parent, and so on up to the root. The first
/// defined value wins.
#[derive(Clone)]
pub struct Vars {
    local: Option<VarSource>,
    global: Option<VarSource>,
    template: Option<Arc<Template>>,
    lang: String,
    block: String,
    index: Option<usize>,
}

impl Vars {
    pub(crate) fn new(
        local: Option<VarSource>,
        global: Option<VarSource>,
        template: Option<Arc<Template>>,
        lang: String,
        block: String,
        index: Option<usize>,
    ) -> Self {
        Self {
            local,
            global,
            template,
            lang,
            block,
            index,
        }
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        let scope = LookupScope::new(&self.lang, &self.block, self.index);

        self.local
            .iter()
            .chain(self.global.iter())
            .find_map(|source| source.lookup(name, &scope))
            .or_else(|| {
                walk(self.template.as_ref(), |template| {
                    template.vars().and_then(|source| source.lookup(name, &scope))
                })
            })
    }

    /// Look up a variable as text; non-string values are rendered as JSON
    pub fn get_str(&self, name: &str) -> Option<String> {
        match self.get(name)? {
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

impl fmt::Debug for Vars {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vars")
            .field("local", &self.local)
            .field("global", &self.global)
            .field("template", &self.template.as_ref().map(|t| t.name()))
            .field("block", &self.block)
            .field("index", &self.index)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source(value: Value) -> Option<VarSource> {
        Some(VarSource::from(value))
    }

    fn chain() -> Arc<Template> {
        let root = Template::builder("root")
            .var("title", "root title")
            .var("footer", "root footer")
            .build();
        Template::builder("child")
            .parent(root)
            .var("title", "child title")
            .build()
    }

    fn vars(local: Option<VarSource>, global: Option<VarSource>) -> Vars {
        Vars::new(
            local,
            global,
            Some(chain()),
            "en".to_string(),
            "main".to_string(),
            None,
        )
    }

    #[test]
    fn test_local_scope_shadows_everything() {
        let lookup = vars(
            source(json!({"title": "local"})),
            source(json!({"title": "global"})),
        );
        assert_eq!(lookup.get("title"), Some(json!("local")));
    }

    #[test]
    fn test_falls_through_in_fixed_order() {
        let lookup = vars(None, source(json!({"title": "global"})));
        assert_eq!(lookup.get("title"), Some(json!("global")));

        let lookup = vars(None, None);
        assert_eq!(lookup.get("title"), Some(json!("child title")));
        assert_eq!(lookup.get("footer"), Some(json!("root footer")));
        assert_eq!(lookup.get("missing"), None);
    }

    #[test]
    fn test_null_reads_as_undefined() {
        let lookup = vars(source(json!({"title": null})), None);
        assert_eq!(lookup.get("title"), Some(json!("child title")));
    }

    #[test]
    fn test_resolver_receives_scope() {
        let resolver = VarSource::resolver(|name, scope| {
            (name == "where").then(|| json!(format!("{}:{}:{:?}", scope.lang, scope.block, scope.index)))
        });
        let lookup = Vars::new(
            Some(resolver),
            None,
            None,
            "de".to_string(),
            "row".to_string(),
            Some(2),
        );

        assert_eq!(lookup.get_str("where"), Some("de:row:Some(2)".to_string()));
        assert!(!lookup.contains("other"));
    }

    #[test]
    fn test_non_object_values_become_empty_sources() {
        let scope = LookupScope::new("", "main", None);
        let source = VarSource::from(json!([1, 2, 3]));
        assert_eq!(source.lookup("0", &scope), None);

        let lookup = vars(source.into(), None);
        assert_eq!(lookup.get_str("title"), Some("child title".to_string()));
    }

    #[test]
    fn test_get_str_renders_json() {
        let lookup = vars(source(json!({"count": 3, "flag": true})), None);
        assert_eq!(lookup.get_str("count"), Some("3".to_string()));
        assert_eq!(lookup.get_str("flag"), Some("true".to_string()));
    }
}

// ABOUTME: Main library module for the blockforge template inheritance engine
// ABOUTME: Exports the template model, the render engine and ambient configuration

pub mod config;
pub mod engine;
pub mod logging;
pub mod template;

// Re-export commonly used types
pub use config::{Config, EngineConfig, LoggingConfig};
pub use engine::{
    render, BlockCall, BoxError, ErrorReport, Hook, HookContext, HookInput, HookSet, Hooks,
    LocalContext, RenderEngine, RenderError, RenderOptions,
};
pub use template::{block_fn, Block, LookupScope, Template, TemplateBuilder, VarSource, Vars};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

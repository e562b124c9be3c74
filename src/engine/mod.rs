// ABOUTME: Render engine module for the blockforge rendering engine
// ABOUTME: Handles block invocation, lifecycle hooks, call budgets and local contexts

pub mod budget;
pub mod context;
pub mod error;
pub mod executor;
pub mod hooks;

pub use budget::CallBudget;
pub use context::{BlockCall, HookSet, LocalContext};
pub use error::{BoxError, RenderError, Result};
pub use executor::{render, RenderEngine, RenderOptions};
pub use hooks::{dispatch, hook_fn, ErrorReport, Fallback, Hook, HookContext, HookInput, Hooks};

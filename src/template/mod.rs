// ABOUTME: Template model module for the blockforge rendering engine
// ABOUTME: Provides templates, chain traversal, block resolution and variable lookup

pub mod chain;
pub mod model;
pub mod vars;

pub use chain::{chain, resolve_block, walk, Chain};
pub use model::{block_fn, Block, BlockResolver, BlockSource, Template, TemplateBuilder};
pub use vars::{LookupScope, VarResolver, VarSource, Vars};

// ABOUTME: Ancestor-chain traversal over templates and first-match block resolution
// ABOUTME: Walks from a starting template toward the root, stopping at the first hit

use std::sync::Arc;

use super::model::{Block, Template};

/// Iterator over a template and its ancestors, nearest first
#[derive(Clone)]
pub struct Chain<'a> {
    next: Option<&'a Arc<Template>>,
}

impl<'a> Iterator for Chain<'a> {
    type Item = &'a Arc<Template>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.parent();
        Some(current)
    }
}

pub fn chain(start: Option<&Arc<Template>>) -> Chain<'_> {
    Chain { next: start }
}

/// Apply `visit` to each template from `start` upward and return the first
/// result that is not `None`.
pub fn walk<'a, R, F>(start: Option<&'a Arc<Template>>, visit: F) -> Option<R>
where
    F: FnMut(&'a Arc<Template>) -> Option<R>,
{
    chain(start).find_map(visit)
}

/// Find the nearest template at or above `start` that defines `name`.
///
/// Returns the block together with the template that defined it; a parent
/// lookup resumes from that template's parent. Same-named blocks further up
/// the chain are never consulted once a match is found.
pub fn resolve_block(name: &str, start: &Arc<Template>) -> Option<(Arc<dyn Block>, Arc<Template>)> {
    walk(Some(start), |template| {
        template
            .block(name)
            .map(|block| (block, Arc::clone(template)))
    })
}

//! Dependency ordering over `DependsOn`.
//!
//! Depth-first topological sort. Roots are visited in first-appearance
//! order, so resources with no dependency relation keep their template
//! order. Cycles are rejected with a validation error.

use std::collections::HashMap;

use crate::error::{StackError, StackResult};
use crate::template::Template;

/// Compute the creation order of a template's resources.
///
/// # Errors
///
/// Returns a validation [`StackError`] when the dependency graph contains a
/// cycle.
pub fn creation_order(template: &Template) -> StackResult<Vec<String>> {
    let mut order = Vec::with_capacity(template.resources.len());
    let mut visited: HashMap<&str, bool> = HashMap::new();
    let mut in_progress: HashMap<&str, bool> = HashMap::new();

    for resource in &template.resources {
        if !visited.get(resource.logical_id.as_str()).copied().unwrap_or(false) {
            visit(
                template,
                &resource.logical_id,
                &mut visited,
                &mut in_progress,
                &mut order,
            )?;
        }
    }

    Ok(order)
}

fn visit<'a>(
    template: &'a Template,
    logical_id: &'a str,
    visited: &mut HashMap<&'a str, bool>,
    in_progress: &mut HashMap<&'a str, bool>,
    order: &mut Vec<String>,
) -> StackResult<()> {
    if in_progress.get(logical_id).copied().unwrap_or(false) {
        return Err(StackError::validation(format!(
            "Circular dependency detected involving resource {logical_id}"
        )));
    }
    if visited.get(logical_id).copied().unwrap_or(false) {
        return Ok(());
    }

    in_progress.insert(logical_id, true);

    if let Some(resource) = template.resource(logical_id) {
        for dep in &resource.depends_on {
            visit(template, dep, visited, in_progress, order)?;
        }
    }

    in_progress.insert(logical_id, false);
    visited.insert(logical_id, true);
    order.push(logical_id.to_owned());

    Ok(())
}

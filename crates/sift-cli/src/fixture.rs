use std::fs;

use sift_picker::{DomTree, FixtureNode, NodeRef};

/// Load a DOM fixture and run `f` on its target element.
pub fn with_target<R>(path: &str, f: impl FnOnce(NodeRef<'_>) -> R) -> Result<R, String> {
    let content = fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))?;
    let fixture: FixtureNode =
        serde_json::from_str(&content).map_err(|e| format!("Invalid fixture '{}': {}", path, e))?;

    let (tree, target) = DomTree::from_fixture(&fixture);
    let element = target
        .and_then(|id| tree.element(id))
        .ok_or_else(|| format!("Fixture '{}' has no element marked \"target\": true", path))?;

    Ok(f(element))
}

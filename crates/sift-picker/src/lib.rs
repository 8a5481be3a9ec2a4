//! Sift Element Picker
//!
//! Turns a DOM element chosen by the user into a filter rule.
//!
//! # Modules
//!
//! - `dom`: read-only element capability plus an in-memory tree
//! - `selector`: structural and similar-element CSS selectors
//! - `rule`: cosmetic and URL-blocking rule text
//! - `info`: element summary shown by the picker UI

pub mod dom;
pub mod info;
pub mod rule;
pub mod selector;

pub use dom::{DomTree, ElementNode, FixtureNode, NodeId, NodeRef};
pub use info::{get_element_info, url_block_attribute, ElementAttribute, ElementInfo};
pub use rule::{construct_rule_text, construct_url_block_rule_text, RuleOptions};
pub use selector::{
    build_ancestor_path, construct_css_selector, make_css_path, similar_element_selector, PathSegment,
    SiblingPosition,
};

//! CSS selector synthesis
//!
//! Two flavours of selector are built for a picked element:
//!
//! - a structural path from the nearest ancestor with an `id` (or from just
//!   below `BODY`) down to the element, e.g. `#page > DIV.ad:nth-child(3)`
//! - a "similar elements" selector from the element's classes, e.g. `.ad, .banner`

use std::fmt;

use crate::dom::ElementNode;

// =============================================================================
// Path Segments
// =============================================================================

/// Position of an element among its element siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiblingPosition {
    /// Single child, no pseudo-class needed
    Only,
    First,
    Last,
    /// 1-based position strictly between first and last
    Nth(usize),
}

impl SiblingPosition {
    /// `position` is 1-based, `total` is the number of element children of
    /// the parent.
    pub fn new(position: usize, total: usize) -> Self {
        if total <= 1 {
            Self::Only
        } else if position == 1 {
            Self::First
        } else if position == total {
            Self::Last
        } else {
            Self::Nth(position)
        }
    }
}

impl fmt::Display for SiblingPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Only => Ok(()),
            Self::First => f.write_str(":first-child"),
            Self::Last => f.write_str(":last-child"),
            Self::Nth(n) => write!(f, ":nth-child({})", n),
        }
    }
}

/// One step of a structural selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Element identified by its `id`; always the first segment of a path
    Id(String),
    Element {
        tag: String,
        class_fragment: String,
        position: SiblingPosition,
    },
}

impl PathSegment {
    pub fn id(id: &str) -> Self {
        Self::Id(id.to_string())
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => {
                let escaped = escape_colons(id);
                if id.contains('.') {
                    write!(f, "[id=\"{}\"]", escaped)
                } else {
                    write!(f, "#{}", escaped)
                }
            }
            Self::Element {
                tag,
                class_fragment,
                position,
            } => write!(f, "{}{}{}", tag, class_fragment, position),
        }
    }
}

fn escape_colons(value: &str) -> String {
    value.replace(':', "\\:")
}

/// Selector fragment for a `class` attribute value.
///
/// Values containing a `.` are matched as a whole attribute since a dot
/// would split the class name. Otherwise each class becomes a `.class`.
pub fn class_fragment(class_name: &str) -> String {
    if class_name.contains('.') {
        return format!("[class=\"{}\"]", class_name);
    }

    let mut fragment = String::new();
    for class in class_name.split_whitespace() {
        fragment.push('.');
        fragment.push_str(class);
    }
    fragment
}

// =============================================================================
// Structural Path
// =============================================================================

fn is_body<E: ElementNode>(element: &E) -> bool {
    element.tag_name().eq_ignore_ascii_case("BODY")
}

/// Walk from `element` towards the root and collect selector segments in
/// root-to-target order.
///
/// The walk stops at the first element with an `id` (included) or at `BODY`
/// (excluded). Elements without a parent are never emitted.
pub fn build_ancestor_path<E: ElementNode>(element: &E) -> Vec<PathSegment> {
    let mut path = Vec::new();
    let mut current = element.clone();

    while let Some(parent) = current.parent() {
        if is_body(&current) {
            break;
        }

        let id = current.id();
        if !id.is_empty() {
            path.push(PathSegment::id(&id));
            break;
        }

        let position = SiblingPosition::new(current.preceding_element_siblings() + 1, parent.child_element_count());
        path.push(PathSegment::Element {
            tag: current.tag_name(),
            class_fragment: class_fragment(&current.class_name()),
            position,
        });

        current = parent;
    }

    path.reverse();
    path
}

/// Structural selector joined with the child combinator.
pub fn make_css_path<E: ElementNode>(element: &E) -> String {
    build_ancestor_path(element)
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" > ")
}

// =============================================================================
// Similar Elements
// =============================================================================

/// Selector list matching any element sharing one of the classes,
/// e.g. `.ad, .banner`. Empty when the element has no classes.
pub fn similar_element_selector<E: ElementNode>(element: &E) -> String {
    element
        .class_list()
        .iter()
        .map(|class| format!(".{}", class))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Selector used in similar-element rule text: the class list with its
/// first two classes compounded, e.g. `.ad.banner, .top`.
pub fn similar_rule_selector<E: ElementNode>(element: &E) -> String {
    similar_element_selector(element).replacen(", .", ".", 1)
}

/// Selector shown in the picker UI.
///
/// With `is_block_similar` the class-based selector is preferred; elements
/// without classes fall back to the structural path.
pub fn construct_css_selector<E: ElementNode>(element: &E, is_block_similar: bool) -> String {
    if is_block_similar {
        let selector = similar_element_selector(element);
        if !selector.is_empty() {
            return selector;
        }
    }
    make_css_path(element)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{DomTree, NodeId};

    fn page() -> (DomTree, NodeId) {
        let mut tree = DomTree::new();
        let html = tree.append_element(None, "html", &[]);
        let body = tree.append_element(Some(html), "body", &[]);
        (tree, body)
    }

    #[test]
    fn test_sibling_position() {
        assert_eq!(SiblingPosition::new(1, 0), SiblingPosition::Only);
        assert_eq!(SiblingPosition::new(1, 1), SiblingPosition::Only);
        assert_eq!(SiblingPosition::new(1, 2), SiblingPosition::First);
        assert_eq!(SiblingPosition::new(2, 2), SiblingPosition::Last);
        assert_eq!(SiblingPosition::new(2, 3), SiblingPosition::Nth(2));
        assert_eq!(SiblingPosition::Nth(4).to_string(), ":nth-child(4)");
        assert_eq!(SiblingPosition::Only.to_string(), "");
    }

    #[test]
    fn test_class_fragment() {
        assert_eq!(class_fragment(""), "");
        assert_eq!(class_fragment("ad"), ".ad");
        assert_eq!(class_fragment("  ad   banner\ttop "), ".ad.banner.top");
        assert_eq!(class_fragment("ad.banner"), "[class=\"ad.banner\"]");
        assert_eq!(class_fragment(".lead"), "[class=\".lead\"]");
        assert_eq!(class_fragment("   "), "");
        assert_eq!(class_fragment("ad\nbanner"), ".ad.banner");
    }

    #[test]
    fn test_dotted_class_under_body() {
        let (mut tree, body) = page();
        let div = tree.append_element(Some(body), "div", &[("class", "ad.banner")]);

        let div = tree.element(div).unwrap();
        assert_eq!(make_css_path(&div), "DIV[class=\"ad.banner\"]");
    }

    #[test]
    fn test_id_roots_the_path() {
        let (mut tree, body) = page();
        let outer = tree.append_element(Some(body), "div", &[("id", "wrapper")]);
        let section = tree.append_element(Some(outer), "section", &[("id", "content")]);
        let span = tree.append_element(Some(section), "span", &[]);

        let span = tree.element(span).unwrap();
        let path = build_ancestor_path(&span);
        assert_eq!(path.len(), 2);
        assert_eq!(path[0], PathSegment::id("content"));
        assert_eq!(make_css_path(&span), "#content > SPAN");
    }

    #[test]
    fn test_target_with_id() {
        let (mut tree, body) = page();
        let div = tree.append_element(Some(body), "div", &[("id", "ad:slot")]);
        let dotted = tree.append_element(Some(body), "div", &[("id", "ad.slot:2")]);

        assert_eq!(make_css_path(&tree.element(div).unwrap()), "#ad\\:slot");
        assert_eq!(make_css_path(&tree.element(dotted).unwrap()), "[id=\"ad.slot\\:2\"]");
    }

    #[test]
    fn test_nth_child_positions() {
        let (mut tree, body) = page();
        let list = tree.append_element(Some(body), "ul", &[("class", "menu")]);
        let mut items = Vec::new();
        for _ in 0..4 {
            tree.append_text(list);
            items.push(tree.append_element(Some(list), "li", &[]));
        }

        let paths: Vec<String> = items
            .iter()
            .map(|&id| make_css_path(&tree.element(id).unwrap()))
            .collect();
        assert_eq!(
            paths,
            vec![
                "UL.menu > LI:first-child",
                "UL.menu > LI:nth-child(2)",
                "UL.menu > LI:nth-child(3)",
                "UL.menu > LI:last-child",
            ]
        );
    }

    #[test]
    fn test_deep_path_without_ids() {
        let (mut tree, body) = page();
        tree.append_element(Some(body), "header", &[]);
        let main = tree.append_element(Some(body), "main", &[]);
        let article = tree.append_element(Some(main), "article", &[("class", "post featured")]);
        let img = tree.append_element(Some(article), "img", &[]);
        tree.append_element(Some(article), "p", &[]);

        let img = tree.element(img).unwrap();
        assert_eq!(make_css_path(&img), "MAIN:last-child > ARTICLE.post.featured > IMG:first-child");
    }

    #[test]
    fn test_body_and_detached_elements() {
        let (mut tree, body) = page();
        assert_eq!(make_css_path(&tree.element(body).unwrap()), "");

        let detached = tree.append_element(None, "div", &[("class", "ad")]);
        assert_eq!(make_css_path(&tree.element(detached).unwrap()), "");
    }

    #[test]
    fn test_similar_selectors() {
        let (mut tree, body) = page();
        let div = tree.append_element(Some(body), "div", &[("class", " ad  banner top")]);
        let plain = tree.append_element(Some(body), "div", &[]);

        let div = tree.element(div).unwrap();
        assert_eq!(similar_element_selector(&div), ".ad, .banner, .top");
        assert_eq!(similar_rule_selector(&div), ".ad.banner, .top");
        assert_eq!(construct_css_selector(&div, true), ".ad, .banner, .top");
        assert_eq!(construct_css_selector(&div, false), "DIV.ad.banner.top:first-child");

        let plain = tree.element(plain).unwrap();
        assert_eq!(similar_element_selector(&plain), "");
        assert_eq!(construct_css_selector(&plain, true), "DIV:last-child");
    }
}

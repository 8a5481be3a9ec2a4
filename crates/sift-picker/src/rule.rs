//! Rule text construction
//!
//! Produces either a URL-blocking network rule (`||host/path$domain=site`) or
//! an element hiding rule (`site##selector`) for the picked element.

use serde::{Deserialize, Serialize};
use sift_core::url::crop_domain;
use ts_rs::TS;

use crate::dom::ElementNode;
use crate::selector::{make_css_path, similar_rule_selector};

/// Picker options chosen by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RuleOptions {
    /// Block the resource URL instead of hiding the element
    #[serde(default)]
    pub is_block_by_url: bool,
    /// URL to block, usually the element's `src`
    #[serde(default)]
    pub url_mask: Option<String>,
    /// Hide every element sharing the element's classes
    #[serde(default)]
    pub is_block_similar: bool,
    /// Apply the rule on every site instead of the current one
    #[serde(default)]
    pub is_block_one_domain: bool,
    /// URL of the page the element lives on
    pub url: String,
    /// Extra selector text appended to element hiding rules
    #[serde(default)]
    pub attributes: Option<String>,
}

/// Network rule for `url_mask`, or `None` when there is nothing to block.
///
/// A leading `http://` or `http://www.` becomes the `||` host anchor. Unless
/// `one_domain` is set, the rule is restricted to `domain`.
pub fn construct_url_block_rule_text(url_mask: &str, one_domain: bool, domain: &str) -> Option<String> {
    if url_mask.is_empty() {
        return None;
    }

    let mut text = match url_mask
        .strip_prefix("http://www.")
        .or_else(|| url_mask.strip_prefix("http://"))
    {
        Some(rest) => format!("||{}", rest),
        None => url_mask.to_string(),
    };

    if text.starts_with('.') {
        text.remove(0);
    }

    if !one_domain {
        text.push_str("$domain=");
        text.push_str(domain);
    }

    Some(text)
}

/// Rule text for `element` under `options`.
///
/// URL blocking wins when requested and a URL is available. An element
/// without a usable selector yields an empty string.
pub fn construct_rule_text<E: ElementNode>(element: &E, options: &RuleOptions) -> String {
    let domain = crop_domain(&options.url);

    if options.is_block_by_url {
        let url_rule = options
            .url_mask
            .as_deref()
            .and_then(|mask| construct_url_block_rule_text(mask, options.is_block_one_domain, domain));
        if let Some(rule) = url_rule {
            return rule;
        }
    }

    let selector = if options.is_block_similar {
        similar_rule_selector(element)
    } else {
        make_css_path(element)
    };

    if selector.is_empty() {
        log::debug!("no selector for <{}>", element.tag_name());
        return String::new();
    }

    let mut rule = String::new();
    if !options.is_block_one_domain {
        rule.push_str(domain);
    }
    rule.push_str("##");
    rule.push_str(&selector);

    if !options.is_block_by_url {
        if let Some(extra) = &options.attributes {
            rule.push_str(extra);
        }
    }

    rule
}

//! Element summary for the picker UI

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::dom::ElementNode;

/// Attributes that may carry a blockable resource URL, in priority order.
pub const URL_BLOCK_ATTRIBUTES: [&str; 2] = ["src", "data"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ElementAttribute {
    pub name: String,
    pub value: String,
}

/// What the picker shows about the selected element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ElementInfo {
    pub tag_name: String,
    pub classes: Vec<String>,
    pub attributes: Vec<ElementAttribute>,
    pub url_block_attribute_value: Option<String>,
    pub have_url_block_parameter: bool,
    pub have_class_attribute: bool,
}

/// First non-empty URL-carrying attribute of the element.
pub fn url_block_attribute<E: ElementNode>(element: &E) -> Option<String> {
    URL_BLOCK_ATTRIBUTES
        .iter()
        .filter_map(|name| element.attribute(name))
        .find(|value| !value.is_empty())
}

pub fn get_element_info<E: ElementNode>(element: &E) -> ElementInfo {
    let url_block_attribute_value = url_block_attribute(element);
    let classes = element.class_list();

    ElementInfo {
        tag_name: element.tag_name(),
        have_url_block_parameter: url_block_attribute_value.is_some(),
        have_class_attribute: !classes.is_empty(),
        attributes: element
            .attributes()
            .into_iter()
            .map(|(name, value)| ElementAttribute { name, value })
            .collect(),
        url_block_attribute_value,
        classes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::DomTree;

    #[test]
    fn test_image_info() {
        let mut tree = DomTree::new();
        let body = tree.append_element(None, "body", &[]);
        let img = tree.append_element(
            Some(body),
            "img",
            &[("class", "ad  wide"), ("src", "https://ads.example/x.png"), ("alt", "")],
        );

        let info = get_element_info(&tree.element(img).unwrap());
        assert_eq!(info.tag_name, "IMG");
        assert_eq!(info.classes, vec!["ad", "wide"]);
        assert_eq!(info.attributes.len(), 3);
        assert_eq!(info.attributes[1].name, "src");
        assert_eq!(info.url_block_attribute_value.as_deref(), Some("https://ads.example/x.png"));
        assert!(info.have_url_block_parameter);
        assert!(info.have_class_attribute);
    }

    #[test]
    fn test_object_data_and_empty_src() {
        let mut tree = DomTree::new();
        let body = tree.append_element(None, "body", &[]);
        let object = tree.append_element(Some(body), "object", &[("src", ""), ("data", "/flash/ad.swf")]);
        let div = tree.append_element(Some(body), "div", &[("class", "   ")]);

        let object = tree.element(object).unwrap();
        assert_eq!(url_block_attribute(&object).as_deref(), Some("/flash/ad.swf"));

        let info = get_element_info(&tree.element(div).unwrap());
        assert_eq!(info.url_block_attribute_value, None);
        assert!(!info.have_url_block_parameter);
        assert!(!info.have_class_attribute);
    }

    #[test]
    fn test_info_json_shape() {
        let mut tree = DomTree::new();
        let span = tree.append_element(None, "span", &[("id", "x")]);
        let json = serde_json::to_value(get_element_info(&tree.element(span).unwrap())).unwrap();

        assert_eq!(json["tagName"], "SPAN");
        assert_eq!(json["haveClassAttribute"], false);
        assert_eq!(json["attributes"][0]["name"], "id");
        assert!(json["urlBlockAttributeValue"].is_null());
    }
}

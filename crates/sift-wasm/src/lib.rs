//! WebAssembly bindings for the Sift element picker

use wasm_bindgen::prelude::*;
use web_sys::Element;

use sift_core::hits::{encode_css_rule_hit_url, parse_css_rule_from_url};
use sift_picker::{ElementInfo, ElementNode, RuleOptions};

/// Live DOM element seen through [`ElementNode`].
#[derive(Clone)]
struct PickedElement(Element);

impl ElementNode for PickedElement {
    fn tag_name(&self) -> String {
        self.0.tag_name()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.0.get_attribute(name)
    }

    fn attributes(&self) -> Vec<(String, String)> {
        let map = self.0.attributes();
        (0..map.length())
            .filter_map(|idx| map.item(idx))
            .map(|attr| (attr.name(), attr.value()))
            .collect()
    }

    fn parent(&self) -> Option<Self> {
        self.0.parent_element().map(PickedElement)
    }

    fn preceding_element_siblings(&self) -> usize {
        let mut count = 0;
        let mut sibling = self.0.previous_element_sibling();
        while let Some(el) = sibling {
            count += 1;
            sibling = el.previous_element_sibling();
        }
        count
    }

    fn child_element_count(&self) -> usize {
        self.0.child_element_count() as usize
    }
}

fn get_bool(options: &JsValue, key: &str) -> bool {
    js_sys::Reflect::get(options, &key.into())
        .ok()
        .and_then(|value| value.as_bool())
        .unwrap_or(false)
}

fn get_string(options: &JsValue, key: &str) -> Option<String> {
    js_sys::Reflect::get(options, &key.into())
        .ok()
        .and_then(|value| value.as_string())
}

fn parse_options(options: &JsValue) -> Result<RuleOptions, JsValue> {
    if !options.is_object() {
        return Err(JsValue::from_str("Options must be an object"));
    }

    Ok(RuleOptions {
        is_block_by_url: get_bool(options, "isBlockByUrl"),
        url_mask: get_string(options, "urlMask"),
        is_block_similar: get_bool(options, "isBlockSimilar"),
        is_block_one_domain: get_bool(options, "isBlockOneDomain"),
        url: get_string(options, "url").unwrap_or_default(),
        attributes: get_string(options, "attributes"),
    })
}

#[wasm_bindgen]
pub fn construct_rule_text(element: &Element, options: JsValue) -> Result<String, JsValue> {
    let options = parse_options(&options)?;
    Ok(sift_picker::construct_rule_text(&PickedElement(element.clone()), &options))
}

#[wasm_bindgen]
pub fn construct_css_selector(element: &Element, is_block_similar: bool) -> String {
    sift_picker::construct_css_selector(&PickedElement(element.clone()), is_block_similar)
}

fn info_to_js(info: &ElementInfo) -> JsValue {
    let result = js_sys::Object::new();

    let _ = js_sys::Reflect::set(&result, &"tagName".into(), &JsValue::from_str(&info.tag_name));

    let classes = js_sys::Array::new();
    for class in &info.classes {
        classes.push(&JsValue::from_str(class));
    }
    let _ = js_sys::Reflect::set(&result, &"classes".into(), &classes);

    let attributes = js_sys::Array::new();
    for attr in &info.attributes {
        let entry = js_sys::Object::new();
        let _ = js_sys::Reflect::set(&entry, &"name".into(), &JsValue::from_str(&attr.name));
        let _ = js_sys::Reflect::set(&entry, &"value".into(), &JsValue::from_str(&attr.value));
        attributes.push(&entry);
    }
    let _ = js_sys::Reflect::set(&result, &"attributes".into(), &attributes);

    let url_value = info
        .url_block_attribute_value
        .as_deref()
        .map(JsValue::from_str)
        .unwrap_or(JsValue::NULL);
    let _ = js_sys::Reflect::set(&result, &"urlBlockAttributeValue".into(), &url_value);
    let _ = js_sys::Reflect::set(
        &result,
        &"haveUrlBlockParameter".into(),
        &JsValue::from(info.have_url_block_parameter),
    );
    let _ = js_sys::Reflect::set(&result, &"haveClassAttribute".into(), &JsValue::from(info.have_class_attribute));

    result.into()
}

#[wasm_bindgen]
pub fn get_element_info(element: &Element) -> JsValue {
    info_to_js(&sift_picker::get_element_info(&PickedElement(element.clone())))
}

/// Decode a cosmetic rule hit URL into `{ filterId, ruleText }`, or `null`.
#[wasm_bindgen]
pub fn parse_css_rule_hit(url: &str) -> JsValue {
    let Some(hit) = parse_css_rule_from_url(url) else {
        return JsValue::NULL;
    };

    let result = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&result, &"filterId".into(), &JsValue::from_str(&hit.filter_id));
    let _ = js_sys::Reflect::set(&result, &"ruleText".into(), &JsValue::from_str(&hit.rule_text));
    result.into()
}

#[wasm_bindgen]
pub fn css_rule_hit_url(base_url: &str, filter_id: &str, rule_text: &str) -> String {
    encode_css_rule_hit_url(base_url, filter_id, rule_text)
}

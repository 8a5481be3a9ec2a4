#![cfg(target_arch = "wasm32")]

use wasm_bindgen::JsValue;
use wasm_bindgen_test::*;
use web_sys::Element;

use sift_wasm::{construct_css_selector, construct_rule_text, css_rule_hit_url, get_element_info, parse_css_rule_hit};

wasm_bindgen_test_configure!(run_in_browser);

fn append(parent: &Element, tag: &str, attributes: &[(&str, &str)]) -> Element {
    let document = web_sys::window().unwrap().document().unwrap();
    let element = document.create_element(tag).unwrap();
    for (name, value) in attributes {
        element.set_attribute(name, value).unwrap();
    }
    parent.append_child(&element).unwrap();
    element
}

fn body() -> Element {
    let document = web_sys::window().unwrap().document().unwrap();
    let body: Element = document.body().unwrap().into();
    body.set_inner_html("");
    body
}

fn get(value: &JsValue, key: &str) -> JsValue {
    js_sys::Reflect::get(value, &key.into()).unwrap()
}

#[wasm_bindgen_test]
fn dotted_class_under_body() {
    let body = body();
    let div = append(&body, "div", &[("class", "ad.banner")]);

    assert_eq!(construct_css_selector(&div, false), "DIV[class=\"ad.banner\"]");
}

#[wasm_bindgen_test]
fn rule_text_from_js_options() {
    let body = body();
    let wrapper = append(&body, "div", &[("id", "sidebar")]);
    append(&wrapper, "p", &[]);
    let img = append(&wrapper, "img", &[("src", "http://www.example.com/ads/x.png")]);

    let options = js_sys::Object::new();
    js_sys::Reflect::set(&options, &"url".into(), &"http://www.example.com/page".into()).unwrap();
    assert_eq!(
        construct_rule_text(&img, options.clone().into()).unwrap(),
        "example.com###sidebar > IMG:last-child"
    );

    js_sys::Reflect::set(&options, &"isBlockByUrl".into(), &JsValue::TRUE).unwrap();
    js_sys::Reflect::set(&options, &"urlMask".into(), &"http://www.example.com/ads/x.png".into()).unwrap();
    assert_eq!(
        construct_rule_text(&img, options.into()).unwrap(),
        "||example.com/ads/x.png$domain=example.com"
    );

    assert!(construct_rule_text(&img, JsValue::UNDEFINED).is_err());
}

#[wasm_bindgen_test]
fn element_info_object() {
    let body = body();
    let img = append(&body, "img", &[("class", "ad wide"), ("src", "/x.png")]);

    let info = get_element_info(&img);
    assert_eq!(get(&info, "tagName").as_string().as_deref(), Some("IMG"));
    assert_eq!(js_sys::Array::from(&get(&info, "classes")).length(), 2);
    assert_eq!(get(&info, "urlBlockAttributeValue").as_string().as_deref(), Some("/x.png"));
    assert_eq!(get(&info, "haveClassAttribute").as_bool(), Some(true));
}

#[wasm_bindgen_test]
fn hit_url_round_trip() {
    let url = css_rule_hit_url("chrome-extension://abc/elemhidehit.png", "12", "##div.ad");
    let hit = parse_css_rule_hit(&url);
    assert_eq!(get(&hit, "filterId").as_string().as_deref(), Some("12"));
    assert_eq!(get(&hit, "ruleText").as_string().as_deref(), Some("##div.ad"));

    assert!(parse_css_rule_hit("chrome-extension://abc/elemhidehit.png").is_null());
}

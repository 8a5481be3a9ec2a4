//! HTTP header helpers
//!
//! Browsers hand headers over as an ordered list of name/value pairs. Names
//! are compared case-insensitively.

use serde::{Deserialize, Serialize};

pub const REFERER: &str = "Referer";

/// A single request or response header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpHeader {
    pub name: String,
    pub value: String,
}

impl HttpHeader {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Find the first header with the given name.
pub fn find_header<'h>(headers: &'h [HttpHeader], name: &str) -> Option<&'h HttpHeader> {
    headers.iter().find(|h| h.name.eq_ignore_ascii_case(name))
}

/// Set a header, replacing the value of an existing header with that name or
/// appending a new one.
pub fn set_header_value(headers: &mut Vec<HttpHeader>, name: &str, value: &str) {
    match headers.iter_mut().find(|h| h.name.eq_ignore_ascii_case(name)) {
        Some(header) => header.value = value.to_string(),
        None => headers.push(HttpHeader::new(name, value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_header_case_insensitive() {
        let headers = vec![
            HttpHeader::new("Accept", "*/*"),
            HttpHeader::new("referer", "https://a.example/"),
        ];
        assert_eq!(find_header(&headers, REFERER).map(|h| h.value.as_str()), Some("https://a.example/"));
        assert!(find_header(&headers, "Cookie").is_none());
    }

    #[test]
    fn test_set_header_value_replaces_existing() {
        let mut headers = vec![HttpHeader::new("REFERER", "https://old.example/")];
        set_header_value(&mut headers, REFERER, "https://new.example/");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[0].value, "https://new.example/");
    }

    #[test]
    fn test_set_header_value_appends() {
        let mut headers = vec![HttpHeader::new("Accept", "*/*")];
        set_header_value(&mut headers, REFERER, "https://new.example/");
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[1], HttpHeader::new(REFERER, "https://new.example/"));
    }
}

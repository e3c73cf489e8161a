/* src/server/markup/rust/src/element.rs */

use crate::helpers::escape_html;

/// Elements that never take children or a closing tag.
pub const VOID_ELEMENTS: &[&str] = &[
  "img", "input", "hr", "br", "col", "embed", "meta", "param", "area", "base", "link", "source",
  "track", "wbr",
];

// `value` is only a real attribute on these elements; elsewhere it is content.
const VALUE_ELEMENTS: &[&str] =
  &["button", "data", "input", "li", "meter", "option", "progress", "param"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
  /// Bare attribute name, e.g. `hidden`.
  Flag,
  /// Double-quoted, HTML-escaped value.
  Text(String),
  /// Pre-serialized JSON, single-quoted with apostrophes escaped.
  Json(String),
}

pub type Attributes = Vec<(String, AttrValue)>;

/// Serialize one element wrapping `inner`. An empty tag means `div`.
pub fn render_element(tag: &str, attrs: &[(String, AttrValue)], inner: &str) -> String {
  let tag = if tag.is_empty() { "div" } else { tag };

  let mut out = String::with_capacity(tag.len() * 2 + inner.len() + 16);
  out.push('<');
  out.push_str(tag);

  for (name, value) in attrs {
    if name == "value" && !VALUE_ELEMENTS.contains(&tag) {
      continue;
    }
    match value {
      AttrValue::Flag => {
        out.push(' ');
        out.push_str(name);
      }
      AttrValue::Text(text) => {
        out.push_str(&format!(r#" {name}="{}""#, escape_html(text)));
      }
      AttrValue::Json(json) => {
        out.push_str(&format!(" {name}='{}'", json.replace('\'', "\\u0027")));
      }
    }
  }
  out.push('>');

  if VOID_ELEMENTS.contains(&tag) {
    return out;
  }

  out.push_str(inner);
  out.push_str("</");
  out.push_str(tag);
  out.push('>');
  out
}

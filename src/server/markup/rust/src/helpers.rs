/* src/server/markup/rust/src/helpers.rs */

use serde_json::Value;

pub fn is_truthy(value: &Value) -> bool {
  match value {
    Value::Null => false,
    Value::Bool(b) => *b,
    Value::Number(n) => {
      if let Some(i) = n.as_i64() {
        i != 0
      } else if let Some(f) = n.as_f64() {
        f != 0.0
      } else {
        true
      }
    }
    Value::String(s) => !s.is_empty() && s != "0",
    Value::Array(arr) => !arr.is_empty(),
    Value::Object(map) => !map.is_empty(),
  }
}

pub fn stringify(value: &Value) -> String {
  match value {
    Value::Null => String::new(),
    Value::Bool(b) => b.to_string(),
    Value::Number(n) => n.to_string(),
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

const CSS_UNITLESS_PROPERTIES: &[&str] = &[
  "animation-iteration-count",
  "border-image-outset",
  "border-image-slice",
  "border-image-width",
  "column-count",
  "columns",
  "flex",
  "flex-grow",
  "flex-shrink",
  "font-weight",
  "grid-area",
  "grid-column",
  "grid-column-end",
  "grid-column-start",
  "grid-row",
  "grid-row-end",
  "grid-row-start",
  "line-clamp",
  "line-height",
  "opacity",
  "order",
  "orphans",
  "tab-size",
  "widows",
  "z-index",
  "zoom",
  "fill-opacity",
  "stroke-opacity",
  "stroke-width",
];

/// Format a JSON value as a CSS declaration value. Bare numbers get a `px`
/// unit unless the property is unitless; empty strings and non-scalars yield
/// `None`.
pub fn format_style_value(css_property: &str, value: &Value) -> Option<String> {
  match value {
    Value::Number(n) => {
      let unitless = CSS_UNITLESS_PROPERTIES.contains(&css_property);
      if let Some(i) = n.as_i64() {
        if i == 0 || unitless { Some(i.to_string()) } else { Some(format!("{i}px")) }
      } else if let Some(f) = n.as_f64() {
        let text = if f.fract() == 0.0 { format!("{}", f as i64) } else { f.to_string() };
        if f == 0.0 || unitless { Some(text) } else { Some(format!("{text}px")) }
      } else {
        None
      }
    }
    Value::String(s) if !s.is_empty() => Some(s.clone()),
    _ => None,
  }
}

pub fn escape_html(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  for ch in s.chars() {
    match ch {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '"' => out.push_str("&quot;"),
      '\'' => out.push_str("&#x27;"),
      c => out.push(c),
    }
  }
  out
}

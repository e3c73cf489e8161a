/* src/server/markup/rust/src/tests/elements.rs */

use crate::*;

fn text(name: &str, value: &str) -> (String, AttrValue) {
  (name.to_string(), AttrValue::Text(value.to_string()))
}

#[test]
fn default_tag_is_div() {
  assert_eq!(render_element("", &[], "hi"), "<div>hi</div>");
}

#[test]
fn attributes_keep_insertion_order() {
  let attrs = vec![text("id", "a"), text("class", "Banner wide")];
  assert_eq!(
    render_element("section", &attrs, "x"),
    r#"<section id="a" class="Banner wide">x</section>"#
  );
}

#[test]
fn flag_renders_bare_name() {
  let attrs = vec![("data-changeable".to_string(), AttrValue::Flag)];
  assert_eq!(render_element("div", &attrs, ""), "<div data-changeable></div>");
}

#[test]
fn text_values_are_escaped() {
  let attrs = vec![text("title", r#"say "hi" & <bye>"#)];
  assert_eq!(
    render_element("span", &attrs, ""),
    r#"<span title="say &quot;hi&quot; &amp; &lt;bye&gt;"></span>"#
  );
}

#[test]
fn json_attribute_single_quoted() {
  let attrs = vec![("data-widget_".to_string(), AttrValue::Json(r#"{"a":"it's"}"#.into()))];
  assert_eq!(
    render_element("div", &attrs, ""),
    r#"<div data-widget_='{"a":"it\u0027s"}'></div>"#
  );
}

#[test]
fn void_element_never_closes() {
  let attrs = vec![text("src", "a.png")];
  assert_eq!(render_element("img", &attrs, ""), r#"<img src="a.png">"#);
  // children of void elements are dropped
  assert_eq!(render_element("br", &[], "ignored"), "<br>");
}

#[test]
fn value_attribute_only_on_value_elements() {
  let attrs = vec![text("value", "42")];
  assert_eq!(render_element("div", &attrs, "x"), "<div>x</div>");
  assert_eq!(render_element("option", &attrs, "x"), r#"<option value="42">x</option>"#);
  assert_eq!(render_element("input", &attrs, ""), r#"<input value="42">"#);
}

/* src/server/engine/rust/src/renderer.rs */

//! Markup rendering. A session walks the widget tree of one page, hands
//! widget nodes to their registered implementation and wraps the result
//! in the node's element. Code and styles the widgets need are collected
//! on the way and assembled once the body is done.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value, json};
use tracing::error;
use weft_markup::{AttrValue, Attributes, is_truthy, render_element, stringify};

use crate::builtin::{PassThrough, Text};
use crate::composer::{JsTarget, PageComposer};
use crate::error::{EngineError, EngineResult};
use crate::localizer::Localizer;
use crate::master::MasterPageResolver;
use crate::node::{Content, TEMPLATE_ATTR, WIDGET_ATTRS, WidgetContent, WidgetNode};
use crate::package::normalize_class;
use crate::site::Site;

/// Server side of a widget class.
pub trait Widget: Send + Sync {
  /// Inner content for one instance. Returning a wrapper node (a `tag`
  /// without a widget class) hands its attributes to the enclosing element.
  fn render(&self, ctx: &mut WidgetContext<'_, '_>, data: Option<&Content>, params: &Map<String, Value>) -> Content;
}

/// Widget implementations by class, resolved once when the site is built.
#[derive(Clone, Default)]
pub struct WidgetRegistry {
  widgets: HashMap<String, Arc<dyn Widget>>,
  fallback: Option<Arc<dyn Widget>>,
}

impl fmt::Debug for WidgetRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut classes: Vec<_> = self.widgets.keys().collect();
    classes.sort();
    f.debug_struct("WidgetRegistry").field("classes", &classes).field("fallback", &self.fallback.is_some()).finish()
  }
}

impl WidgetRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Built-in widgets, with unknown classes rendering their data as is.
  pub fn with_builtins() -> Self {
    Self::new().register("Text", Text).fallback(PassThrough)
  }

  pub fn register(mut self, class: &str, widget: impl Widget + 'static) -> Self {
    self.widgets.insert(normalize_class(class), Arc::new(widget));
    self
  }

  /// Implementation used for classes nobody registered.
  pub fn fallback(mut self, widget: impl Widget + 'static) -> Self {
    self.fallback = Some(Arc::new(widget));
    self
  }

  pub fn get(&self, class: &str) -> EngineResult<Arc<dyn Widget>> {
    self
      .widgets
      .get(&normalize_class(class))
      .or(self.fallback.as_ref())
      .cloned()
      .ok_or_else(|| EngineError::UnknownWidget(class.to_string()))
  }
}

/// What a widget can reach while it renders.
pub struct WidgetContext<'s, 'a> {
  composer: &'s mut PageComposer<'a>,
  localizer: &'s Localizer<'a>,
  holder_id: &'s str,
  widget_class: &'s str,
  options: &'s Value,
  diagnostics: Vec<String>,
}

impl<'s, 'a> WidgetContext<'s, 'a> {
  pub fn holder_id(&self) -> &str {
    self.holder_id
  }

  pub fn widget_class(&self) -> &str {
    self.widget_class
  }

  /// System options of the instance: its `sysParams` plus tracking data.
  pub fn options(&self) -> &Value {
    self.options
  }

  pub fn lang(&self) -> &str {
    self.localizer.lang()
  }

  pub fn localize(&self, value: &Value) -> String {
    self.localizer.localize(value)
  }

  pub fn parse_href(&self, value: &Value) -> String {
    self.localizer.parse_href(value)
  }

  /// Record stray output. It is logged once the widget returns and never
  /// fails the page.
  pub fn diagnostic(&mut self, message: impl Into<String>) {
    self.diagnostics.push(message.into());
  }

  pub fn add_head_html(&mut self, html: impl Into<String>) {
    self.composer.add_head_html(html);
  }

  pub fn add_inline_js(&mut self, code: impl Into<String>) {
    self.composer.add_inline_js(code);
  }

  pub fn add_on_ready_code(&mut self, code: &str) {
    self.composer.add_on_ready_code(code);
  }

  /// Create this instance's client object on document ready and call its
  /// `render` method with `params`.
  pub fn init_javascript_widget(&mut self, params: &Map<String, Value>) -> bool {
    let target = JsTarget {
      holder_id: self.holder_id.to_string(),
      class: self.widget_class.to_string(),
      method: None,
      options: Some(self.options.clone()),
    };
    self.init_javascript_target(params, &target)
  }

  pub fn init_javascript_target(&mut self, params: &Map<String, Value>, target: &JsTarget) -> bool {
    match self.composer.init_javascript_widget(params, target) {
      Ok(added) => added,
      Err(e) => {
        self.diagnostic(format!("client initialization failed: {e}"));
        false
      }
    }
  }
}

/// State of one page render.
pub struct RenderSession<'a> {
  site: &'a Site,
  page: &'a str,
  localizer: Localizer<'a>,
  composer: PageComposer<'a>,
  masters: MasterPageResolver<'a>,
}

impl<'a> RenderSession<'a> {
  pub fn new(site: &'a Site, page: &'a str, lang: &'a str) -> Self {
    Self {
      site,
      page,
      localizer: Localizer::new(site, page, lang),
      composer: PageComposer::new(site, page, lang),
      masters: MasterPageResolver::new(site),
    }
  }

  /// Render the whole document and the CSS exported alongside it.
  pub fn render_document(mut self, mut tree: WidgetNode) -> EngineResult<(String, String)> {
    if let Some(template) = tree.template().map(str::to_string) {
      tree = self.masters.merge(&template, tree)?;
      tree.attrs.insert(TEMPLATE_ATTR.to_string(), Value::String(template));
    }

    let page_head = tree.head.take().unwrap_or_default();
    for widget in PageComposer::page_level_widgets(&self.site.settings.base_head, &page_head) {
      let html = self.render_markup(&widget)?;
      if !html.is_empty() {
        self.composer.add_head_html(html);
      }
    }

    let body = self.render_node(tree)?;
    // scripts first: widgets may still queue polyfills for the head
    let src = self.composer.render_source_code();
    let head = self.composer.render_head().join("\n");
    let lang = self.localizer.lang();

    let html = format!("<!DOCTYPE html>\n<html lang=\"{lang}\">\n<head>{head}\n</head>\n{body}{src}\n</html>");
    Ok((html, self.composer.export_css()))
  }

  pub fn render_markup(&mut self, content: &Content) -> EngineResult<String> {
    match content {
      Content::Markup(html) => Ok(html.clone()),
      Content::Scalar(Value::String(s)) => Ok(s.clone()),
      Content::Scalar(value) if is_truthy(value) => Ok(value.to_string()),
      Content::Scalar(_) => Ok(String::new()),
      Content::List(items) => {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
          out.push(self.render_markup(item)?);
        }
        Ok(out.join("\n"))
      }
      Content::Node(node) => self.render_node(node.as_ref().clone()),
    }
  }

  fn render_node(&mut self, mut node: WidgetNode) -> EngineResult<String> {
    if let Some(template) = node.template().map(str::to_string) {
      let mut merged = self.masters.merge(&template, node)?;
      merged.attrs.insert(TEMPLATE_ATTR.to_string(), Value::String(template));
      return self.render_node(merged);
    }

    let class = node.widget_class.take().filter(|c| !c.is_empty());
    let inner = if node.sys_params.invisible {
      node.take_content();
      None
    } else if let Some(class) = class {
      Some(self.render_widget(&mut node, &class)?)
    } else {
      let content = node.take_content();
      content.data.or_else(|| node.attrs.remove("value").map(Content::Scalar))
    };

    if node.tag.as_deref() == Some("head") {
      let html = match &inner {
        Some(inner) => self.render_markup(inner)?,
        None => String::new(),
      };
      self.composer.add_head_html(html);
      return Ok(String::new());
    }
    self.render_element(node, inner.as_ref())
  }

  fn render_widget(&mut self, node: &mut WidgetNode, class: &str) -> EngineResult<Content> {
    let id = node.id.clone().unwrap_or_default();
    let content = node.take_content();
    let class = normalize_class(class);
    let options = widget_options(&id, &content, &class);

    let pkg = self.composer.init_widget_class(&class)?;
    let schema = self.site.packages.extended_params(self.site.store.as_ref(), &class)?;
    let params =
      self.localizer.localized_settings(&content.params, &schema, &class, &mut self.composer.styles.fonts);
    let widget = self.site.widgets.get(&class)?;

    let mut ctx = WidgetContext {
      composer: &mut self.composer,
      localizer: &self.localizer,
      holder_id: &id,
      widget_class: &class,
      options: &options,
      diagnostics: Vec::new(),
    };
    let mut markup = widget.render(&mut ctx, content.data.as_ref(), &params);
    let diagnostics = ctx.diagnostics;

    let mut classes = self.composer.widget_css_classes(
      &id,
      &pkg,
      content.widget_styles.as_ref(),
      content.css.as_ref(),
      content.custom_code.as_ref(),
    )?;
    if let Some(extra) = node.attrs.get("class").map(stringify).filter(|c| !c.is_empty()) {
      classes.push(extra);
    }

    if let Content::Node(wrapper) = &mut markup
      && wrapper.widget_class.is_none()
      && wrapper.tag.is_some()
    {
      let inner = wrapper.data.take();
      splice_wrapper(node, wrapper, &mut classes);
      markup = inner.unwrap_or(Content::Scalar(Value::Null));
    }

    node.attrs.insert("class".to_string(), Value::String(classes.join(" ")));
    if !node.attrs.get("role").is_some_and(is_truthy)
      && let Some(role) = pkg.widget_settings.role.as_deref().filter(|r| !r.is_empty())
    {
      node.attrs.insert("role".to_string(), Value::String(role.to_string()));
    }
    if self.composer.has_js_code(&class, &id) {
      node.attrs.insert(WIDGET_ATTRS.to_string(), options);
    }

    for message in diagnostics {
      error!(widget_id = %id, widget_class = %class, page = %self.page, "{message}");
    }
    Ok(markup)
  }

  fn render_element(&mut self, node: WidgetNode, inner: Option<&Content>) -> EngineResult<String> {
    if inner.is_none() && node.tag.is_none() && node.id.is_none() && node.attrs.is_empty() {
      return Ok(String::new());
    }

    let mut attrs: Attributes = Vec::with_capacity(node.attrs.len() + 1);
    if let Some(id) = node.id {
      attrs.push(("id".to_string(), AttrValue::Text(id)));
    }
    for (name, value) in node.attrs {
      let value = match value {
        _ if name == WIDGET_ATTRS => AttrValue::Json(value.to_string()),
        Value::Bool(true) => AttrValue::Flag,
        Value::Bool(false) => continue,
        Value::String(s) => AttrValue::Text(s),
        Value::Null => AttrValue::Text(String::new()),
        Value::Number(n) => AttrValue::Text(n.to_string()),
        other => AttrValue::Text(self.localizer.localize(&other)),
      };
      attrs.push((name, value));
    }

    let inner = match inner {
      Some(inner) => self.render_markup(inner)?,
      None => String::new(),
    };
    Ok(render_element(node.tag.as_deref().unwrap_or_default(), &attrs, &inner))
  }
}

/// Options handed to a widget and, when it has client code, to its
/// client object through `data-widget_`.
fn widget_options(id: &str, content: &WidgetContent, class: &str) -> Value {
  let label: String = content.widget_name.as_deref().unwrap_or_default().chars().take(25).collect();
  let mut options = match serde_json::to_value(&content.sys_params) {
    Ok(Value::Object(map)) => map,
    _ => Map::new(),
  };
  options.insert("firstImpressionRatio".into(), json!(0.5));
  options.insert("tracking".into(), json!({ "event_category": class, "event_label": format!("{id};{label}") }));
  options.insert("holderId".into(), Value::String(id.to_string()));
  Value::Object(options)
}

/// Move the attributes of a returned wrapper onto the widget's element,
/// keeping those the element already has.
fn splice_wrapper(node: &mut WidgetNode, wrapper: &mut WidgetNode, classes: &mut Vec<String>) {
  if node.tag.is_none() {
    node.tag = wrapper.tag.take();
  }
  if node.id.is_none() {
    node.id = wrapper.id.take();
  }
  for (name, value) in std::mem::take(&mut wrapper.attrs) {
    if name == "class" {
      let class = stringify(&value);
      if !class.is_empty() {
        classes.push(class);
      }
    } else if !node.attrs.contains_key(&name) {
      node.attrs.insert(name, value);
    }
  }
}

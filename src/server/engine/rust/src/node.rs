/* src/server/engine/rust/src/node.rs */

//! Typed widget tree shared by pages, master pages and head widgets.
//! Deserialization is lenient: authoring tools emit `[]` for empty objects
//! and loosely typed flags, and neither should fail a page.

use serde::de::{DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use weft_markup::is_truthy;

use crate::error::{EngineError, EngineResult};

pub const CHANGEABLE_ATTR: &str = "data-changeable";
pub const CHANGED_ATTR: &str = "data-changedFromSuper";
pub const SUPERMASTER_ATTR: &str = "data-supermaster";
pub const TEMPLATE_ATTR: &str = "data-pageTemplate";
pub const WIDGET_ATTRS: &str = "data-widget_";

pub const TEMPLATE_PARAM: &str = "_template";
pub const DICTIONARY_PARAM: &str = "_dictionary";
pub const REPLACE_SITE_WIDGET_PARAM: &str = "_replaceWebsiteWidget";

/// Anything that can sit in a `data` slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
  Markup(String),
  List(Vec<Content>),
  Node(Box<WidgetNode>),
  Scalar(Value),
}

impl From<&str> for Content {
  fn from(markup: &str) -> Self {
    Self::Markup(markup.to_string())
  }
}

impl From<WidgetNode> for Content {
  fn from(node: WidgetNode) -> Self {
    Self::Node(Box::new(node))
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetNode {
  /// Absent for plain markup containers. `Some("")` on a page override
  /// removes the matching master widget.
  #[serde(
    rename = "widget",
    alias = "widgetClass",
    default,
    deserialize_with = "lenient_string",
    skip_serializing_if = "Option::is_none"
  )]
  pub widget_class: Option<String>,
  #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
  pub tag: Option<String>,
  #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
  pub id: Option<String>,
  #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
  pub path: Option<String>,
  #[serde(default, deserialize_with = "declared_params", skip_serializing_if = "Params::is_empty")]
  pub params: Params,
  #[serde(default, alias = "children", skip_serializing_if = "Option::is_none")]
  pub data: Option<Content>,
  #[serde(default, deserialize_with = "lenient", skip_serializing_if = "SysParams::is_empty")]
  pub sys_params: SysParams,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub css: Option<Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub widget_styles: Option<Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub custom_code: Option<Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub data_sources: Option<Value>,
  #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
  pub widget_name: Option<String>,
  #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
  pub head: Option<Vec<Content>>,
  /// Remaining keys are HTML attributes, in document order.
  #[serde(flatten)]
  pub attrs: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SysParams {
  #[serde(default, deserialize_with = "truthy")]
  pub changeable: bool,
  #[serde(default, deserialize_with = "truthy")]
  pub invisible: bool,
  #[serde(default, deserialize_with = "lenient")]
  pub unlock_params: UnlockParams,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

/// Widget parameters. Remembers whether the source declared the key at all,
/// so an explicit `{}` can be told apart from an omitted one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params {
  map: Map<String, Value>,
  #[serde(skip)]
  declared: bool,
}

impl Params {
  pub fn declared(&self) -> bool {
    self.declared
  }

  pub fn is_empty(&self) -> bool {
    self.map.is_empty()
  }

  pub fn into_map(self) -> Map<String, Value> {
    self.map
  }
}

impl PartialEq for Params {
  fn eq(&self, other: &Self) -> bool {
    self.map == other.map
  }
}

impl From<Map<String, Value>> for Params {
  fn from(map: Map<String, Value>) -> Self {
    Self { map, declared: true }
  }
}

impl std::ops::Deref for Params {
  type Target = Map<String, Value>;

  fn deref(&self) -> &Self::Target {
    &self.map
  }
}

impl std::ops::DerefMut for Params {
  fn deref_mut(&mut self) -> &mut Self::Target {
    &mut self.map
  }
}

impl SysParams {
  fn is_empty(&self) -> bool {
    *self == Self::default()
  }
}

/// Which parts of a changeable master widget a page may override.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockParams {
  #[serde(default, deserialize_with = "truthy")]
  pub themes: bool,
  #[serde(default, deserialize_with = "truthy")]
  pub styling: bool,
  #[serde(default, deserialize_with = "truthy")]
  pub params: bool,
  /// Parsed but never acted on: inner-widget unlocking is disabled.
  #[serde(default, deserialize_with = "truthy")]
  pub data: bool,
}

/// The content-bearing keys of a widget node, split off its wrapper element.
#[derive(Debug, Clone, Default)]
pub struct WidgetContent {
  pub data: Option<Content>,
  pub params: Map<String, Value>,
  pub sys_params: SysParams,
  pub css: Option<Value>,
  pub data_sources: Option<Value>,
  pub widget_name: Option<String>,
  pub widget_styles: Option<Value>,
  pub custom_code: Option<Value>,
}

impl WidgetNode {
  /// Parse a page file. `path` only feeds the error message.
  pub fn from_value(path: &str, value: Value) -> EngineResult<Self> {
    serde_json::from_value(value).map_err(|e| EngineError::invalid_json(path, &e))
  }

  pub fn is_widget(&self) -> bool {
    self.widget_class.is_some()
  }

  /// Name of the master page this node extends, if any.
  pub fn template(&self) -> Option<&str> {
    self.params.get(TEMPLATE_PARAM).and_then(Value::as_str).filter(|t| !t.is_empty())
  }

  pub fn set_flag(&mut self, name: &str) {
    self.attrs.insert(name.to_string(), Value::Bool(true));
  }

  pub fn has_flag(&self, name: &str) -> bool {
    self.attrs.get(name).is_some_and(is_truthy)
  }

  /// Remove every content-bearing key, leaving only the wrapper element.
  pub fn take_content(&mut self) -> WidgetContent {
    WidgetContent {
      data: self.data.take(),
      params: std::mem::take(&mut self.params).into_map(),
      sys_params: std::mem::take(&mut self.sys_params),
      css: self.css.take(),
      data_sources: self.data_sources.take(),
      widget_name: self.widget_name.take(),
      widget_styles: self.widget_styles.take(),
      custom_code: self.custom_code.take(),
    }
  }
}

pub(crate) fn truthy<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
  Ok(is_truthy(&Value::deserialize(deserializer)?))
}

fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
  D: Deserializer<'de>,
  T: DeserializeOwned + Default,
{
  let value = Value::deserialize(deserializer)?;
  Ok(serde_json::from_value(value).unwrap_or_default())
}

fn declared_params<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Params, D::Error> {
  let map: Map<String, Value> = lenient(deserializer)?;
  Ok(Params::from(map))
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
  Ok(match Value::deserialize(deserializer)? {
    Value::String(s) => Some(s),
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  })
}

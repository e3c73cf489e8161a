/* src/server/engine/rust/src/package.rs */

//! Widget packages: per-class settings, parameter schema, libraries and
//! styles, read from `widgets/<class>/settings.json` and cached for the
//! lifetime of the process.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{EngineError, EngineResult};
use crate::library::LibraryRequest;
use crate::node::truthy;
use crate::store::ContentStore;

/// Canonical class key: `Vendor/Name`. Accepts `__` and `\` separators.
pub fn normalize_class(class: &str) -> String {
  class.replace("__", "/").replace('\\', "/").trim_start_matches('/').to_string()
}

/// Class name usable in CSS and JavaScript.
pub fn client_class(class: &str) -> String {
  class.replace(['/', '\\'], "__")
}

pub fn short_name(class: &str) -> &str {
  class.rsplit('/').next().unwrap_or(class)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParamType {
  General,
  Submenu,
  Dropdown,
  Font,
  Media,
  WebsiteAssets,
  File,
  Upload,
  Text,
  Href,
  Table,
  Pages,
  Widgets,
  #[default]
  #[serde(other)]
  Other,
}

/// One declared widget parameter. Groups carry their members in `data`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamSpec {
  #[serde(default)]
  pub name: String,
  #[serde(default, rename = "type")]
  pub kind: ParamType,
  #[serde(default)]
  pub empty_value: Value,
  #[serde(default)]
  pub options: Vec<ParamOption>,
  #[serde(default)]
  pub data: Vec<ParamSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamOption {
  #[serde(default)]
  pub value: Value,
  #[serde(default, deserialize_with = "truthy")]
  pub default_option: bool,
}

impl ParamSpec {
  pub fn is_group(&self) -> bool {
    matches!(self.kind, ParamType::General | ParamType::Submenu)
  }

  /// Value used when the page sets nothing.
  pub fn default_value(&self) -> Value {
    if matches!(self.kind, ParamType::Dropdown | ParamType::Font)
      && let Some(option) = self.options.iter().find(|o| o.default_option)
    {
      return option.value.clone();
    }
    match &self.empty_value {
      Value::Null => Value::String(String::new()),
      other => other.clone(),
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WidgetSettings {
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default)]
  pub version: String,
  #[serde(default)]
  pub role: Option<String>,
  /// Parent class whose parameters and libraries this one inherits.
  #[serde(default)]
  pub extends: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LibrarySet {
  #[serde(default)]
  pub css: Vec<LibraryRequest>,
  #[serde(default)]
  pub js: Vec<LibraryRequest>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomLibs {
  #[serde(default)]
  pub js: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientClass {
  #[serde(default)]
  pub has_code: Option<bool>,
  #[serde(default)]
  pub methods: HashMap<String, ClientMethod>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientMethod {
  #[serde(default)]
  pub is_static: bool,
  #[serde(default)]
  pub is_empty: bool,
}

impl ClientClass {
  /// Explicit flag, else inferred from any non-empty method.
  pub fn has_code(&self) -> bool {
    self.has_code.unwrap_or_else(|| self.methods.values().any(|m| !m.is_empty))
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetPackage {
  #[serde(skip)]
  pub class: String,
  #[serde(default)]
  pub widget_settings: WidgetSettings,
  #[serde(default)]
  pub widget_params: Vec<ParamSpec>,
  #[serde(default)]
  pub external_libs: LibrarySet,
  #[serde(default)]
  pub custom_libs: Option<CustomLibs>,
  /// Main stylesheet, relative to the package folder.
  #[serde(default)]
  pub css: Option<String>,
  #[serde(default)]
  pub default_style: Map<String, Value>,
  #[serde(default)]
  pub predefined_style: Map<String, Value>,
  #[serde(default)]
  pub widget_classes: Map<String, Value>,
  #[serde(default)]
  pub custom_classes: Map<String, Value>,
  #[serde(default, rename = "polyfillIO")]
  pub polyfill_io: Vec<String>,
  #[serde(default)]
  pub polyfills: Map<String, Value>,
  #[serde(default)]
  pub on_ready: Option<String>,
  #[serde(default)]
  pub client_class: Option<ClientClass>,
}

impl WidgetPackage {
  pub fn settings_path(class: &str) -> String {
    format!("widgets/{class}/settings.json")
  }

  pub fn short_name(&self) -> &str {
    short_name(&self.class)
  }

  /// Display name, used as the default-style selector.
  pub fn name(&self) -> &str {
    self.widget_settings.name.as_deref().unwrap_or_else(|| self.short_name())
  }

  pub fn version(&self) -> &str {
    &self.widget_settings.version
  }

  /// Store path of a file inside this package.
  pub fn file_path(&self, relative: &str) -> String {
    format!("widgets/{}/{relative}", self.class)
  }

  pub fn css_file(&self) -> String {
    self.css.clone().unwrap_or_else(|| format!("css/{}.css", self.short_name()))
  }

  /// Own script files: declared custom libs, else the main `<Name>.js`.
  pub fn js_files(&self) -> Vec<String> {
    match &self.custom_libs {
      Some(libs) => libs.js.clone(),
      None => vec![format!("{}.js", self.short_name())],
    }
  }

  pub fn js_class(&self) -> String {
    client_class(&self.class)
  }

  pub fn client_method(&self, name: &str) -> Option<&ClientMethod> {
    self.client_class.as_ref()?.methods.get(name)
  }

  pub fn has_client_code(&self) -> bool {
    self.client_class.as_ref().is_some_and(ClientClass::has_code)
  }

  /// Code run once per page when the class is on it.
  pub fn on_ready_code(&self) -> Option<String> {
    if let Some(code) = self.on_ready.as_ref().filter(|c| !c.trim().is_empty()) {
      return Some(code.clone());
    }
    let init = self.client_method("initClass")?;
    (init.is_static && !init.is_empty).then(|| format!("{}.initClass();", self.js_class()))
  }
}

/// Process-wide cache of packages and their inherited schema and libraries.
#[derive(Debug, Default)]
pub struct PackageCache {
  packages: RwLock<HashMap<String, Arc<WidgetPackage>>>,
  params: RwLock<HashMap<String, Arc<Vec<ParamSpec>>>>,
  libs: RwLock<HashMap<String, Arc<LibrarySet>>>,
}

impl PackageCache {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn load(&self, store: &dyn ContentStore, class: &str) -> EngineResult<Arc<WidgetPackage>> {
    let key = normalize_class(class);
    if let Some(pkg) = self.packages.read().unwrap_or_else(PoisonError::into_inner).get(&key) {
      return Ok(Arc::clone(pkg));
    }

    let raw = store
      .read_json(&WidgetPackage::settings_path(&key))?
      .ok_or_else(|| EngineError::MissingSchema(key.clone()))?;
    let mut pkg: WidgetPackage = serde_json::from_value(raw).map_err(|e| {
      EngineError::InvalidClassSettings { widget_class: key.clone(), reason: e.to_string() }
    })?;
    pkg.class.clone_from(&key);

    let pkg = Arc::new(pkg);
    self.packages.write().unwrap_or_else(PoisonError::into_inner).insert(key, Arc::clone(&pkg));
    Ok(pkg)
  }

  /// The class followed by its ancestors, nearest first.
  pub fn lineage(
    &self,
    store: &dyn ContentStore,
    class: &str,
  ) -> EngineResult<Vec<Arc<WidgetPackage>>> {
    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    let mut current = Some(normalize_class(class));

    while let Some(name) = current {
      if !seen.insert(name.clone()) {
        return Err(EngineError::InvalidClassSettings {
          widget_class: normalize_class(class),
          reason: format!("'extends' loops back to '{name}'"),
        });
      }
      let pkg = self.load(store, &name)?;
      current = pkg.widget_settings.extends.as_deref().filter(|p| !p.is_empty()).map(normalize_class);
      chain.push(pkg);
    }
    Ok(chain)
  }

  /// Parameter schema including inherited declarations. A class's own
  /// parameters come first; same-named inherited ones are dropped.
  pub fn extended_params(
    &self,
    store: &dyn ContentStore,
    class: &str,
  ) -> EngineResult<Arc<Vec<ParamSpec>>> {
    let key = normalize_class(class);
    if let Some(params) = self.params.read().unwrap_or_else(PoisonError::into_inner).get(&key) {
      return Ok(Arc::clone(params));
    }

    let mut merged: Vec<ParamSpec> = Vec::new();
    for pkg in self.lineage(store, &key)?.iter().rev() {
      if pkg.widget_params.is_empty() {
        continue;
      }
      let mut inherited = std::mem::take(&mut merged);
      remove_conflicts(&pkg.widget_params, &mut inherited);
      merged = pkg.widget_params.clone();
      merged.extend(inherited);
    }

    let merged = Arc::new(merged);
    self.params.write().unwrap_or_else(PoisonError::into_inner).insert(key, Arc::clone(&merged));
    Ok(merged)
  }

  /// External libraries including inherited ones, ancestors first.
  pub fn extended_libs(
    &self,
    store: &dyn ContentStore,
    class: &str,
  ) -> EngineResult<Arc<LibrarySet>> {
    let key = normalize_class(class);
    if let Some(libs) = self.libs.read().unwrap_or_else(PoisonError::into_inner).get(&key) {
      return Ok(Arc::clone(libs));
    }

    let mut merged = LibrarySet::default();
    for pkg in self.lineage(store, &key)?.iter().rev() {
      append_unique(&mut merged.css, &pkg.external_libs.css);
      append_unique(&mut merged.js, &pkg.external_libs.js);
    }

    let merged = Arc::new(merged);
    self.libs.write().unwrap_or_else(PoisonError::into_inner).insert(key, Arc::clone(&merged));
    Ok(merged)
  }
}

fn append_unique<T: Clone + PartialEq>(target: &mut Vec<T>, items: &[T]) {
  for item in items {
    if !target.contains(item) {
      target.push(item.clone());
    }
  }
}

fn remove_conflicts(own: &[ParamSpec], inherited: &mut Vec<ParamSpec>) {
  for param in own {
    remove_named(inherited, &param.name);
    if param.kind == ParamType::Submenu {
      remove_conflicts(&param.data, inherited);
    }
  }
}

/// Drop the first parameter called `name`, searching into groups.
fn remove_named(params: &mut Vec<ParamSpec>, name: &str) -> bool {
  if let Some(pos) = params.iter().position(|p| p.name == name) {
    params.remove(pos);
    return true;
  }
  params.iter_mut().any(|p| remove_named(&mut p.data, name))
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::store::MemoryStore;

  fn store() -> MemoryStore {
    MemoryStore::new()
      .with_json(
        "widgets/Base/settings.json",
        json!({
          "widgetSettings": { "version": "1.0.0" },
          "widgetParams": [
            { "name": "title", "type": "text" },
            { "name": "style", "type": "submenu", "data": [ { "name": "color", "type": "dropdown" } ] }
          ],
          "externalLibs": { "js": [ { "lib": "jquery", "version": "3.0.0", "url": "j.js" } ] }
        }),
      )
      .with_json(
        "widgets/Acme/Banner/settings.json",
        json!({
          "widgetSettings": { "name": "Banner", "version": "1.2.0", "extends": "Base" },
          "widgetParams": [ { "name": "color", "type": "text" } ],
          "externalLibs": { "js": [
            { "lib": "jquery", "version": "3.0.0", "url": "j.js" },
            { "lib": "slick", "url": "s.js" }
          ] }
        }),
      )
  }

  #[test]
  fn class_names() {
    assert_eq!(normalize_class("Acme__Banner"), "Acme/Banner");
    assert_eq!(normalize_class("\\Acme\\Banner"), "Acme/Banner");
    assert_eq!(client_class("Acme/Banner"), "Acme__Banner");
    assert_eq!(short_name("Acme/Banner"), "Banner");
  }

  #[test]
  fn missing_package_is_fatal() {
    let cache = PackageCache::new();
    let err = cache.load(&store(), "Nope").unwrap_err();
    assert_eq!(err, EngineError::MissingSchema("Nope".into()));
  }

  #[test]
  fn extended_params_child_first_without_conflicts() {
    let cache = PackageCache::new();
    let params = cache.extended_params(&store(), "Acme__Banner").unwrap();
    let names: Vec<_> = params.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["color", "title", "style"]);
    // inherited "color" inside the submenu was dropped
    assert!(params[2].data.is_empty());
  }

  #[test]
  fn extended_libs_ancestors_first_deduped() {
    let cache = PackageCache::new();
    let libs = cache.extended_libs(&store(), "Acme/Banner").unwrap();
    let names: Vec<_> = libs.js.iter().map(|l| l.lib.as_str()).collect();
    assert_eq!(names, vec!["jquery", "slick"]);
  }

  #[test]
  fn extends_cycle_rejected() {
    let store = MemoryStore::new()
      .with_json("widgets/A/settings.json", json!({ "widgetSettings": { "extends": "B" } }))
      .with_json("widgets/B/settings.json", json!({ "widgetSettings": { "extends": "A" } }));
    let err = PackageCache::new().lineage(&store, "A").unwrap_err();
    assert!(matches!(err, EngineError::InvalidClassSettings { .. }));
  }

  #[test]
  fn dropdown_default_option() {
    let spec: ParamSpec = serde_json::from_value(json!({
      "name": "size", "type": "dropdown", "emptyValue": "m",
      "options": [ { "value": "s" }, { "value": "l", "defaultOption": 1 } ]
    }))
    .unwrap();
    assert_eq!(spec.default_value(), json!("l"));
    let spec: ParamSpec = serde_json::from_value(json!({ "name": "x" })).unwrap();
    assert_eq!(spec.default_value(), json!(""));
  }

  #[test]
  fn on_ready_from_static_init_class() {
    let pkg: WidgetPackage = serde_json::from_value(json!({
      "clientClass": { "methods": { "initClass": { "isStatic": true } } }
    }))
    .unwrap();
    let pkg = WidgetPackage { class: "Acme/Slider".into(), ..pkg };
    assert_eq!(pkg.on_ready_code().as_deref(), Some("Acme__Slider.initClass();"));
    assert!(pkg.has_client_code());
  }
}

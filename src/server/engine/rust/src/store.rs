/* src/server/engine/rust/src/store.rs */

//! Collaborator seams. The engine never touches the filesystem itself;
//! hosts plug their storage, asset URLs and data sources in here.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use serde_json::Value;

use crate::error::{EngineError, EngineResult};

/// Read access to the site folder (pages, settings, widget packages,
/// dictionaries, theme classes). Paths are `/`-separated and relative.
pub trait ContentStore: Send + Sync {
  fn read_raw(&self, path: &str) -> Option<String>;

  fn exists(&self, path: &str) -> bool {
    self.read_raw(path).is_some()
  }

  /// `Ok(None)` when the file is missing; malformed JSON is an error.
  fn read_json(&self, path: &str) -> EngineResult<Option<Value>> {
    let Some(raw) = self.read_raw(path) else {
      return Ok(None);
    };
    serde_json::from_str(&raw).map(Some).map_err(|e| EngineError::invalid_json(path, &e))
  }
}

pub trait AssetResolver: Send + Sync {
  /// URL for a site-relative path such as `assets/logo.png`.
  fn site_url(&self, path: &str) -> String;

  /// Asset referenced from a widget parameter or style. Site assets win;
  /// otherwise the asset is looked up in the widget package.
  fn asset_url(&self, name: &str, widget_class: &str) -> String;

  fn file_asset_url(&self, name: &str) -> String {
    if name.is_empty() {
      return String::new();
    }
    self.site_url(&format!("assets/{name}"))
  }

  /// URL inside the widget packages folder, e.g. `Banner/css/Banner.css`.
  fn widget_url(&self, path: &str) -> String {
    self.site_url(&format!("widgets/{path}"))
  }
}

/// Resolves `$name` parameter references against external data.
pub trait DataResolver: Send + Sync {
  fn fetch(&self, reference: &Value) -> Option<Value>;
}

/// Resolver for sites without data sources.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoData;

impl DataResolver for NoData {
  fn fetch(&self, _reference: &Value) -> Option<Value> {
    None
  }
}

/// Asset URLs built from a root prefix, with no existence checks.
#[derive(Debug, Clone)]
pub struct UrlAssets {
  root_url: String,
}

impl UrlAssets {
  pub fn new(root_url: impl Into<String>) -> Self {
    let mut root_url = root_url.into();
    if !root_url.ends_with('/') {
      root_url.push('/');
    }
    Self { root_url }
  }

  pub fn root_url(&self) -> &str {
    &self.root_url
  }
}

impl Default for UrlAssets {
  fn default() -> Self {
    Self::new("/")
  }
}

impl AssetResolver for UrlAssets {
  fn site_url(&self, path: &str) -> String {
    format!("{}{path}", self.root_url)
  }

  fn asset_url(&self, name: &str, _widget_class: &str) -> String {
    if name.is_empty() {
      return String::new();
    }
    // already resolved
    if name.contains("//") || name.starts_with(&format!("{}assets/", self.root_url)) {
      return name.to_string();
    }
    self.file_asset_url(name)
  }
}

/// In-memory store, used by tests and by hosts that pre-load a site.
#[derive(Debug, Default)]
pub struct MemoryStore {
  files: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&self, path: impl Into<String>, contents: impl Into<String>) {
    self.files.write().unwrap_or_else(PoisonError::into_inner).insert(path.into(), contents.into());
  }

  pub fn insert_json(&self, path: impl Into<String>, value: &Value) {
    self.insert(path, value.to_string());
  }

  /// Builder-style `insert_json`.
  pub fn with_json(self, path: impl Into<String>, value: Value) -> Self {
    self.insert_json(path, &value);
    self
  }

  pub fn with_raw(self, path: impl Into<String>, contents: impl Into<String>) -> Self {
    self.insert(path, contents);
    self
  }
}

impl ContentStore for MemoryStore {
  fn read_raw(&self, path: &str) -> Option<String> {
    self.files.read().unwrap_or_else(PoisonError::into_inner).get(path).cloned()
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn memory_store_reads_json() {
    let store = MemoryStore::new().with_json("settings/a.json", json!({ "x": 1 }));
    assert_eq!(store.read_json("settings/a.json").unwrap(), Some(json!({ "x": 1 })));
    assert_eq!(store.read_json("settings/missing.json").unwrap(), None);
  }

  #[test]
  fn malformed_json_is_an_error() {
    let store = MemoryStore::new().with_raw("pages/bad.json", "{ nope");
    let err = store.read_json("pages/bad.json").unwrap_err();
    assert!(matches!(err, EngineError::InvalidJson { ref path, .. } if path == "pages/bad.json"));
  }

  #[test]
  fn url_assets_prefixes_root() {
    let assets = UrlAssets::new("/site");
    assert_eq!(assets.file_asset_url("logo.png"), "/site/assets/logo.png");
    assert_eq!(assets.widget_url("Banner/css/Banner.css"), "/site/widgets/Banner/css/Banner.css");
    assert_eq!(assets.asset_url("/site/assets/logo.png", "Banner"), "/site/assets/logo.png");
    assert_eq!(assets.asset_url("https://cdn.test/a.png", "Banner"), "https://cdn.test/a.png");
    assert_eq!(assets.asset_url("", "Banner"), "");
  }
}

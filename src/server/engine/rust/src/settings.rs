/* src/server/engine/rust/src/settings.rs */

//! Site-wide settings read once through the content store.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::EngineResult;
use crate::fonts::FontSettings;
use crate::node::Content;
use crate::store::ContentStore;

pub const LANGUAGES_FILE: &str = "settings/languages.json";
pub const BREAKPOINTS_FILE: &str = "settings/breakpoints.json";
pub const PAGE_MAP_FILE: &str = "settings/glot_pageSettings.json";
pub const BASE_PAGE_FILE: &str = "settings/_basePage.json";
pub const FONTS_FILE: &str = "settings/glot_fontSettings.json";
pub const POLYFILLS_FILE: &str = "settings/polyfills.json";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageSettings {
  #[serde(default = "default_main_lang")]
  pub main_lang: String,
  #[serde(default)]
  pub languages: Vec<String>,
}

fn default_main_lang() -> String {
  "en".to_string()
}

impl Default for LanguageSettings {
  fn default() -> Self {
    Self { main_lang: default_main_lang(), languages: vec![default_main_lang()] }
  }
}

/// Language part of a `language-region` code.
pub fn lang_root(lang: &str) -> &str {
  lang.split('-').next().unwrap_or(lang)
}

impl LanguageSettings {
  /// Map a requested language onto a configured one: exact match, then the
  /// language root, then the first configured region of that root, then
  /// the main language.
  pub fn resolve(&self, lang: &str) -> String {
    if self.languages.iter().any(|l| l == lang) {
      return lang.to_string();
    }
    let root = lang_root(lang);
    if root != lang && self.languages.iter().any(|l| l == root) {
      return root.to_string();
    }
    if let Some(regional) = self.languages.iter().find(|l| lang_root(l) == root) {
      return regional.clone();
    }
    self.main_lang.clone()
  }
}

/// Named responsive widths, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breakpoints(Vec<(String, u32)>);

impl Default for Breakpoints {
  fn default() -> Self {
    Self(vec![("sm".into(), 576), ("md".into(), 768), ("lg".into(), 992), ("xl".into(), 1200)])
  }
}

impl Breakpoints {
  pub fn from_value(value: &Value) -> Self {
    let Some(map) = value.as_object() else {
      return Self::default();
    };
    Self(
      map
        .iter()
        .filter_map(|(k, v)| {
          let px = v.as_u64().or_else(|| v.as_str().and_then(|s| s.trim_end_matches("px").parse().ok()))?;
          Some((k.clone(), u32::try_from(px).ok()?))
        })
        .collect(),
    )
  }

  pub fn get(&self, size: &str) -> Option<u32> {
    self.0.iter().find(|(name, _)| name == size).map(|(_, px)| *px)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
    self.0.iter().map(|(name, px)| (name.as_str(), *px))
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageEntry {
  #[serde(default)]
  pub path: String,
  #[serde(default)]
  pub label: String,
  #[serde(default)]
  pub url_name: Map<String, Value>,
  #[serde(default)]
  pub is_folder: bool,
}

impl PageEntry {
  fn label_for(&self, lang: &str) -> &str {
    match self.url_name.get(lang).and_then(Value::as_str) {
      Some(name) if !lang.is_empty() && !name.is_empty() => name,
      _ => &self.label,
    }
  }

  fn join(&self, leaf: &str) -> String {
    if self.path.is_empty() { leaf.to_string() } else { format!("{}/{leaf}", self.path) }
  }
}

/// Page names to folder paths, labels and localized URL names.
#[derive(Debug, Clone, Default)]
pub struct PageMap {
  entries: Vec<(String, PageEntry)>,
}

impl PageMap {
  pub fn from_value(value: &Value) -> Self {
    let entries = value
      .as_object()
      .map(|map| {
        map
          .iter()
          .filter_map(|(name, v)| {
            serde_json::from_value::<PageEntry>(v.clone()).ok().map(|e| (name.clone(), e))
          })
          .collect()
      })
      .unwrap_or_default();
    Self { entries }
  }

  pub fn get(&self, name: &str) -> Option<&PageEntry> {
    self.entries.iter().find(|(n, _)| n == name).map(|(_, e)| e)
  }

  /// Store path of a page file.
  pub fn file_path(&self, name: &str) -> Option<String> {
    self.get(name).map(|entry| format!("pages/{}.json", entry.join(name)))
  }

  /// Resolve a URL alias (page name, label or localized URL name) to the
  /// page's `folder/name`.
  pub fn name_from_url(&self, alias: &str) -> String {
    let leaf = alias.rsplit('/').next().unwrap_or(alias);
    if let Some(entry) = self.get(leaf) {
      return entry.join(leaf);
    }
    for (name, entry) in &self.entries {
      if entry.is_folder || entry.label.is_empty() {
        continue;
      }
      if entry.label == leaf || entry.url_name.values().any(|v| v.as_str() == Some(leaf)) {
        return entry.join(name);
      }
    }
    alias.to_string()
  }

  /// `folder/label` of a page in the given language.
  pub fn label(&self, alias: &str, lang: &str) -> String {
    let leaf = alias.rsplit('/').next().unwrap_or(alias);
    if leaf.is_empty() {
      return String::new();
    }
    if let Some(entry) = self.get(leaf) {
      return entry.join(entry.label_for(lang));
    }
    for (_, entry) in &self.entries {
      if entry.label == leaf || entry.url_name.values().any(|v| v.as_str() == Some(leaf)) {
        return entry.join(entry.label_for(lang));
      }
    }
    String::new()
  }

  /// Swap folder names for their normalized labels, keeping the leaf.
  pub fn replace_folder_labels(&self, page: &str) -> String {
    let Some((folders, leaf)) = page.rsplit_once('/') else {
      return page.to_string();
    };
    let mut out = String::new();
    for folder in folders.split('/') {
      let label = self.get(folder).map_or(folder, |e| if e.label.is_empty() { folder } else { &e.label });
      out.push_str(&normalize_page_name(label));
      out.push('/');
    }
    out.push_str(leaf);
    out
  }
}

/// Lowercase a label and make it safe as a path segment.
pub fn normalize_page_name(name: &str) -> String {
  let mut name = name.trim().to_lowercase();
  for needle in [" / ", "/", " ", "&", "@"] {
    name = name.replace(needle, "_");
  }
  name.replace('?', "")
}

/// Script settings for a core polyfill, used in static mode.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolyfillSpec {
  #[serde(default)]
  pub src: String,
  #[serde(default)]
  pub defer: bool,
  #[serde(default, rename = "async")]
  pub is_async: bool,
  /// Raw markup placed before the script tags.
  #[serde(default)]
  pub scripts: String,
  #[serde(default)]
  pub script: Option<ExtraScript>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtraScript {
  #[serde(default)]
  pub data: String,
  /// `pre` puts `data` before the script tag, anything else after.
  #[serde(default)]
  pub pos: String,
}

#[derive(Debug, Clone, Default)]
pub struct SiteSettings {
  pub languages: LanguageSettings,
  pub breakpoints: Breakpoints,
  pub pages: PageMap,
  pub base_head: Vec<Content>,
  pub fonts: FontSettings,
  pub polyfills: Vec<(String, PolyfillSpec)>,
}

impl SiteSettings {
  /// Missing files fall back to defaults; malformed ones are errors.
  pub fn load(store: &dyn ContentStore) -> EngineResult<Self> {
    let languages = match store.read_json(LANGUAGES_FILE)? {
      Some(v) => serde_json::from_value(v).unwrap_or_default(),
      None => LanguageSettings::default(),
    };
    let breakpoints =
      store.read_json(BREAKPOINTS_FILE)?.map(|v| Breakpoints::from_value(&v)).unwrap_or_default();
    let pages = store.read_json(PAGE_MAP_FILE)?.map(|v| PageMap::from_value(&v)).unwrap_or_default();
    let base_head = store
      .read_json(BASE_PAGE_FILE)?
      .and_then(|mut v| v.get_mut("head").map(Value::take))
      .and_then(|head| serde_json::from_value(head).ok())
      .unwrap_or_default();
    let fonts = store.read_json(FONTS_FILE)?.map(|v| FontSettings::from_value(&v)).unwrap_or_default();
    let polyfills = store
      .read_json(POLYFILLS_FILE)?
      .and_then(|v| v.as_object().cloned())
      .map(|map| {
        map
          .into_iter()
          .filter_map(|(k, v)| serde_json::from_value(v).ok().map(|spec| (k, spec)))
          .collect()
      })
      .unwrap_or_default();

    Ok(Self { languages, breakpoints, pages, base_head, fonts, polyfills })
  }

  pub fn polyfill(&self, name: &str) -> Option<&PolyfillSpec> {
    self.polyfills.iter().find(|(n, _)| n == name).map(|(_, spec)| spec)
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::store::MemoryStore;

  fn langs() -> LanguageSettings {
    LanguageSettings {
      main_lang: "en".into(),
      languages: vec!["en".into(), "fr-CA".into(), "es".into()],
    }
  }

  #[test]
  fn resolve_language_tiers() {
    let l = langs();
    assert_eq!(l.resolve("es"), "es");
    assert_eq!(l.resolve("es-MX"), "es");
    assert_eq!(l.resolve("fr"), "fr-CA");
    assert_eq!(l.resolve("de"), "en");
  }

  #[test]
  fn breakpoints_keep_declaration_order() {
    let bp = Breakpoints::from_value(&json!({ "md": 700, "sm": "500px" }));
    let names: Vec<_> = bp.iter().collect();
    assert_eq!(names, vec![("md", 700), ("sm", 500)]);
    assert_eq!(bp.get("lg"), None);
  }

  #[test]
  fn page_map_lookups() {
    let map = PageMap::from_value(&json!({
      "blog": { "path": "", "label": "My Blog", "isFolder": true },
      "post": { "path": "blog", "label": "first-post", "urlName": { "fr": "premier" } },
      "home": { "path": "", "label": "index" }
    }));
    assert_eq!(map.file_path("post").as_deref(), Some("pages/blog/post.json"));
    assert_eq!(map.file_path("home").as_deref(), Some("pages/home.json"));
    assert_eq!(map.label("post", "fr"), "blog/premier");
    assert_eq!(map.label("post", "en"), "blog/first-post");
    assert_eq!(map.label("premier", "en"), "blog/first-post");
    assert_eq!(map.name_from_url("first-post"), "blog/post");
    assert_eq!(map.replace_folder_labels("blog/premier"), "my_blog/premier");
  }

  #[test]
  fn load_with_defaults() {
    let store = MemoryStore::new().with_json(
      LANGUAGES_FILE,
      json!({ "mainLang": "fr", "languages": ["fr", "en"] }),
    );
    let settings = SiteSettings::load(&store).unwrap();
    assert_eq!(settings.languages.main_lang, "fr");
    assert_eq!(settings.breakpoints.get("xl"), Some(1200));
    assert!(settings.base_head.is_empty());
  }
}

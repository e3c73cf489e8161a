/* src/server/engine/rust/src/localizer.rs */

//! Localized values, dictionary lookups, widget parameter resolution and
//! link construction.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use regex::{Captures, Regex};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use weft_markup::{is_truthy, stringify};

use crate::error::{EngineError, EngineResult};
use crate::fonts::FontCollector;
use crate::node::DICTIONARY_PARAM;
use crate::package::{ParamSpec, ParamType};
use crate::settings::lang_root;
use crate::site::{RenderMode, Site};
use crate::store::ContentStore;

/// Dictionary files (`dictionaries/<name>/<lang>.json`), loaded once per
/// process. Missing files are cached as empty.
#[derive(Debug, Default)]
pub struct DictionaryCache {
  dicts: RwLock<HashMap<String, Arc<Value>>>,
}

impl DictionaryCache {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn load(&self, store: &dyn ContentStore, name: &str, lang: &str) -> EngineResult<Arc<Value>> {
    let key = format!("{name}/{lang}");
    if let Some(dict) = self.dicts.read().unwrap_or_else(PoisonError::into_inner).get(&key) {
      return Ok(Arc::clone(dict));
    }
    if lang.is_empty() || lang.contains('.') || lang.contains('/') {
      return Err(EngineError::InvalidLanguage(lang.to_string()));
    }

    let path = format!("dictionaries/{key}.json");
    let dict = match store.read_json(&path)? {
      Some(dict) => dict,
      None => {
        debug!(dictionary = name, lang, "dictionary file not found");
        Value::Null
      }
    };
    let dict = Arc::new(dict);
    self.dicts.write().unwrap_or_else(PoisonError::into_inner).insert(key, Arc::clone(&dict));
    Ok(dict)
  }
}

/// Entry `index` of a dictionary, whether stored as an object or a list.
fn dictionary_entry(dict: &Value, index: &str) -> Option<String> {
  let entry = match dict {
    Value::Object(map) => map.get(index)?,
    Value::Array(items) => items.get(index.parse::<usize>().ok()?)?,
    _ => return None,
  };
  match entry.get("value")? {
    Value::Null => None,
    value => Some(stringify(value)),
  }
}

static EMPTY_TAG: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(
    r"(?i)<(\w+)[^>]*>(?:[\p{Z}\p{C}]|<br\b[^>]*>|&(?:(?:nb|thin|zwnb|e[nm])sp|zwnj|#xfeff|#xa0|#160|#65279);)*</(\w+)>",
  )
  .unwrap()
});

/// Remove inline elements holding only whitespace, `<br>` or space
/// entities. Removal repeats so emptied parents go too.
pub fn strip_empty_tags(html: &str) -> String {
  let mut out = html.to_string();
  loop {
    let next = EMPTY_TAG
      .replace_all(&out, |caps: &Captures| {
        if caps[1].eq_ignore_ascii_case(&caps[2]) { String::new() } else { caps[0].to_string() }
      })
      .into_owned();
    if next == out {
      return out;
    }
    out = next;
  }
}

/// Localizer bound to one render: a site, a page and a language.
pub struct Localizer<'a> {
  site: &'a Site,
  page: &'a str,
  lang: &'a str,
}

impl<'a> Localizer<'a> {
  pub fn new(site: &'a Site, page: &'a str, lang: &'a str) -> Self {
    Self { site, page, lang }
  }

  pub fn lang(&self) -> &str {
    self.lang
  }

  /// Localize in the render language with the page dictionary.
  pub fn localize(&self, value: &Value) -> String {
    self.localize_with(value, None, None)
  }

  /// Inline value for `lang`, then an inline reference `$<lang>`, then the
  /// bare reference `$`, then the same walk in the main language.
  pub fn localize_with(&self, value: &Value, lang: Option<&str>, dictionary: Option<&str>) -> String {
    let map = match value {
      Value::String(s) => return s.clone(),
      Value::Object(map) => map,
      _ => return String::new(),
    };
    let lang = lang.unwrap_or(self.lang);

    if let Some(inline) = map.get(lang) {
      return match inline {
        Value::String(s) => s.clone(),
        Value::Object(obj) => obj.get("value").map(stringify).unwrap_or_default(),
        _ => String::new(),
      };
    }
    if let Some(reference) = map.get(&format!("${lang}")) {
      return self.dictionary_value(reference, lang, dictionary);
    }
    if let Some(reference) = map.get("$").filter(|r| !r.is_null() && r.as_str() != Some("")) {
      return self.dictionary_value(reference, lang, dictionary);
    }

    let main = self.site.settings.languages.main_lang.as_str();
    if lang == main { String::new() } else { self.localize_with(value, Some(main), dictionary) }
  }

  fn dictionary_value(&self, reference: &Value, lang: &str, dictionary: Option<&str>) -> String {
    let index = match reference {
      Value::Number(n) => n.to_string(),
      Value::String(s) if s.trim().parse::<f64>().is_ok() => s.trim().to_string(),
      Value::Object(obj) => return obj.get("value").map(stringify).unwrap_or_default(),
      _ => return String::new(),
    };
    self.lookup(&index, lang, dictionary, true).unwrap_or_default()
  }

  /// Dictionary lookup with language fallback: exact language, its root,
  /// configured regions of that root, then the main language. Without
  /// `fallback` only the exact language is tried and a miss is `None`.
  pub fn lookup(&self, index: &str, lang: &str, dictionary: Option<&str>, fallback: bool) -> Option<String> {
    let name = match dictionary.filter(|d| !d.is_empty()) {
      Some(name) => name,
      None => self.page.rsplit('/').next().unwrap_or(self.page),
    };
    if name.is_empty() {
      return fallback.then(String::new);
    }

    if let Some(value) = self.entry(name, lang, index) {
      return Some(value);
    }
    if !fallback {
      return None;
    }

    let root = lang_root(lang);
    if root != lang
      && let Some(value) = self.entry(name, root, index)
    {
      return Some(value);
    }

    let languages = &self.site.settings.languages;
    for regional in &languages.languages {
      if lang_root(regional) == root
        && regional != root
        && regional != lang
        && let Some(value) = self.entry(name, regional, index)
      {
        return Some(value);
      }
    }

    Some(self.entry(name, &languages.main_lang, index).unwrap_or_default())
  }

  fn entry(&self, dictionary: &str, lang: &str, index: &str) -> Option<String> {
    match self.site.dictionaries.load(self.site.store.as_ref(), dictionary, lang) {
      Ok(dict) => dictionary_entry(&dict, index),
      Err(e) => {
        warn!(dictionary, lang, error = %e, "dictionary unavailable");
        None
      }
    }
  }

  /// Resolve a widget's parameters against its declared schema. Inline
  /// values win over `$name` references; unset parameters get the declared
  /// empty value. Undeclared parameters pass through untouched.
  pub fn localized_settings(
    &self,
    params: &Map<String, Value>,
    schema: &[ParamSpec],
    widget_class: &str,
    fonts: &mut FontCollector,
  ) -> Map<String, Value> {
    let mut params = params.clone();
    if !schema.is_empty() {
      self.localize_params(&mut params, schema, widget_class, fonts);
    }
    params
  }

  fn localize_params(
    &self,
    params: &mut Map<String, Value>,
    schema: &[ParamSpec],
    widget_class: &str,
    fonts: &mut FontCollector,
  ) {
    for info in schema.iter().filter(|p| !p.name.is_empty()) {
      let name = info.name.as_str();
      if info.is_group() {
        if !info.data.is_empty() {
          self.localize_params(params, &info.data, widget_class, fonts);
        }
        continue;
      }

      let empty = info.default_value();
      let current = params.get(name).filter(|v| !v.is_null()).cloned();

      if current.is_none()
        && let Some(reference) = params.get(&format!("${name}")).filter(|v| !v.is_null()).cloned()
      {
        let value = self.referenced_param(&reference, info.kind);
        params.insert(name.to_string(), value);
        continue;
      }

      let dictionary = params.get(DICTIONARY_PARAM).and_then(Value::as_str).map(str::to_string);
      let dictionary = dictionary.as_deref();
      let localized = |v: &Value| self.localize_with(v, None, dictionary);

      let value = match (info.kind, current) {
        (ParamType::Media | ParamType::WebsiteAssets, Some(v)) => {
          Value::String(self.site.assets.asset_url(&localized(&v), widget_class))
        }
        (ParamType::File | ParamType::Upload, Some(v)) => Value::String(localized(&v)),
        (ParamType::Text, Some(v)) => Value::String(strip_empty_tags(&localized(&v))),
        (ParamType::Href, Some(v)) => Value::String(self.parse_href(&Value::String(localized(&v)))),
        (ParamType::Table, Some(v)) if v.is_array() => v,
        (ParamType::Table, _) => Value::String("No data source linked.".into()),
        (ParamType::Font, Some(v)) if is_truthy(&v) => {
          fonts.activate(&stringify(&v), widget_class, self.site.fonts.as_ref());
          v
        }
        (_, Some(v)) if v != Value::String(String::new()) => v,
        _ => empty,
      };
      params.insert(name.to_string(), value);
    }
  }

  /// Value of a `$name` parameter fetched through the data resolver.
  pub fn referenced_param(&self, reference: &Value, kind: ParamType) -> Value {
    let data = self.site.data.fetch(reference).unwrap_or(Value::Null);

    match kind {
      ParamType::Media => match first_scalar(&data) {
        Value::String(asset) => Value::String(self.site.assets.file_asset_url(&asset)),
        _ => Value::String(String::new()),
      },
      ParamType::Href => match first_scalar(&data) {
        value @ Value::String(_) => Value::String(self.parse_href(&value)),
        _ => Value::String(String::new()),
      },
      ParamType::Pages => Value::Array(self.parse_pages(&data)),
      ParamType::Widgets => Value::Array(self.parse_widgets(&data)),
      ParamType::Table => {
        let Value::Array(mut rows) = data else {
          return Value::Array(Vec::new());
        };
        let schema = reference.get("schema").and_then(Value::as_object);
        for row in rows.iter_mut().filter_map(Value::as_object_mut) {
          for (column, source) in schema.into_iter().flatten() {
            let Some(source) = source.as_str().filter(|s| s != column) else { continue };
            if let Some(value) = row.get(source).cloned() {
              row.insert(column.clone(), value);
            }
          }
        }
        Value::Array(rows)
      }
      _ => first_scalar(&data),
    }
  }

  fn parse_pages(&self, data: &Value) -> Vec<Value> {
    let Some(items) = data.as_array() else {
      return Vec::new();
    };
    items
      .iter()
      .filter_map(Value::as_object)
      .map(|item| {
        let mut ele = item.clone();
        if let Some(children) = item.get("data") {
          ele.insert("data".into(), Value::Array(self.parse_pages(children)));
        } else {
          let label = item.get("label").cloned().unwrap_or(Value::Null);
          ele.insert("href".into(), Value::String(self.parse_href(&label)));
          let file = item.get("file").and_then(Value::as_str).unwrap_or_default();
          self.append_page_meta(&mut ele, file);
        }
        Value::Object(ele)
      })
      .collect()
  }

  fn append_page_meta(&self, ele: &mut Map<String, Value>, file: &str) {
    let contents = match self.site.store.read_json(file) {
      Ok(contents) => contents.unwrap_or(Value::Null),
      Err(e) => {
        warn!(file, error = %e, "page listing entry unreadable");
        Value::Null
      }
    };
    let params = contents.get("params");
    for (source, target) in [("pageTitle", "title"), ("urlName", "urlName")] {
      let value = params
        .and_then(|p| p.get(source))
        .filter(|v| is_truthy(v))
        .map(|v| self.localize(v))
        .unwrap_or_default();
      ele.insert(target.into(), Value::String(value));
    }
  }

  fn parse_widgets(&self, data: &Value) -> Vec<Value> {
    let Some(pages) = data.as_object() else {
      return Vec::new();
    };
    let mut out = Vec::new();
    for (page, widgets) in pages {
      for elem in widgets.as_array().into_iter().flatten() {
        let id = elem.get("id").map(stringify).unwrap_or_default();
        let href = self.parse_href(&Value::String(format!("{}#{id}", page.trim())));
        let name = elem.get("widgetName").map_or_else(|| id.clone(), stringify);
        let mut ele = Map::new();
        ele.insert("href".into(), Value::String(href));
        ele.insert("widgetName".into(), Value::String(name));
        out.push(Value::Object(ele));
      }
    }
    out
  }

  /// Turn a link parameter into a URL: external and `mailto:` links pass
  /// through, names with a dot are file assets, the rest are site pages.
  pub fn parse_href(&self, value: &Value) -> String {
    if !is_truthy(value) {
      return String::new();
    }
    let href = self.localize(value);
    if href.trim().is_empty() {
      return String::new();
    }
    if href.contains("//") || href.starts_with("mailto:") {
      href
    } else if href.contains('.') {
      self.site.assets.file_asset_url(&href)
    } else {
      match self.site.options.mode {
        RenderMode::Static => self.static_page_href(&href),
        RenderMode::Dynamic => self.dynamic_page_href(&href),
      }
    }
  }

  fn dynamic_page_href(&self, href: &str) -> String {
    let link = PageLink::parse(href, self.lang);
    let page = if link.page.is_empty() { self.page } else { link.page.as_str() };

    let options = &self.site.options;
    let mut url = String::from("?");
    if !options.default_website {
      url.push_str(&options.name);
      url.push('/');
    }
    url.push_str(page);
    if !link.lang.is_empty() {
      url.push_str("&lang=");
      url.push_str(&link.lang);
    }
    if !link.hash.is_empty() {
      url.push('#');
      url.push_str(&link.hash);
    }
    url
  }

  fn static_page_href(&self, href: &str) -> String {
    let link = PageLink::parse(href, self.lang);
    let pages = &self.site.settings.pages;

    let label = if self.site.store.exists(&format!("pages/{href}.json")) {
      pages.label(href, "")
    } else {
      let page = if link.page.is_empty() { self.page } else { link.page.as_str() };
      pages.label(&pages.name_from_url(page), &link.lang)
    };
    let label = pages.replace_folder_labels(&label);

    let prefix = "../".repeat(self.page.matches('/').count());
    let mut url = format!("{prefix}{}/{label}.html", link.lang);
    if !link.hash.is_empty() {
      url.push('#');
      url.push_str(&link.hash);
    }
    url
  }
}

/// `page&key=value#hash` split into its parts.
struct PageLink {
  page: String,
  lang: String,
  hash: String,
}

impl PageLink {
  fn parse(href: &str, default_lang: &str) -> Self {
    let (query, hash) = href.split_once('#').unwrap_or((href, ""));
    // `&amp;` from rich-text editors
    let query = query.replace("amp;", "&");
    let mut parts = query.split('&');
    let page = parts.next().unwrap_or_default().to_string();
    let lang = parts
      .map(|part| part.replace(' ', ""))
      .find_map(|part| part.strip_prefix("lang=").map(str::to_string))
      .unwrap_or_else(|| default_lang.to_string());
    Self { page, lang, hash: hash.to_string() }
  }
}

fn first_scalar(data: &Value) -> Value {
  match data {
    Value::Array(items) => items.first().map(first_scalar).unwrap_or(Value::Null),
    Value::Object(map) => map.values().next().map(first_scalar).unwrap_or(Value::Null),
    other => other.clone(),
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::site::{SiteBuilder, SiteOptions};
  use crate::store::MemoryStore;

  fn site(store: MemoryStore, mode: RenderMode) -> Site {
    let store = store.with_json(
      "settings/languages.json",
      json!({ "mainLang": "en", "languages": ["en", "fr", "fr-CA", "fr-BE", "es"] }),
    );
    SiteBuilder::new(store)
      .options(SiteOptions { mode, name: "acme".into(), ..SiteOptions::default() })
      .build()
      .unwrap()
  }

  fn dict_site(langs: &[&str]) -> Site {
    let mut store = MemoryStore::new();
    for lang in langs {
      store = store.with_json(
        format!("dictionaries/home/{lang}.json"),
        json!({ "7": { "value": format!("hello-{lang}") } }),
      );
    }
    site(store, RenderMode::Dynamic)
  }

  #[test]
  fn plain_and_inline_values() {
    let site = dict_site(&[]);
    let l = Localizer::new(&site, "home", "fr");
    assert_eq!(l.localize(&json!("Hi")), "Hi");
    assert_eq!(l.localize(&json!({ "en": "Hi", "fr": "Salut" })), "Salut");
    assert_eq!(l.localize(&json!({ "fr": { "value": "Allo" } })), "Allo");
    assert_eq!(l.localize(&json!({ "en": "Hi" })), "Hi");
    assert_eq!(l.localize(&json!({ "de": "Hallo" })), "");
    assert_eq!(l.localize(&json!(null)), "");
  }

  #[test]
  fn fallback_tiers() {
    let reference = json!({ "$": 7 });

    // exact language
    let site = dict_site(&["fr-CA", "fr", "fr-BE", "en"]);
    assert_eq!(Localizer::new(&site, "home", "fr-CA").localize(&reference), "hello-fr-CA");
    // language root
    let site = dict_site(&["fr", "fr-BE", "en"]);
    assert_eq!(Localizer::new(&site, "home", "fr-CA").localize(&reference), "hello-fr");
    // sibling region
    let site = dict_site(&["fr-BE", "en"]);
    assert_eq!(Localizer::new(&site, "home", "fr-CA").localize(&reference), "hello-fr-BE");
    // main language
    let site = dict_site(&["en"]);
    assert_eq!(Localizer::new(&site, "home", "fr-CA").localize(&reference), "hello-en");
    assert_eq!(Localizer::new(&site, "home", "es").localize(&reference), "hello-en");
  }

  #[test]
  fn lookup_without_fallback_signals_miss() {
    let site = dict_site(&["en"]);
    let l = Localizer::new(&site, "home", "fr");
    assert_eq!(l.lookup("7", "fr", None, false), None);
    assert_eq!(l.lookup("7", "en", None, false).as_deref(), Some("hello-en"));
    assert_eq!(l.lookup("99", "fr", None, true).as_deref(), Some(""));
  }

  #[test]
  fn language_reference_and_named_dictionary() {
    let store = MemoryStore::new().with_json("dictionaries/master/fr.json", json!([{ "value": "zero" }]));
    let site = site(store, RenderMode::Dynamic);
    let l = Localizer::new(&site, "home", "fr");
    assert_eq!(l.localize_with(&json!({ "$fr": 0 }), None, Some("master")), "zero");
    assert_eq!(l.localize_with(&json!({ "$fr": { "value": "direct" } }), None, None), "direct");
  }

  #[test]
  fn bare_reference_reaches_the_first_entry() {
    let store = MemoryStore::new().with_json("dictionaries/home/en.json", json!([{ "value": "first" }]));
    let site = site(store, RenderMode::Dynamic);
    let l = Localizer::new(&site, "home", "en");
    assert_eq!(l.localize(&json!({ "$": 0 })), "first");
    assert_eq!(l.localize(&json!({ "$": "0" })), "first");
    assert_eq!(l.localize(&json!({ "$en": 0 })), "first");
    assert_eq!(l.localize(&json!({ "$": "" })), "");
  }

  #[test]
  fn invalid_dictionary_language() {
    let cache = DictionaryCache::new();
    let err = cache.load(&MemoryStore::new(), "home", "../x").unwrap_err();
    assert_eq!(err, EngineError::InvalidLanguage("../x".into()));
  }

  #[test]
  fn strips_nested_empty_tags() {
    assert_eq!(strip_empty_tags("<p><b> </b><br></p>text"), "text");
    assert_eq!(strip_empty_tags("<p>&nbsp;</p><p>keep</p>"), "<p>keep</p>");
    assert_eq!(strip_empty_tags("<b>a</b>"), "<b>a</b>");
  }

  #[test]
  fn hrefs_dynamic() {
    let site = dict_site(&[]);
    let l = Localizer::new(&site, "home", "fr");
    assert_eq!(l.parse_href(&json!("https://x.test/a")), "https://x.test/a");
    assert_eq!(l.parse_href(&json!("mailto:a@b.c")), "mailto:a@b.c");
    assert_eq!(l.parse_href(&json!("docs/guide.pdf")), "/assets/docs/guide.pdf");
    assert_eq!(l.parse_href(&json!("about#team")), "?about&lang=fr#team");
    assert_eq!(l.parse_href(&json!("about&amp;lang=en")), "?about&lang=en");
    assert_eq!(l.parse_href(&json!("#top")), "?home&lang=fr#top");
    assert_eq!(l.parse_href(&json!("")), "");
  }

  #[test]
  fn hrefs_static() {
    let store = MemoryStore::new().with_json(
      "settings/glot_pageSettings.json",
      json!({
        "about": { "path": "company", "label": "About", "urlName": { "fr": "a-propos" } },
        "company": { "label": "Our Company", "isFolder": true }
      }),
    );
    let site = site(store, RenderMode::Static);
    let l = Localizer::new(&site, "blog/post", "fr");
    assert_eq!(l.parse_href(&json!("about#team")), "../fr/our_company/a-propos.html#team");
  }

  #[test]
  fn settings_resolution() {
    let site = dict_site(&[]);
    let l = Localizer::new(&site, "home", "fr");
    let schema: Vec<ParamSpec> = serde_json::from_value(json!([
      { "name": "title", "type": "text" },
      { "name": "group", "type": "submenu", "data": [
        { "name": "link", "type": "href" },
        { "name": "size", "type": "dropdown", "options": [ { "value": "m", "defaultOption": true } ] }
      ] },
      { "name": "picture", "type": "media" }
    ]))
    .unwrap();
    let params = json!({ "title": { "en": "Hi", "fr": "<p> </p>Salut" }, "link": "about", "extra": 1 });

    let mut fonts = FontCollector::default();
    let out = l.localized_settings(params.as_object().unwrap(), &schema, "Banner", &mut fonts);
    assert_eq!(
      Value::Object(out),
      json!({ "title": "Salut", "link": "?about&lang=fr", "extra": 1, "size": "m", "picture": "" })
    );
  }
}

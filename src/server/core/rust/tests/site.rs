/* src/server/core/rust/tests/site.rs */

use std::path::Path;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tempfile::TempDir;
use weft_server::{RenderMode, ServerError, SiteOptions, SiteRenderer, WidgetRegistry};

fn write_json(root: &Path, rel: &str, value: &Value) {
  let path = root.join(rel);
  std::fs::create_dir_all(path.parent().unwrap()).unwrap();
  std::fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
}

fn site_folder() -> TempDir {
  let dir = tempfile::tempdir().unwrap();
  let root = dir.path();
  write_json(root, "settings/languages.json", &json!({ "mainLang": "en", "languages": ["en", "fr"] }));
  write_json(root, "settings/glot_pageSettings.json", &json!({ "home": { "path": "", "label": "Home" } }));
  write_json(
    root,
    "widgets/Text/settings.json",
    &json!({
      "widgetSettings": { "version": "2.1.0" },
      "widgetParams": [ { "name": "text", "type": "text" } ],
      "defaultStyle": { "margin": "0" }
    }),
  );
  write_json(
    root,
    "pages/home.json",
    &json!({
      "id": "home",
      "data": [ { "id": "t", "widget": "Text", "params": { "text": { "en": "Hello", "fr": "Bonjour" } } } ]
    }),
  );
  dir
}

fn open(dir: &TempDir, mode: RenderMode) -> SiteRenderer {
  let options = SiteOptions { mode, ..SiteOptions::default() };
  SiteRenderer::open(dir.path(), options, WidgetRegistry::with_builtins()).unwrap()
}

#[test]
fn renders_pages_from_disk() {
  let dir = site_folder();
  let renderer = open(&dir, RenderMode::Dynamic);

  let en = renderer.render_page("home", "en").unwrap();
  assert!(en.html.contains("<div id=\"home\"><div id=\"t\" class=\"Text\">Hello</div></div>"));

  let fr = renderer.render_page("home", "fr").unwrap();
  assert_eq!(fr.lang, "fr");
  assert!(fr.html.contains(">Bonjour</div>"));
}

#[test]
fn second_render_comes_from_the_cache() {
  let dir = site_folder();
  let renderer = open(&dir, RenderMode::Dynamic);

  let first = renderer.render_page("home", "en").unwrap();
  // the cached document survives edits on disk
  std::fs::remove_file(dir.path().join("pages/home.json")).unwrap();
  let second = renderer.render_page("/home/", "en").unwrap();

  assert!(Arc::ptr_eq(&first, &second));
  assert_eq!(renderer.cached_pages(), 1);

  renderer.clear_cache();
  assert!(renderer.render_page("home", "en").unwrap_err().is_not_found());
}

#[test]
fn unknown_languages_share_the_main_language_entry() {
  let dir = site_folder();
  let renderer = open(&dir, RenderMode::Dynamic);

  let de = renderer.render_page("home", "de").unwrap();
  let en = renderer.render_page("home", "en").unwrap();
  assert_eq!(de.lang, "en");
  assert!(Arc::ptr_eq(&de, &en));
}

#[test]
fn missing_and_malformed_pages() {
  let dir = site_folder();
  std::fs::write(dir.path().join("pages/broken.json"), "{ nope").unwrap();
  let renderer = open(&dir, RenderMode::Dynamic);

  assert!(renderer.render_page("nowhere", "en").unwrap_err().is_not_found());
  let err = renderer.render_page("broken", "en").unwrap_err();
  assert!(matches!(err, ServerError::Engine(weft_engine::EngineError::InvalidJson { .. })));
  assert_eq!(renderer.cached_pages(), 0);
}

#[test]
fn static_export_css() {
  let dir = site_folder();
  let renderer = open(&dir, RenderMode::Static);

  let css = renderer.export_css("home", "en").unwrap();
  assert!(css.contains(".Text {\nmargin:0;\n}"));

  let html = &renderer.render_page("home", "en").unwrap().html;
  assert!(html.contains("href=\"/styles/pages/home.css\""));
  assert!(html.contains("hreflang=\"fr\""));
}

#[test]
fn concurrent_renders_agree() {
  let dir = site_folder();
  let renderer = open(&dir, RenderMode::Dynamic);

  let pages: Vec<_> = std::thread::scope(|s| {
    let handles: Vec<_> = (0..4).map(|_| s.spawn(|| renderer.render_page("home", "fr").unwrap())).collect();
    handles.into_iter().map(|h| h.join().unwrap()).collect()
  });
  assert!(pages.windows(2).all(|w| w[0].html == w[1].html));
  assert_eq!(renderer.cached_pages(), 1);
}

#[test]
fn missing_site_folder() {
  let dir = tempfile::tempdir().unwrap();
  let result = SiteRenderer::open(dir.path().join("absent"), SiteOptions::default(), WidgetRegistry::with_builtins());
  assert!(matches!(result, Err(ServerError::SiteNotFound(_))));
}

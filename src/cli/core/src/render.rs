/* src/cli/core/src/render.rs */

use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;
use weft_server::{RenderMode, SiteRenderer, WidgetRegistry};

use crate::config::WeftConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
  Html,
  Css,
}

/// Open the configured site folder. CSS export always renders in static mode.
pub fn open_site(config: &WeftConfig, base_dir: &Path, output: Output) -> Result<SiteRenderer> {
  let root = config.site_root(base_dir);
  let mut options = config.site_options();
  if output == Output::Css {
    options.mode = RenderMode::Static;
  }
  debug!(root = %root.display(), "opening site");
  SiteRenderer::open(&root, options, WidgetRegistry::with_builtins())
    .with_context(|| format!("failed to open site {}", root.display()))
}

pub fn render(renderer: &SiteRenderer, page: &str, lang: Option<&str>, output: Output) -> Result<String> {
  let lang = lang.map_or_else(|| renderer.site().settings().languages.main_lang.clone(), str::to_string);
  let text = match output {
    Output::Html => renderer.render_page(page, &lang).map(|p| p.html.clone()),
    Output::Css => renderer.export_css(page, &lang),
  };
  text.with_context(|| format!("failed to render page \"{page}\""))
}

pub fn write_output(out: &Path, text: &str) -> Result<()> {
  if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
    std::fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
  }
  std::fs::write(out, text).with_context(|| format!("failed to write {}", out.display()))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
  }

  fn project() -> tempfile::TempDir {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    write(root, "site/settings/languages.json", r#"{ "mainLang": "fr", "languages": ["fr", "en"] }"#);
    write(
      root,
      "site/widgets/Text/settings.json",
      r#"{ "widgetParams": [ { "name": "text", "type": "text" } ], "defaultStyle": { "padding": "1px" } }"#,
    );
    write(
      root,
      "site/pages/home.json",
      r#"{ "id": "home", "data": [ { "id": "t", "widget": "Text", "params": { "text": { "en": "Hi", "fr": "Salut" } } } ] }"#,
    );
    tmp
  }

  #[test]
  fn renders_in_the_main_language_by_default() {
    let tmp = project();
    let renderer = open_site(&WeftConfig::default(), tmp.path(), Output::Html).unwrap();

    let html = render(&renderer, "home", None, Output::Html).unwrap();
    assert!(html.contains("<html lang=\"fr\">"));
    assert!(html.contains(">Salut</div>"));

    let html = render(&renderer, "home", Some("en"), Output::Html).unwrap();
    assert!(html.contains(">Hi</div>"));
  }

  #[test]
  fn css_export_uses_static_mode() {
    let tmp = project();
    let renderer = open_site(&WeftConfig::default(), tmp.path(), Output::Css).unwrap();
    let css = render(&renderer, "home", None, Output::Css).unwrap();
    assert!(css.contains(".Text {\npadding:1px;\n}"));
  }

  #[test]
  fn missing_page_reports_its_name() {
    let tmp = project();
    let renderer = open_site(&WeftConfig::default(), tmp.path(), Output::Html).unwrap();
    let err = render(&renderer, "contact", None, Output::Html).unwrap_err();
    assert_eq!(err.to_string(), "failed to render page \"contact\"");
  }

  #[test]
  fn missing_site_folder() {
    let tmp = tempfile::tempdir().unwrap();
    let err = open_site(&WeftConfig::default(), tmp.path(), Output::Html).unwrap_err();
    assert!(err.to_string().starts_with("failed to open site"));
  }

  #[test]
  fn output_creates_parent_folders() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("dist/fr/home.html");
    write_output(&out, "<html></html>").unwrap();
    assert_eq!(std::fs::read_to_string(out).unwrap(), "<html></html>");
  }
}

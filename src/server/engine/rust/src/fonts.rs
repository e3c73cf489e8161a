/* src/server/engine/rust/src/fonts.rs */

use serde::Deserialize;
use serde_json::{Map, Value};

/// Site font catalogue from the font settings file.
#[derive(Debug, Clone, Default)]
pub struct FontSettings {
  fonts: Vec<(String, FontEntry)>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FontEntry {
  #[serde(default)]
  pub name: String,
  /// Browser-provided fonts need no `@font-face`.
  #[serde(default)]
  pub default: bool,
  #[serde(default)]
  pub version: Option<String>,
  /// `Weight-Style` -> { format -> file }.
  #[serde(default)]
  pub styles: Map<String, Value>,
}

impl FontSettings {
  pub fn from_value(value: &Value) -> Self {
    let fonts = value
      .get("fonts")
      .and_then(Value::as_object)
      .map(|map| {
        map
          .iter()
          .filter_map(|(id, v)| serde_json::from_value(v.clone()).ok().map(|e| (id.clone(), e)))
          .collect()
      })
      .unwrap_or_default();
    Self { fonts }
  }

  pub fn contains(&self, family: &str) -> bool {
    self.fonts.iter().any(|(_, f)| f.name == family)
  }

  pub fn entries(&self) -> impl Iterator<Item = (&str, &FontEntry)> {
    self.fonts.iter().map(|(id, f)| (id.as_str(), f))
  }
}

/// Source of `@font-face` declarations for site and widget fonts.
pub trait FontProvider: Send + Sync {
  fn is_site_font(&self, family: &str) -> bool;

  /// One declaration block per requested site font that needs loading.
  fn font_faces(&self, families: &[String], static_mode: bool) -> Vec<String>;

  /// Faces shipped inside a widget package for `font`.
  fn widget_font_face(&self, _font: &str, _widget_class: &str) -> Option<String> {
    None
  }
}

/// Provider backed by the site font settings alone.
#[derive(Debug, Clone)]
pub struct SiteFonts {
  settings: FontSettings,
  root_url: String,
}

impl SiteFonts {
  pub fn new(settings: FontSettings, root_url: impl Into<String>) -> Self {
    Self { settings, root_url: root_url.into() }
  }

  fn face(&self, id: &str, entry: &FontEntry, static_mode: bool) -> String {
    let version = entry.version.as_deref().map(|v| format!("?v={v}")).unwrap_or_default();
    let src_dir = if static_mode { "../../" } else { self.root_url.as_str() };
    let mut css = String::new();

    for (style_key, files) in &entry.styles {
      let (weight, style) = style_key.split_once('-').unwrap_or((style_key.as_str(), ""));
      let style = if style.eq_ignore_ascii_case("italic") { "italic" } else { "normal" };
      css.push_str(&format!("@font-face {{\n font-family:'{}';\n", entry.name));
      let mut src = String::from("src:");
      for (format, file) in files.as_object().into_iter().flatten() {
        let Some(file) = file.as_str() else { continue };
        let url = format!("{src_dir}fonts/{id}/{file}");
        match format.as_str() {
          "eot" => {
            css.push_str(&format!("src:url('{url}') format('eot');"));
            src.push_str(&format!("url('{url}{version}#iefix') format('eot');"));
          }
          "woff" | "woff2" => src.push_str(&format!("url('{url}{version}') format('{format}');")),
          "ttf" => src.push_str(&format!(
            "url('{url}{version}#iefix') format('embedded-opentype'), url('{url}{version}') format('truetype');"
          )),
          "otf" => src.push_str(&format!("url('{url}{version}') format('opentype');")),
          "svg" => src.push_str(&format!("url('{url}#{}{version}') format('svg');", entry.name)),
          _ => {}
        }
      }
      css.push_str(&format!(
        "{src}\nfont-weight:{};\nfont-style:{style};font-display: swap;\n}}\n",
        font_weight(weight)
      ));
    }

    if static_mode { css } else { format!("<style data-font-id='{id}'>\n{css}</style>") }
  }
}

impl FontProvider for SiteFonts {
  fn is_site_font(&self, family: &str) -> bool {
    self.settings.contains(family)
  }

  fn font_faces(&self, families: &[String], static_mode: bool) -> Vec<String> {
    let mut faces = Vec::new();
    for family in families {
      for (id, entry) in self.settings.entries() {
        if entry.name == *family && !entry.default {
          faces.push(self.face(id, entry, static_mode));
        }
      }
    }
    faces
  }
}

/// CSS numeric weight for a weight name such as `SemiBold`.
pub fn font_weight(name: &str) -> u16 {
  match name.to_ascii_lowercase().as_str() {
    "thin" => 100,
    "extralight" => 200,
    "light" => 300,
    "medium" => 500,
    "semibold" => 600,
    "bold" => 700,
    "extrabold" => 800,
    "black" => 900,
    _ => 400,
  }
}

/// Fonts requested during one render.
#[derive(Debug, Default)]
pub struct FontCollector {
  families: Vec<String>,
  widget_faces: Vec<(String, String, String)>,
}

impl FontCollector {
  /// A `font-family` seen in collected CSS.
  pub fn collect(&mut self, family: &str) {
    if !family.is_empty() && !self.families.iter().any(|f| f == family) {
      self.families.push(family.to_string());
    }
  }

  /// A font chosen through a widget parameter: either a site font or one
  /// bundled with the widget.
  pub fn activate(&mut self, font: &str, widget_class: &str, provider: &dyn FontProvider) {
    if font.is_empty() {
      return;
    }
    if provider.is_site_font(font) {
      self.collect(font);
      return;
    }
    let known = self.widget_faces.iter().any(|(class, f, _)| class == widget_class && f == font);
    if !known && let Some(face) = provider.widget_font_face(font, widget_class) {
      self.widget_faces.push((widget_class.to_string(), font.to_string(), face));
    }
  }

  pub fn font_faces(&self, provider: &dyn FontProvider, static_mode: bool) -> Vec<String> {
    provider.font_faces(&self.families, static_mode)
  }

  pub fn widget_fonts(&self) -> String {
    let css: String = self.widget_faces.iter().map(|(_, _, face)| face.as_str()).collect();
    if css.is_empty() { css } else { format!("<style class=\"widgetFonts\">{css}</style>") }
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn fonts() -> SiteFonts {
    let settings = FontSettings::from_value(&json!({
      "fonts": {
        "lato": {
          "name": "Lato",
          "version": "2",
          "styles": { "Bold-Italic": { "woff2": "lato-bold-italic.woff2" } }
        },
        "arial": { "name": "Arial", "default": true, "styles": {} }
      }
    }));
    SiteFonts::new(settings, "/")
  }

  #[test]
  fn static_face_uses_relative_urls() {
    let faces = fonts().font_faces(&["Lato".into()], true);
    assert_eq!(faces.len(), 1);
    let face = &faces[0];
    assert!(face.starts_with("@font-face {\n font-family:'Lato';"));
    assert!(face.contains("url('../../fonts/lato/lato-bold-italic.woff2?v=2') format('woff2');"));
    assert!(face.contains("font-weight:700;"));
    assert!(face.contains("font-style:italic;"));
  }

  #[test]
  fn default_fonts_are_not_loaded() {
    assert!(fonts().font_faces(&["Arial".into()], false).is_empty());
  }

  #[test]
  fn dynamic_face_wrapped_in_style() {
    let faces = fonts().font_faces(&["Lato".into()], false);
    assert!(faces[0].starts_with("<style data-font-id='lato'>"));
    assert!(faces[0].contains("url('/fonts/lato/"));
  }

  #[test]
  fn collector_dedups_families() {
    let provider = fonts();
    let mut collector = FontCollector::default();
    collector.collect("Lato");
    collector.activate("Lato", "Banner", &provider);
    collector.activate("Unknown", "Banner", &provider);
    assert_eq!(collector.font_faces(&provider, true).len(), 1);
    assert_eq!(collector.widget_fonts(), "");
  }

  #[test]
  fn weight_names() {
    assert_eq!(font_weight("SemiBold"), 600);
    assert_eq!(font_weight("Regular"), 400);
    assert_eq!(font_weight("black"), 900);
  }
}

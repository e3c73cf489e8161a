/* src/server/engine/rust/src/style.rs */

//! Responsive CSS collected during a render: package themes, default
//! widget styles, theme classes chosen per instance, inline `css` blocks
//! and developer CSS, bucketed per breakpoint.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::{Map, Value};
use tracing::warn;
use weft_markup::{format_style_value, stringify};

use crate::error::EngineResult;
use crate::fonts::FontCollector;
use crate::package::{WidgetPackage, client_class};
use crate::settings::Breakpoints;
use crate::site::{RenderMode, Site};

const GLUE: &str = "\n";
const CUSTOM_CSS: &str = "customCss";
const CUSTOM_SCSS: &str = "customSCSS";
const PROPERTY_LANG: &str = "propertyLang";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Size {
  Generic,
  Sm,
  Md,
  Lg,
  Xl,
}

impl Size {
  pub const RESPONSIVE: [Size; 4] = [Size::Sm, Size::Md, Size::Lg, Size::Xl];
  pub const ALL: [Size; 5] = [Size::Generic, Size::Sm, Size::Md, Size::Lg, Size::Xl];

  pub fn key(self) -> &'static str {
    match self {
      Self::Generic => "generic",
      Self::Sm => "sm",
      Self::Md => "md",
      Self::Lg => "lg",
      Self::Xl => "xl",
    }
  }

  pub fn from_key(key: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|s| s.key() == key)
  }
}

/// CSS fragments per breakpoint, in insertion order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StyleBuckets([Vec<String>; 5]);

impl StyleBuckets {
  pub fn push(&mut self, size: Size, fragment: impl Into<String>) {
    self.0[size as usize].push(fragment.into());
  }

  pub fn get(&self, size: Size) -> &[String] {
    &self.0[size as usize]
  }

  pub fn extend(&mut self, other: &StyleBuckets) {
    for size in Size::ALL {
      self.0[size as usize].extend(other.get(size).iter().cloned());
    }
  }

  pub fn is_empty(&self) -> bool {
    self.0.iter().all(Vec::is_empty)
  }

  /// Every bucket joined, breakpoints in order. Responsive fragments
  /// carry their own media queries.
  pub fn merged(&self) -> String {
    Size::ALL.into_iter().map(|size| self.get(size).join(GLUE)).collect()
  }
}

/// Rules generated from one style declaration.
#[derive(Debug, Default, Clone)]
pub struct Stylings {
  pub rules: StyleBuckets,
  /// `customCss` found in the declaration.
  pub custom: StyleBuckets,
  pub fonts: Vec<String>,
}

/// Default styles per widget class, shared by all renders of a site.
#[derive(Debug, Default)]
pub struct StyleCache {
  defaults: RwLock<HashMap<String, Arc<DefaultStyle>>>,
}

#[derive(Debug)]
pub struct DefaultStyle {
  pub name: String,
  pub stylings: Stylings,
}

/// CSS text builder for one site: breakpoints, asset URLs and render mode.
#[derive(Clone, Copy)]
pub struct CssBuilder<'a> {
  site: &'a Site,
}

impl<'a> CssBuilder<'a> {
  pub fn new(site: &'a Site) -> Self {
    Self { site }
  }

  fn breakpoints(&self) -> &'a Breakpoints {
    &self.site.settings.breakpoints
  }

  fn min_width(&self, size: Size) -> u32 {
    self
      .breakpoints()
      .get(size.key())
      .or_else(|| Breakpoints::default().get(size.key()))
      .unwrap_or_default()
  }

  /// Opening of a breakpoint block, closed by `}`.
  pub fn media_query(&self, size: Size) -> String {
    match size {
      Size::Generic => String::new(),
      size => format!("@media (min-width: {}px) {{", self.min_width(size)),
    }
  }

  /// Expand a style declaration: breakpoint keys (`sm`..`xl`) hold their
  /// own property maps, everything else is generic.
  pub fn stylings(&self, content: &Map<String, Value>, selector: &str, widget_class: &str) -> Stylings {
    let mut content = content.clone();
    content.remove(CUSTOM_SCSS);

    let mut out = Stylings::default();
    if let Some(custom) = content.remove(CUSTOM_CSS) {
      collect_custom_css(&custom, &mut out.custom);
    }

    for size in Size::RESPONSIVE {
      if let Some(Value::Object(props)) = content.remove(size.key())
        && !props.is_empty()
      {
        self.properties(&props, selector, widget_class, size, &mut out);
      }
    }
    if !content.is_empty() {
      self.properties(&content, selector, widget_class, Size::Generic, &mut out);
    }
    out
  }

  fn properties(
    &self,
    content: &Map<String, Value>,
    selector: &str,
    widget_class: &str,
    size: Size,
    out: &mut Stylings,
  ) {
    let mut content = content.clone();
    if let Some(Value::Object(langs)) = content.remove(PROPERTY_LANG) {
      for (lang, props) in &langs {
        if let Some(props) = props.as_object() {
          self.rule(props, &format!("{selector}:lang({lang})"), widget_class, size, out);
        }
      }
    }
    self.rule(&content, selector, widget_class, size, out);
  }

  fn rule(&self, content: &Map<String, Value>, selector: &str, widget_class: &str, size: Size, out: &mut Stylings) {
    let open = match size {
      Size::Generic => format!("{selector} {{"),
      size => format!("{} {selector} {{", self.media_query(size)),
    };
    out.rules.push(size, open);

    let mut nested = Vec::new();
    for (attr, value) in content {
      if attr.starts_with([':', '>', '~', '+', ' ']) {
        nested.push((format!("{selector}{attr}"), value));
        continue;
      }
      if attr == "classes" || attr == "hover" {
        continue;
      }
      let value = match attr.as_str() {
        "background-image" => self.background_image(value, widget_class),
        "font-family" => {
          let family = stringify(value);
          if !family.is_empty() && !out.fonts.contains(&family) {
            out.fonts.push(family);
          }
          value.clone()
        }
        _ => value.clone(),
      };
      if let Some(value) = format_style_value(attr, &value) {
        out.rules.push(size, format!("{attr}:{value};"));
      }
    }
    out.rules.push(size, if size == Size::Generic { "}" } else { "} }" });

    for (selector, value) in nested {
      if let Some(props) = value.as_object() {
        self.rule(props, &selector, widget_class, size, out);
      }
    }
  }

  fn background_image(&self, value: &Value, widget_class: &str) -> Value {
    let Some(image) = value.as_str().filter(|v| !v.is_empty() && *v != "none") else {
      return value.clone();
    };
    let url = match self.site.options.mode {
      RenderMode::Static => format!("../../assets/{image}"),
      RenderMode::Dynamic => self.site.assets.asset_url(image, widget_class),
    };
    Value::String(format!("url('{url}')"))
  }

  /// Developer CSS: the generic bucket as is, breakpoints in media blocks.
  pub fn custom_css(&self, custom: &StyleBuckets) -> String {
    let mut out = custom.get(Size::Generic).join(GLUE);
    for size in Size::RESPONSIVE {
      let css = custom.get(size);
      if !css.is_empty() {
        out.push_str(&self.media_query(size));
        out.push_str(&css.join(GLUE));
        out.push('}');
      }
    }
    out
  }
}

/// `customCss` is either one generic string or a map of breakpoint strings.
fn collect_custom_css(css: &Value, out: &mut StyleBuckets) {
  match css {
    Value::Object(map) => {
      for (size, value) in map {
        if let Some(size) = Size::from_key(size) {
          out.push(size, stringify(value));
        }
      }
    }
    Value::String(s) if !s.is_empty() => out.push(Size::Generic, s.clone()),
    _ => {}
  }
}

#[derive(Debug)]
struct ThemeClass {
  widget_class: String,
  key: String,
  rules: StyleBuckets,
}

/// Render-scoped style state.
pub struct StyleCollector<'a> {
  site: &'a Site,
  css: CssBuilder<'a>,
  pub fonts: FontCollector,
  defaults: Vec<Arc<DefaultStyle>>,
  themes: Vec<ThemeClass>,
  package_themes: Vec<Vec<(Size, String)>>,
  inline: StyleBuckets,
  custom: StyleBuckets,
  initialized: HashSet<String>,
}

impl<'a> StyleCollector<'a> {
  pub fn new(site: &'a Site) -> Self {
    Self {
      site,
      css: CssBuilder::new(site),
      fonts: FontCollector::default(),
      defaults: Vec::new(),
      themes: Vec::new(),
      package_themes: Vec::new(),
      inline: StyleBuckets::default(),
      custom: StyleBuckets::default(),
      initialized: HashSet::new(),
    }
  }

  fn absorb(&mut self, stylings: &Stylings) {
    self.custom.extend(&stylings.custom);
    for family in &stylings.fonts {
      self.fonts.collect(family);
    }
  }

  /// Class-level styles: themes shipped in the package and its default
  /// style, once per class.
  pub fn init_widget_class(&mut self, pkg: &WidgetPackage) {
    if !self.initialized.insert(pkg.class.clone()) {
      return;
    }
    let short = pkg.short_name().to_string();
    self.collect_package_theme(&pkg.predefined_style, &short);
    for (key, theme) in &pkg.widget_classes {
      if let Some(theme) = theme.as_object() {
        self.collect_package_theme(theme, key);
      }
    }

    let default = self.default_style(pkg);
    self.absorb(&default.stylings);
    self.defaults.push(default);
  }

  fn default_style(&self, pkg: &WidgetPackage) -> Arc<DefaultStyle> {
    let cache = &self.site.styles.defaults;
    if let Some(style) = cache.read().unwrap_or_else(PoisonError::into_inner).get(&pkg.class) {
      return Arc::clone(style);
    }
    let name = pkg.name().to_string();
    let stylings = self.css.stylings(&pkg.default_style, &format!(".{name}"), &pkg.class);
    let style = Arc::new(DefaultStyle { name, stylings });
    cache.write().unwrap_or_else(PoisonError::into_inner).insert(pkg.class.clone(), Arc::clone(&style));
    style
  }

  fn collect_package_theme(&mut self, content: &Map<String, Value>, selector: &str) {
    let mut theme = Vec::new();
    for size in Size::RESPONSIVE {
      let mut css = String::new();
      if let Some(props) = content.get(size.key()).and_then(Value::as_object).filter(|p| !p.is_empty()) {
        css.push_str(&format!(".{selector}{{"));
        for (key, value) in props {
          css.push_str(&format!("{key}: {};", stringify(value)));
        }
        css.push('}');
      }
      if let Some(extra) = content.get(CUSTOM_CSS).and_then(|c| c.get(size.key())).and_then(Value::as_str) {
        css.push_str(extra);
      }
      if !css.is_empty() {
        theme.push((size, css));
      }
    }
    if !theme.is_empty() {
      self.package_themes.push(theme);
    }
  }

  /// CSS classes for one widget instance. Collects its theme classes,
  /// inline `css` and developer CSS along the way.
  pub fn widget_css_classes(
    &mut self,
    id: &str,
    pkg: &WidgetPackage,
    widget_styles: Option<&Value>,
    css: Option<&Value>,
    custom_code: Option<&Value>,
  ) -> EngineResult<Vec<String>> {
    let js_class = client_class(&pkg.class);
    let mut classes = vec![js_class.clone()];

    for style in widget_styles.and_then(Value::as_array).into_iter().flatten() {
      let Some(kind) = style.get("type").and_then(Value::as_str) else { continue };
      let name = style.get("name").map(stringify).unwrap_or_default();
      let key = match kind {
        "generic" | "predefined" => name.clone(),
        _ => format!("{js_class}_{name}"),
      };
      classes.push(key.clone());

      let known = self.themes.iter().any(|t| t.widget_class == pkg.class && t.key == key);
      if known || kind == "predefined" {
        continue;
      }
      let content = match kind {
        "custom" => pkg.custom_classes.get(&name).cloned(),
        "generic" => self.site.store.read_json(&format!("classes/{name}.json"))?,
        other => {
          warn!(widget_class = %pkg.class, theme = %name, kind = other, "unknown theme type");
          continue;
        }
      };
      let content = content.and_then(|c| c.as_object().cloned()).unwrap_or_default();
      let selector = if kind == "generic" { format!(".{name}") } else { format!(".{key}") };
      let stylings = self.css.stylings(&content, &selector, &pkg.class);
      self.absorb(&stylings);
      self.themes.push(ThemeClass { widget_class: pkg.class.clone(), key, rules: stylings.rules });
    }

    if let Some(css) = css.and_then(Value::as_object).filter(|c| !c.is_empty()) {
      let stylings = self.css.stylings(css, &format!(".{js_class}#{id}"), &pkg.class);
      self.absorb(&stylings);
      self.inline.extend(&stylings.rules);
    }

    if let Some(dev) = custom_code.and_then(|c| c.get(CUSTOM_CSS)) {
      collect_custom_css(dev, &mut self.custom);
    }
    Ok(classes)
  }

  fn wrap(&self, css: String, open: &str) -> String {
    if css.is_empty() || self.site.options.mode == RenderMode::Static {
      css
    } else {
      format!("{open}{css}</style>")
    }
  }

  /// `:root` custom properties for each breakpoint.
  pub fn variables(&self, wrap: bool) -> String {
    let vars: String =
      self.css.breakpoints().iter().map(|(size, px)| format!("--page-env-breakpoint-{size}:{px}px;")).collect();
    if vars.is_empty() {
      return vars;
    }
    let css = format!(":root {{ {vars} }}");
    if wrap { self.wrap(css, "<style class='variables'>") } else { css }
  }

  /// Themes shipped inside widget packages.
  pub fn widget_themes(&self) -> String {
    let mut out = String::new();
    for theme in &self.package_themes {
      for (size, css) in theme {
        out.push_str(&self.css.media_query(*size));
        out.push_str(css);
        out.push('}');
      }
    }
    out
  }

  pub fn custom_css(&self) -> String {
    self.css.custom_css(&self.custom)
  }

  pub fn default_styles(&self, wrap: bool) -> String {
    let mut out = String::new();
    for style in &self.defaults {
      let css = style.stylings.rules.merged();
      if wrap {
        out.push_str(&self.wrap(css, &format!("<style class=\"defaultStyle\" data-widget='{}'>", style.name)));
      } else {
        out.push_str(&css);
      }
    }
    out
  }

  /// Theme classes chosen by widget instances.
  pub fn widget_classes(&self, wrap: bool) -> String {
    let css: String = self.themes.iter().map(|t| t.rules.merged()).collect();
    if wrap { self.wrap(css, "<style class=\"widgetClasses\">") } else { css }
  }

  /// Instance-scoped `css` blocks.
  pub fn generic_css(&self, wrap: bool) -> String {
    let css = self.inline.merged();
    if wrap { self.wrap(css, "<style class=\"generic\">") } else { css }
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::site::{SiteBuilder, SiteOptions};
  use crate::store::MemoryStore;

  fn site(mode: RenderMode) -> Site {
    let store = MemoryStore::new()
      .with_json("classes/rounded.json", json!({ "border-radius": 4 }))
      .with_json(
        "widgets/Acme/Banner/settings.json",
        json!({
          "widgetSettings": { "version": "1.0.0" },
          "defaultStyle": { "color": "red", "font-family": "Lato" },
          "predefinedStyle": { "md": { "padding": "2px" } },
          "customClasses": { "dark": { "background-color": "#000" } }
        }),
      );
    SiteBuilder::new(store).options(SiteOptions { mode, ..SiteOptions::default() }).build().unwrap()
  }

  fn obj(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
  }

  #[test]
  fn generic_and_responsive_rules() {
    let site = site(RenderMode::Dynamic);
    let css = CssBuilder::new(&site);
    let out = css.stylings(&obj(json!({ "color": "red", "md": { "width": 10 } })), ".a", "W");

    assert_eq!(out.rules.get(Size::Generic), [".a {", "color:red;", "}"]);
    assert_eq!(out.rules.get(Size::Md), ["@media (min-width: 768px) { .a {", "width:10px;", "} }"]);
  }

  #[test]
  fn pseudo_selectors_and_languages() {
    let site = site(RenderMode::Dynamic);
    let css = CssBuilder::new(&site);
    let out = css.stylings(
      &obj(json!({
        "color": "red",
        ":hover": { "color": "blue" },
        "propertyLang": { "fr": { "width": "auto" } },
        "classes": "x",
        "customCss": ".x{}",
        "customSCSS": "$a: 1;"
      })),
      ".a",
      "W",
    );

    assert_eq!(
      out.rules.get(Size::Generic).join("\n"),
      ".a:lang(fr) {\nwidth:auto;\n}\n.a {\ncolor:red;\n}\n.a:hover {\ncolor:blue;\n}"
    );
    assert_eq!(out.custom.get(Size::Generic), [".x{}"]);
  }

  #[test]
  fn background_images_follow_mode() {
    let content = obj(json!({ "background-image": "sky.png" }));

    let site = site(RenderMode::Static);
    let out = CssBuilder::new(&site).stylings(&content, ".a", "W");
    assert_eq!(out.rules.get(Size::Generic)[1], "background-image:url('../../assets/sky.png');");

    let site = self::site(RenderMode::Dynamic);
    let out = CssBuilder::new(&site).stylings(&content, ".a", "W");
    assert_eq!(out.rules.get(Size::Generic)[1], "background-image:url('/assets/sky.png');");
  }

  #[test]
  fn themes_are_deduplicated() {
    let site = site(RenderMode::Static);
    let pkg = site.packages.load(site.store.as_ref(), "Acme/Banner").unwrap();
    let mut styles = StyleCollector::new(&site);
    let themes = json!([
      { "type": "custom", "name": "dark" },
      { "type": "generic", "name": "rounded" },
      { "type": "predefined", "name": "wide" }
    ]);

    let classes = styles.widget_css_classes("b1", &pkg, Some(&themes), None, None).unwrap();
    assert_eq!(classes, vec!["Acme__Banner", "Acme__Banner_dark", "rounded", "wide"]);
    styles.widget_css_classes("b2", &pkg, Some(&themes), None, None).unwrap();

    assert_eq!(
      styles.widget_classes(false),
      ".Acme__Banner_dark {\nbackground-color:#000;\n}.rounded {\nborder-radius:4px;\n}"
    );
  }

  #[test]
  fn class_styles_and_variables() {
    let site = site(RenderMode::Dynamic);
    let pkg = site.packages.load(site.store.as_ref(), "Acme/Banner").unwrap();
    let mut styles = StyleCollector::new(&site);
    styles.init_widget_class(&pkg);
    styles.init_widget_class(&pkg);

    assert_eq!(styles.widget_themes(), "@media (min-width: 768px) {.Banner{padding: 2px;}}");
    assert_eq!(
      styles.default_styles(true),
      "<style class=\"defaultStyle\" data-widget='Banner'>.Banner {\ncolor:red;\nfont-family:Lato;\n}</style>"
    );
    assert_eq!(
      styles.variables(true),
      "<style class='variables'>:root { --page-env-breakpoint-sm:576px;--page-env-breakpoint-md:768px;\
       --page-env-breakpoint-lg:992px;--page-env-breakpoint-xl:1200px; }</style>"
    );
  }

  #[test]
  fn custom_css_by_breakpoint() {
    let site = site(RenderMode::Dynamic);
    let pkg = site.packages.load(site.store.as_ref(), "Acme/Banner").unwrap();
    let mut styles = StyleCollector::new(&site);
    let code = json!({ "customCss": { "generic": "a{}", "lg": "b{}" } });
    styles.widget_css_classes("x", &pkg, None, Some(&json!({ "color": "red" })), Some(&code)).unwrap();

    assert_eq!(styles.custom_css(), "a{}@media (min-width: 992px) {b{}}");
    assert_eq!(styles.generic_css(true), "<style class=\"generic\">.Acme__Banner#x {\ncolor:red;\n}</style>");
  }
}

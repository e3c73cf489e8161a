/* src/server/engine/rust/src/composer.rs */

//! Per-render code collection: widget CSS and JS files, shared libraries,
//! on-ready code, polyfills and head HTML, assembled into the `<head>`
//! block and the closing script block of a page.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::{Map, Value};
use weft_markup::is_truthy;

use crate::error::EngineResult;
use crate::library::{LibMode, LibraryResolver, ResolvedLib};
use crate::localizer::Localizer;
use crate::node::{Content, REPLACE_SITE_WIDGET_PARAM};
use crate::package::{WidgetPackage, normalize_class};
use crate::site::{RenderMode, Site};
use crate::style::StyleCollector;

const EXPORT_STYLES: &str = "styles";
const POLYFILL_IO: &str = "https://polyfill.io/v3/polyfill.min.js?features=default%2C";
const VIEWPORT_META: &str =
  r#"<meta name="viewport" content="width=device-width, initial-scale=1, shrink-to-fit=no">"#;

static STYLE_TAG: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?is)<style\b[^>]*>(.*?)</style>").unwrap());

/// Client-side widget to instantiate once the document is ready.
#[derive(Debug, Clone, Default)]
pub struct JsTarget {
  /// HTML id of the element the client object attaches to.
  pub holder_id: String,
  pub class: String,
  /// Method called after construction. `None` means `render`; an empty
  /// name only creates the object.
  pub method: Option<String>,
  /// Constructor options, `{}` when absent.
  pub options: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CssFile {
  url: String,
  path: String,
}

pub struct PageComposer<'a> {
  site: &'a Site,
  page: &'a str,
  lang: &'a str,
  pub(crate) styles: StyleCollector<'a>,
  libraries: LibraryResolver,
  initialized: HashSet<String>,
  css_files: Vec<CssFile>,
  js_files: Vec<String>,
  on_ready: Vec<String>,
  inline_js: Vec<String>,
  polyfills: Vec<String>,
  core_polyfills: Vec<String>,
  head_html: Vec<String>,
  js_widgets: HashSet<(String, String)>,
}

impl<'a> PageComposer<'a> {
  pub fn new(site: &'a Site, page: &'a str, lang: &'a str) -> Self {
    Self {
      site,
      page,
      lang,
      styles: StyleCollector::new(site),
      libraries: LibraryResolver::new(),
      initialized: HashSet::new(),
      css_files: Vec::new(),
      js_files: Vec::new(),
      on_ready: Vec::new(),
      inline_js: Vec::new(),
      polyfills: Vec::new(),
      core_polyfills: Vec::new(),
      head_html: Vec::new(),
      js_widgets: HashSet::new(),
    }
  }

  fn static_mode(&self) -> bool {
    self.site.options.mode == RenderMode::Static
  }

  /// Register everything a widget class needs on the page. Runs once per
  /// class; later calls only return the package.
  pub fn init_widget_class(&mut self, class: &str) -> EngineResult<Arc<WidgetPackage>> {
    let store = self.site.store.as_ref();
    let pkg = self.site.packages.load(store, class)?;
    if !self.initialized.insert(pkg.class.clone()) {
      return Ok(pkg);
    }

    let css_file = pkg.css_file();
    let css_path = pkg.file_path(&css_file);
    if store.read_raw(&css_path).is_some_and(|css| !css.is_empty()) {
      let url = self.site.assets.widget_url(&format!("{}/{css_file}", pkg.class));
      let file = CssFile { url: format!("{url}?v={}", pkg.version()), path: css_path };
      if !self.css_files.contains(&file) {
        self.css_files.push(file);
      }
    }

    let lineage = self.site.packages.lineage(store, &pkg.class)?;
    let mut names: Vec<String> = Vec::new();
    for ancestor in lineage.iter().rev() {
      for name in ancestor.js_files() {
        if !name.is_empty() && !names.contains(&name) {
          names.push(name);
        }
      }
    }
    for name in names {
      // nearest package shipping the file wins
      let owner = lineage.iter().find(|p| store.exists(&p.file_path(&format!("js/{name}"))));
      if let Some(owner) = owner {
        let url = self.site.assets.widget_url(&format!("{}/js/{name}", owner.class));
        let url = format!("{url}?v={}", owner.version());
        if !self.js_files.contains(&url) {
          self.js_files.push(url);
        }
      }
    }

    if let Some(code) = pkg.on_ready_code() {
      self.on_ready.push(code);
    }

    let libs = self.site.packages.extended_libs(store, &pkg.class)?;
    self.libraries.request(&libs.css, LibMode::Css, &pkg.class);
    self.libraries.request(&libs.js, LibMode::Js, &pkg.class);

    for feature in &pkg.polyfill_io {
      if !self.polyfills.contains(feature) {
        self.polyfills.push(feature.clone());
      }
    }
    self.styles.init_widget_class(&pkg);
    self.core_polyfills.extend(pkg.polyfills.keys().cloned());
    Ok(pkg)
  }

  /// CSS classes of one widget instance, collecting its styles.
  pub fn widget_css_classes(
    &mut self,
    id: &str,
    pkg: &WidgetPackage,
    widget_styles: Option<&Value>,
    css: Option<&Value>,
    custom_code: Option<&Value>,
  ) -> EngineResult<Vec<String>> {
    self.styles.widget_css_classes(id, pkg, widget_styles, css, custom_code)
  }

  /// Queue client-side initialization of a widget. `false` when the
  /// class ships no client code.
  pub fn init_javascript_widget(&mut self, params: &Map<String, Value>, target: &JsTarget) -> EngineResult<bool> {
    if target.class.is_empty() {
      return Ok(false);
    }
    let pkg = self.site.packages.load(self.site.store.as_ref(), &target.class)?;
    if !pkg.has_client_code() {
      return Ok(false);
    }
    self.js_widgets.insert((pkg.class.clone(), target.holder_id.clone()));

    let js_class = pkg.js_class();
    let holder = &target.holder_id;
    let method = target.method.as_deref().unwrap_or("render");
    let params = Value::Object(params.clone()).to_string();

    let code = match pkg.client_method(method) {
      Some(m) if !method.is_empty() && m.is_static => format!("{js_class}.{method}('{holder}', {params});"),
      _ => {
        let options = target.options.as_ref().filter(|o| is_truthy(o)).map_or_else(|| "{}".to_string(), Value::to_string);
        let object = format!("new {js_class}('{holder}', {options})");
        if method.is_empty() { format!("{object};") } else { format!("({object}).{method}({params});") }
      }
    };
    self.add_on_ready_code(&code);
    Ok(true)
  }

  /// Whether client code was queued for the widget held by `holder_id`.
  pub fn has_js_code(&self, class: &str, holder_id: &str) -> bool {
    self.js_widgets.contains(&(normalize_class(class), holder_id.to_string()))
  }

  pub fn add_on_ready_code(&mut self, code: &str) {
    if !code.trim().is_empty() {
      self.on_ready.push(format!("(function() {{ {code} }})();"));
    }
  }

  pub fn add_inline_js(&mut self, code: impl Into<String>) {
    self.inline_js.push(code.into());
  }

  pub fn add_head_html(&mut self, html: impl Into<String>) {
    self.head_html.push(html.into());
  }

  /// Site head widgets followed by the page's. A site widget is dropped
  /// when the page carries the same class with `_replaceWebsiteWidget`.
  pub fn page_level_widgets(site_head: &[Content], page_head: &[Content]) -> Vec<Content> {
    let replaced = |class: &str| {
      page_head.iter().any(|item| match item {
        Content::Node(node) => {
          node.widget_class.as_deref() == Some(class)
            && node.params.get(REPLACE_SITE_WIDGET_PARAM).is_some_and(is_truthy)
        }
        _ => false,
      })
    };
    site_head
      .iter()
      .filter(|item| match item {
        Content::Node(node) => !node.widget_class.as_deref().is_some_and(replaced),
        _ => true,
      })
      .chain(page_head)
      .cloned()
      .collect()
  }

  fn library_urls(&self, mode: LibMode) -> Vec<String> {
    self
      .libraries
      .generic_libs(mode)
      .into_iter()
      .map(|lib| match lib {
        ResolvedLib::Url(url) => url,
        ResolvedLib::WidgetPath(path) => self.site.assets.widget_url(&path),
      })
      .collect()
  }

  /// Parts of the `<head>` element, empty parts left out.
  pub fn render_head(&self) -> Vec<String> {
    if self.static_mode() {
      return self.render_static_head();
    }
    let fonts = self.site.fonts.as_ref();
    let themes = self.styles.widget_themes();
    let custom = self.styles.custom_css();

    let head = [
      css_links(&self.library_urls(LibMode::Css)),
      css_links(&self.css_files.iter().map(|f| f.url.clone()).collect::<Vec<_>>()),
      self.head_html.join("\n"),
      if themes.is_empty() { themes } else { format!("<style widgetTheme=true>{themes}</style>") },
      if custom.is_empty() { custom } else { format!("<style class=\"dev\">{custom}</style>") },
      self.styles.variables(true),
      self.styles.default_styles(true),
      self.styles.widget_classes(true),
      self.styles.generic_css(true),
      self.styles.fonts.font_faces(fonts, false).join("\n"),
      self.styles.fonts.widget_fonts(),
    ];
    head.into_iter().filter(|part| !part.is_empty()).collect()
  }

  fn render_static_head(&self) -> Vec<String> {
    let export = if self.export_css().trim().is_empty() {
      String::new()
    } else {
      format!(r#"<link rel="stylesheet" type="text/css" href="{}">"#, self.export_url())
    };
    let head = [
      r#"<meta charset="utf-8">"#.to_string(),
      VIEWPORT_META.to_string(),
      self.head_html.join("\n"),
      self.href_langs().join("\n"),
      self.styles.fonts.widget_fonts(),
      css_links(&self.library_urls(LibMode::Css)),
      export,
    ];
    head.into_iter().filter(|part| !part.is_empty()).collect()
  }

  /// URL of the exported stylesheet: `styles/pages/<leaf page name>.css`.
  pub fn export_url(&self) -> String {
    let leaf = self.page.rsplit('/').next().unwrap_or(self.page);
    let leaf = leaf.split('.').next().unwrap_or(leaf);
    self.site.assets.site_url(&format!("{EXPORT_STYLES}/pages/{leaf}.css"))
  }

  /// Alternate links for every configured language, a generic one per
  /// language root and `x-default` for the main language.
  pub fn href_langs(&self) -> Vec<String> {
    let localizer = Localizer::new(self.site, self.page, self.lang);
    let link = |lang: &str, hreflang: &str| {
      let href = localizer.parse_href(&Value::String(format!("{}&lang={lang}", self.page)));
      format!(r#"<link rel="alternate" href="{href}" hreflang="{hreflang}" />"#)
    };

    let settings = &self.site.settings.languages;
    let mut hrefs = Vec::new();
    // language root -> first regional variant, `None` once a bare root is configured
    let mut generics: Vec<(&str, Option<&str>)> = Vec::new();
    for lang in &settings.languages {
      hrefs.push(link(lang, lang));
      let (root, region) = match lang.split_once('-') {
        Some((root, _)) => (root, Some(lang.as_str())),
        None => (lang.as_str(), None),
      };
      match generics.iter_mut().find(|(code, _)| *code == root) {
        Some(slot) if region.is_none() => slot.1 = None,
        Some(_) => {}
        None => generics.push((root, region)),
      }
    }
    for (code, regional) in generics {
      if let Some(regional) = regional {
        hrefs.push(link(regional, code));
      }
    }
    if !settings.main_lang.is_empty() {
      hrefs.push(link(&settings.main_lang, "x-default"));
    }
    hrefs
  }

  /// Text of `<style>` elements found in the head HTML.
  fn head_styles(&self) -> String {
    let html = self.head_html.join("\n");
    STYLE_TAG.captures_iter(&html).map(|caps| caps[1].to_string()).collect()
  }

  /// The page CSS written to one file in static mode.
  pub fn export_css(&self) -> String {
    let store = self.site.store.as_ref();
    let bundle: String = self
      .css_files
      .iter()
      .filter_map(|file| store.read_raw(&file.path))
      .map(|css| css + "\n")
      .collect();
    let fonts = self.styles.fonts.font_faces(self.site.fonts.as_ref(), true).join("\n");

    [
      self.styles.variables(false),
      self.head_styles(),
      bundle,
      self.styles.default_styles(false),
      self.styles.widget_classes(false),
      fonts,
      self.styles.generic_css(false),
      self.styles.custom_css(),
    ]
    .join("\n")
  }

  /// Script block placed after the body markup.
  pub fn render_source_code(&self) -> String {
    let ready = self.on_ready.join("\n");
    let ready = ready.trim();
    let ready_js = if ready.is_empty() {
      String::new()
    } else {
      format!(
        "(function() {{ function onReady() {{ {ready} }} \
         (document.attachEvent ? document.readyState === 'complete' : document.readyState !== 'loading') \
         ? onReady() : document.addEventListener('DOMContentLoaded', onReady); }})();"
      )
    };
    let inline = if ready_js.is_empty() && self.inline_js.is_empty() {
      String::new()
    } else {
      [r#"<script type="text/javascript">"#.to_string(), self.inline_js.join("\n"), ready_js, "</script>".into()]
        .join("\n")
    };

    let mut source = vec![
      js_links(&self.library_urls(LibMode::Js)),
      js_links(&self.js_files),
      inline,
    ];
    if !self.polyfills.is_empty() {
      let features = self.polyfills.join("%2C");
      source.insert(0, format!("<script crossorigin='anonymous' src='{POLYFILL_IO}{features}'></script>"));
    }

    if self.static_mode() {
      let mut seen = HashSet::new();
      for name in self.core_polyfills.iter().filter(|n| seen.insert(n.as_str())) {
        let Some(spec) = self.site.settings.polyfill(name) else { continue };
        if !spec.scripts.is_empty() {
          source.insert(0, spec.scripts.clone());
        }
        if spec.src.is_empty() {
          continue;
        }
        let mut attributes = String::new();
        if spec.defer {
          attributes.push_str(" defer");
        }
        if spec.is_async {
          attributes.push_str(" async");
        }
        let mut script = format!("<script src='{}'{attributes}></script>", spec.src);
        if let Some(extra) = &spec.script {
          script = if extra.pos == "pre" {
            format!("{}\n{script}", extra.data)
          } else {
            format!("{script}\n{}", extra.data)
          };
        }
        source.insert(0, script);
      }
    }

    source.retain(|part| !part.is_empty());
    source.join("\n")
  }
}

fn css_links(urls: &[String]) -> String {
  urls.iter().map(|url| format!(r#"<link type="text/css" rel="stylesheet" href="{url}"/>"#)).collect::<Vec<_>>().join("\n")
}

fn js_links(urls: &[String]) -> String {
  urls.iter().map(|url| format!(r#"<script type="text/javascript" src="{url}"></script>"#)).collect::<Vec<_>>().join("\n")
}

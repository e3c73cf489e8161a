/* src/server/engine/rust/src/site.rs */

//! A site: its collaborators, settings and process-lifetime caches. Every
//! render borrows the site immutably and owns its own session state, so a
//! `Site` can be shared across threads.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::fonts::{FontProvider, SiteFonts};
use crate::localizer::DictionaryCache;
use crate::node::WidgetNode;
use crate::package::PackageCache;
use crate::renderer::{RenderSession, WidgetRegistry};
use crate::settings::SiteSettings;
use crate::store::{AssetResolver, ContentStore, DataResolver, NoData, UrlAssets};
use crate::style::StyleCache;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
  /// Pages served on request; links are query URLs.
  #[default]
  Dynamic,
  /// Pages exported to `.html` files with one stylesheet each.
  Static,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteOptions {
  /// Website name, prefixed to dynamic links when the host serves several.
  pub name: String,
  pub default_website: bool,
  pub mode: RenderMode,
  pub root_url: String,
  pub max_template_depth: usize,
}

impl Default for SiteOptions {
  fn default() -> Self {
    Self {
      name: String::new(),
      default_website: true,
      mode: RenderMode::Dynamic,
      root_url: "/".to_string(),
      max_template_depth: 8,
    }
  }
}

pub struct Site {
  pub(crate) store: Arc<dyn ContentStore>,
  pub(crate) assets: Arc<dyn AssetResolver>,
  pub(crate) data: Arc<dyn DataResolver>,
  pub(crate) fonts: Arc<dyn FontProvider>,
  pub(crate) widgets: WidgetRegistry,
  pub(crate) packages: PackageCache,
  pub(crate) dictionaries: DictionaryCache,
  pub(crate) styles: StyleCache,
  pub(crate) settings: SiteSettings,
  pub(crate) options: SiteOptions,
}

/// A page file parsed into its widget tree.
#[derive(Debug, Clone)]
pub struct Page {
  /// `folder/name`, used for dictionaries and relative links.
  pub name: String,
  /// Store path the tree was read from.
  pub path: String,
  pub tree: WidgetNode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
  /// Language the page was rendered in, after fallback.
  pub lang: String,
  pub html: String,
  /// Stylesheet for static export.
  pub css: String,
}

impl Site {
  pub fn settings(&self) -> &SiteSettings {
    &self.settings
  }

  pub fn options(&self) -> &SiteOptions {
    &self.options
  }

  /// Configured language closest to `lang`.
  pub fn resolve_lang(&self, lang: &str) -> String {
    self.settings.languages.resolve(lang)
  }

  /// Read `pages/<folder>/<name>.json`. The name may also be a page label
  /// or localized URL name.
  pub fn load_page(&self, name: &str) -> EngineResult<Page> {
    let name = name.trim_matches('/');
    if name.is_empty() || name.split('/').any(|s| s == ".." || s == ".") {
      return Err(EngineError::PageNotFound(name.to_string()));
    }

    let resolved = self.settings.pages.name_from_url(name);
    let candidates = if resolved == name { vec![resolved] } else { vec![resolved, name.to_string()] };
    for candidate in candidates {
      let path = format!("pages/{candidate}.json");
      if let Some(raw) = self.store.read_json(&path)? {
        let tree = WidgetNode::from_value(&path, raw)?;
        return Ok(Page { name: candidate, path, tree });
      }
    }
    Err(EngineError::PageNotFound(name.to_string()))
  }

  /// Render a full HTML document in a fresh session.
  pub fn render(&self, page: &Page, lang: &str) -> EngineResult<RenderedPage> {
    let lang = self.resolve_lang(lang);
    let (html, css) = RenderSession::new(self, &page.name, &lang).render_document(page.tree.clone())?;
    Ok(RenderedPage { lang, html, css })
  }
}

pub struct SiteBuilder {
  store: Arc<dyn ContentStore>,
  assets: Option<Arc<dyn AssetResolver>>,
  data: Option<Arc<dyn DataResolver>>,
  fonts: Option<Arc<dyn FontProvider>>,
  widgets: Option<WidgetRegistry>,
  options: SiteOptions,
}

impl SiteBuilder {
  pub fn new(store: impl ContentStore + 'static) -> Self {
    Self::from_store(Arc::new(store))
  }

  pub fn from_store(store: Arc<dyn ContentStore>) -> Self {
    Self { store, assets: None, data: None, fonts: None, widgets: None, options: SiteOptions::default() }
  }

  pub fn assets(mut self, assets: impl AssetResolver + 'static) -> Self {
    self.assets = Some(Arc::new(assets));
    self
  }

  pub fn data(mut self, data: impl DataResolver + 'static) -> Self {
    self.data = Some(Arc::new(data));
    self
  }

  pub fn fonts(mut self, fonts: impl FontProvider + 'static) -> Self {
    self.fonts = Some(Arc::new(fonts));
    self
  }

  pub fn widgets(mut self, widgets: WidgetRegistry) -> Self {
    self.widgets = Some(widgets);
    self
  }

  pub fn options(mut self, options: SiteOptions) -> Self {
    self.options = options;
    self
  }

  /// Load the site settings. Malformed settings files fail the build.
  pub fn build(self) -> EngineResult<Site> {
    let settings = SiteSettings::load(self.store.as_ref())?;
    let root_url = self.options.root_url.clone();
    let assets = self.assets.unwrap_or_else(|| Arc::new(UrlAssets::new(root_url.clone())));
    let fonts = self.fonts.unwrap_or_else(|| Arc::new(SiteFonts::new(settings.fonts.clone(), root_url)));

    Ok(Site {
      store: self.store,
      assets,
      data: self.data.unwrap_or_else(|| Arc::new(NoData)),
      fonts,
      widgets: self.widgets.unwrap_or_else(WidgetRegistry::with_builtins),
      packages: PackageCache::new(),
      dictionaries: DictionaryCache::new(),
      styles: StyleCache::default(),
      settings,
      options: self.options,
    })
  }
}

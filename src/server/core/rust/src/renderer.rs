/* src/server/core/rust/src/renderer.rs */

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info};
use weft_engine::{RenderedPage, Site, SiteBuilder, SiteOptions, WidgetRegistry};

use crate::errors::ServerResult;
use crate::store::{FsAssets, FsContentStore};

/// Rendered documents keyed by `(lang, page)`.
type RenderCache = RwLock<HashMap<(String, String), Arc<RenderedPage>>>;

/// Renders pages of one site and keeps every result for the life of the
/// process. Shared freely across threads.
pub struct SiteRenderer {
  site: Site,
  cache: RenderCache,
}

impl fmt::Debug for SiteRenderer {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let options = self.site.options();
    f.debug_struct("SiteRenderer")
      .field("name", &options.name)
      .field("mode", &options.mode)
      .field("cached_pages", &self.cached_pages())
      .finish()
  }
}

impl SiteRenderer {
  pub fn new(site: Site) -> Self {
    Self { site, cache: RwLock::new(HashMap::new()) }
  }

  /// Open a site folder with filesystem storage and asset lookup.
  pub fn open(root: impl Into<PathBuf>, options: SiteOptions, widgets: WidgetRegistry) -> ServerResult<Self> {
    let store = FsContentStore::open(root)?;
    let assets = FsAssets::new(store.root(), options.root_url.clone());
    info!(root = %store.root().display(), mode = ?options.mode, "site opened");
    let site = SiteBuilder::new(store).assets(assets).widgets(widgets).options(options).build()?;
    Ok(Self::new(site))
  }

  pub fn site(&self) -> &Site {
    &self.site
  }

  /// Full HTML document for `name`. Unknown languages fall back to the
  /// site's main language before the cache lookup.
  pub fn render_page(&self, name: &str, lang: &str) -> ServerResult<Arc<RenderedPage>> {
    let key = (self.site.resolve_lang(lang), name.trim_matches('/').to_string());

    if let Some(hit) = self.cache.read().unwrap_or_else(PoisonError::into_inner).get(&key) {
      debug!(page = %key.1, lang = %key.0, "render cache hit");
      return Ok(Arc::clone(hit));
    }

    let page = self.site.load_page(&key.1)?;
    let rendered = Arc::new(self.site.render(&page, &key.0)?);
    debug!(page = %page.name, lang = %rendered.lang, bytes = rendered.html.len(), "page rendered");

    let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
    // a concurrent render of the same key may have landed first
    Ok(Arc::clone(cache.entry(key).or_insert(rendered)))
  }

  /// Stylesheet text of the page for static export.
  pub fn export_css(&self, name: &str, lang: &str) -> ServerResult<String> {
    Ok(self.render_page(name, lang)?.css.clone())
  }

  pub fn cached_pages(&self) -> usize {
    self.cache.read().unwrap_or_else(PoisonError::into_inner).len()
  }

  pub fn clear_cache(&self) {
    self.cache.write().unwrap_or_else(PoisonError::into_inner).clear();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn assert_send_sync<T: Send + Sync>() {}

  #[test]
  fn renderer_is_shareable() {
    assert_send_sync::<SiteRenderer>();
  }

  #[test]
  fn debug_output_summarizes_the_site() {
    let store = weft_engine::MemoryStore::new();
    let site = SiteBuilder::new(store).build().unwrap();
    let renderer = SiteRenderer::new(site);
    assert_eq!(format!("{renderer:?}"), r#"SiteRenderer { name: "", mode: Dynamic, cached_pages: 0 }"#);
  }
}

/* src/server/core/rust/src/store.rs */

//! Site folders on disk: `pages/`, `settings/`, `widgets/`, `dictionaries/`,
//! `classes/` and `assets/` under one root.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use tracing::warn;
use weft_engine::{AssetResolver, ContentStore, UrlAssets};

use crate::errors::{ServerError, ServerResult};

/// Join a `/`-separated store path onto `root`. Paths that would leave the
/// root are refused.
fn resolve_under(root: &Path, rel: &str) -> Option<PathBuf> {
  let rel = Path::new(rel);
  if !rel.components().all(|c| matches!(c, Component::Normal(_))) {
    return None;
  }
  Some(root.join(rel))
}

#[derive(Debug, Clone)]
pub struct FsContentStore {
  root: PathBuf,
}

impl FsContentStore {
  pub fn open(root: impl Into<PathBuf>) -> ServerResult<Self> {
    let root = root.into();
    if !root.is_dir() {
      return Err(ServerError::SiteNotFound(root));
    }
    Ok(Self { root })
  }

  pub fn root(&self) -> &Path {
    &self.root
  }
}

impl ContentStore for FsContentStore {
  fn read_raw(&self, path: &str) -> Option<String> {
    let full = resolve_under(&self.root, path)?;
    match std::fs::read_to_string(&full) {
      Ok(contents) => Some(contents),
      Err(e) if e.kind() == ErrorKind::NotFound => None,
      Err(e) => {
        warn!(path = %full.display(), error = %e, "unreadable site file");
        None
      }
    }
  }

  fn exists(&self, path: &str) -> bool {
    resolve_under(&self.root, path).is_some_and(|p| p.is_file())
  }
}

/// Asset URLs that check the site folder: a site asset wins over a file of
/// the same name shipped in the widget package.
#[derive(Debug, Clone)]
pub struct FsAssets {
  root: PathBuf,
  urls: UrlAssets,
}

impl FsAssets {
  pub fn new(root: impl Into<PathBuf>, root_url: impl Into<String>) -> Self {
    Self { root: root.into(), urls: UrlAssets::new(root_url) }
  }

  fn is_file(&self, rel: &str) -> bool {
    resolve_under(&self.root, rel).is_some_and(|p| p.is_file())
  }
}

impl AssetResolver for FsAssets {
  fn site_url(&self, path: &str) -> String {
    self.urls.site_url(path)
  }

  fn asset_url(&self, name: &str, widget_class: &str) -> String {
    if name.is_empty() {
      return String::new();
    }
    if name.contains("//") || name.starts_with(&format!("{}assets/", self.urls.root_url())) {
      return name.to_string();
    }
    let packaged = format!("{widget_class}/assets/{name}");
    if !widget_class.is_empty() && !self.is_file(&format!("assets/{name}")) && self.is_file(&format!("widgets/{packaged}")) {
      return self.widget_url(&packaged);
    }
    self.file_asset_url(name)
  }
}

/* src/cli/core/src/config/types.rs */

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use serde::Deserialize;
use weft_server::{RenderMode, SiteOptions};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WeftConfig {
  #[serde(default)]
  pub site: SiteSection,
  #[serde(default)]
  pub render: RenderSection,
  #[serde(default)]
  pub log: LogSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteSection {
  /// Site folder, relative to the directory holding weft.toml.
  #[serde(default = "default_root")]
  pub root: String,
  #[serde(default)]
  pub name: String,
  #[serde(default = "default_true")]
  pub default_website: bool,
  #[serde(default = "default_root_url")]
  pub root_url: String,
}

impl Default for SiteSection {
  fn default() -> Self {
    Self { root: default_root(), name: String::new(), default_website: true, root_url: default_root_url() }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderSection {
  #[serde(default)]
  pub mode: RenderMode,
  #[serde(default = "default_max_template_depth")]
  pub max_template_depth: usize,
}

impl Default for RenderSection {
  fn default() -> Self {
    Self { mode: RenderMode::default(), max_template_depth: default_max_template_depth() }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSection {
  #[serde(default = "default_level")]
  pub level: String,
}

impl Default for LogSection {
  fn default() -> Self {
    Self { level: default_level() }
  }
}

fn default_root() -> String {
  "site".to_string()
}

fn default_true() -> bool {
  true
}

fn default_root_url() -> String {
  "/".to_string()
}

fn default_max_template_depth() -> usize {
  8
}

fn default_level() -> String {
  "info".to_string()
}

impl WeftConfig {
  pub fn validate(&self) -> Result<()> {
    if self.render.max_template_depth == 0 {
      bail!("render.max_template_depth must be at least 1");
    }
    if self.site.root.trim().is_empty() {
      bail!("site.root must not be empty");
    }
    Ok(())
  }

  pub fn site_root(&self, base_dir: &Path) -> PathBuf {
    base_dir.join(&self.site.root)
  }

  pub fn site_options(&self) -> SiteOptions {
    SiteOptions {
      name: self.site.name.clone(),
      default_website: self.site.default_website,
      mode: self.render.mode,
      root_url: self.site.root_url.clone(),
      max_template_depth: self.render.max_template_depth,
    }
  }
}

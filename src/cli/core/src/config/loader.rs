/* src/cli/core/src/config/loader.rs */

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use super::types::WeftConfig;

const CONFIG_FILE: &str = "weft.toml";

/// Walk up from `start` to the nearest weft.toml.
pub fn find_weft_config(start: &Path) -> Result<PathBuf> {
  let mut dir =
    start.canonicalize().with_context(|| format!("failed to canonicalize {}", start.display()))?;
  loop {
    let candidate = dir.join(CONFIG_FILE);
    if candidate.is_file() {
      return Ok(candidate);
    }
    if !dir.pop() {
      bail!("{CONFIG_FILE} not found (searched upward from {})", start.display());
    }
  }
}

pub fn load_weft_config(path: &Path) -> Result<WeftConfig> {
  let content =
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
  parse_weft_config(&content).with_context(|| format!("failed to parse {}", path.display()))
}

pub fn parse_weft_config(content: &str) -> Result<WeftConfig> {
  let config: WeftConfig = toml::from_str(content)?;
  config.validate()?;
  Ok(config)
}

/* src/server/engine/rust/src/error.rs */

use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

/// Failures that abort the render of one page. Anything stemming from
/// user-authored content degrades silently instead of landing here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
  #[error("invalid JSON in '{path}': {reason}")]
  InvalidJson { path: String, reason: String },

  #[error("page '{0}' not found")]
  PageNotFound(String),

  #[error("missing package settings for widget '{0}'")]
  MissingSchema(String),

  #[error("no widget registered for class '{0}'")]
  UnknownWidget(String),

  #[error("unknown library mode '{0}', expected 'css' or 'js'")]
  UnknownLibraryMode(String),

  #[error("invalid language '{0}'")]
  InvalidLanguage(String),

  #[error("master page cycle: {chain}")]
  TemplateCycle { chain: String },

  #[error("master page '{template}' exceeds the maximum template depth ({max_depth})")]
  TemplateDepth { template: String, max_depth: usize },

  #[error("invalid class settings for '{widget_class}': {reason}")]
  InvalidClassSettings { widget_class: String, reason: String },
}

impl EngineError {
  pub(crate) fn invalid_json(path: &str, err: &serde_json::Error) -> Self {
    Self::InvalidJson { path: path.to_string(), reason: err.to_string() }
  }
}

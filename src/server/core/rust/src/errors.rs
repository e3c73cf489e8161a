/* src/server/core/rust/src/errors.rs */

use std::path::PathBuf;

use thiserror::Error;
use weft_engine::EngineError;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Error, Debug)]
pub enum ServerError {
  #[error("site folder not found: {}", .0.display())]
  SiteNotFound(PathBuf),

  #[error("failed to read {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error(transparent)]
  Engine(#[from] EngineError),
}

impl ServerError {
  /// True for requests naming a page the site does not have.
  pub fn is_not_found(&self) -> bool {
    matches!(self, Self::Engine(EngineError::PageNotFound(_)))
  }
}

/* src/server/core/rust/src/lib.rs */

pub mod errors;
pub mod renderer;
pub mod store;

// Re-exports for ergonomic use
pub use errors::{ServerError, ServerResult};
pub use renderer::SiteRenderer;
pub use store::{FsAssets, FsContentStore};
pub use weft_engine::{RenderMode, RenderedPage, SiteOptions, WidgetRegistry};

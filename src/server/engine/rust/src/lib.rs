/* src/server/engine/rust/src/lib.rs */

pub mod builtin;
pub mod composer;
pub mod error;
pub mod fonts;
pub mod library;
pub mod localizer;
pub mod master;
pub mod node;
pub mod package;
pub mod renderer;
pub mod settings;
pub mod site;
pub mod store;
pub mod style;

// Public API re-exports
pub use builtin::{PassThrough, Text};
pub use composer::{JsTarget, PageComposer};
pub use error::{EngineError, EngineResult};
pub use fonts::{FontCollector, FontProvider, FontSettings, SiteFonts};
pub use library::{DependencyTally, LibKind, LibMode, LibraryRequest, LibraryResolver, SchemaType, version_compare};
pub use localizer::{DictionaryCache, Localizer, strip_empty_tags};
pub use master::MasterPageResolver;
pub use node::{Content, Params, SysParams, UnlockParams, WidgetNode};
pub use package::{PackageCache, ParamSpec, ParamType, WidgetPackage};
pub use renderer::{RenderSession, Widget, WidgetContext, WidgetRegistry};
pub use settings::{LanguageSettings, SiteSettings};
pub use site::{Page, RenderMode, RenderedPage, Site, SiteBuilder, SiteOptions};
pub use store::{AssetResolver, ContentStore, DataResolver, MemoryStore, NoData, UrlAssets};
pub use style::{CssBuilder, Size, StyleCollector};

#[cfg(test)]
mod tests;

/* src/server/engine/rust/src/builtin.rs */

use serde_json::{Map, Value};
use weft_markup::stringify;

use crate::node::Content;
use crate::renderer::{Widget, WidgetContext};

/// Renders the node's own data. Used for classes without a server side.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl Widget for PassThrough {
  fn render(&self, _ctx: &mut WidgetContext<'_, '_>, data: Option<&Content>, _params: &Map<String, Value>) -> Content {
    data.cloned().unwrap_or(Content::Scalar(Value::Null))
  }
}

/// Rich text from the `text` parameter, else the node's data.
#[derive(Debug, Clone, Copy, Default)]
pub struct Text;

impl Widget for Text {
  fn render(&self, ctx: &mut WidgetContext<'_, '_>, data: Option<&Content>, params: &Map<String, Value>) -> Content {
    match params.get("text") {
      Some(Value::String(text)) => Content::Markup(text.clone()),
      Some(text @ Value::Object(_)) => Content::Markup(ctx.localize(text)),
      Some(other) if !other.is_null() => Content::Markup(stringify(other)),
      _ => PassThrough.render(ctx, data, params),
    }
  }
}

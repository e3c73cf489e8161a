/* src/server/markup/rust/src/lib.rs */

mod element;
mod helpers;

pub use element::{AttrValue, Attributes, VOID_ELEMENTS, render_element};
pub use helpers::{escape_html, format_style_value, is_truthy, stringify};

#[cfg(test)]
mod tests;

/* src/cli/core/src/config/mod.rs */

mod loader;
mod types;

#[cfg(test)]
mod tests;

pub use loader::{find_weft_config, load_weft_config};
pub use types::WeftConfig;

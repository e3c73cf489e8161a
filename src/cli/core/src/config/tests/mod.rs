/* src/cli/core/src/config/tests/mod.rs */

use std::path::Path;

use weft_server::RenderMode;

use super::loader::parse_weft_config;
use super::*;

mod parsing;

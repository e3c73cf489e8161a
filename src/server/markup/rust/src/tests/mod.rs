/* src/server/markup/rust/src/tests/mod.rs */

mod elements;

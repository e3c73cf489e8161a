/* src/server/engine/rust/src/tests/mod.rs */

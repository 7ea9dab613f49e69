//! Integration tests for the upd binary.

mod common;
mod render_tests;
mod update_tests;

//! Manifest model.
//!
//! The manifest (`updfile.json` at the project root) declares command line
//! templates, source patterns and rules. It is parsed once per invocation and
//! validated up front so that later phases can index into it freely.

mod template;
mod types;

pub use template::*;
pub use types::*;

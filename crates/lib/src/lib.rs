//! upd-lib: the incremental build engine behind `upd`
//!
//! The engine turns a declarative manifest into up-to-date outputs:
//! - `manifest`: command line templates, source patterns and rules
//! - `pattern`: glob patterns with capture groups and `$N` output patterns
//! - `graph`: the target graph built from resolved rules
//! - `signature`: the persistent record used to decide staleness
//! - `execute`: the parallel scheduler that runs stale targets
//! - `depfile`: Makefile-style dependency files emitted by commands
//! - `update`: the orchestration tying the phases together

pub mod consts;
pub mod depfile;
pub mod execute;
pub mod graph;
pub mod manifest;
pub mod pattern;
pub mod signature;
pub mod update;
pub mod util;

//! Well-known file and directory names inside a project root.

/// Marker file identifying the project root.
pub const ROOT_MARKER: &str = ".updroot";

/// Manifest file, read from the project root.
pub const MANIFEST_FILE: &str = "updfile.json";

/// State directory holding the signature log and scratch files.
pub const STATE_DIR: &str = ".upd";

/// Append-only signature log, inside [`STATE_DIR`].
pub const LOG_FILE: &str = "log";

/// Temporary file the log is compacted into before being renamed.
pub const LOG_TMP_FILE: &str = "log.tmp";

/// Scratch directory for dependency files written by commands.
pub const DEPFILE_DIR: &str = "depfiles";

/// Buffer size used when hashing file contents.
pub const HASH_BUFFER_SIZE: usize = 8192;

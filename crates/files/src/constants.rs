//! Constants shared across the depot crate.

/// Configuration file looked up in the working directory when no explicit path is given.
pub const DEFAULT_CONFIG_FILENAME: &str = "depot.yaml";

/// Filename of each record written by the JSON record store.
pub const RECORD_FILENAME: &str = "file.json";

/// Path the destination parser reports for the backend root.
pub const ROOT_PATH: &str = "/";

/// Built-in retention policy, also the starting point `--config` copies
/// into a folder's `.prune` file.
pub const DEFAULT_RETENTION: &str = include_str!("../assets/default-retention.toml");

pub const DEFAULT_RETENTION_NAME: &str = "built-in default retention";

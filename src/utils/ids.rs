use rand::distributions::Alphanumeric;
use rand::Rng;

/// Lower-case alphanumeric suffix for generated ids.
pub fn random_suffix(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect()
}

/// `{prefix}-{unix_ms}-{suffix}`
pub fn timestamped_id(prefix: &str) -> String {
    format!("{}-{}-{}", prefix, chrono::Utc::now().timestamp_millis(), random_suffix(6))
}

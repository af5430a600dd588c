use std::sync::OnceLock;

fn env_true(key: &str) -> Option<bool> {
    std::env::var(key).ok().map(|val| {
        let trimmed = val.trim();
        !trimmed.is_empty() && !matches!(trimmed, "0" | "false" | "FALSE" | "False")
    })
}

fn bool_from_env(key: &str) -> bool {
    env_true(key).unwrap_or(false)
}

/// Whether resolvers may synthesize types for descriptors that have no
/// registered counterpart. On unless `RQ_DISABLE_TYPE_EMISSION` is set.
pub fn type_emission_enabled() -> bool {
    static EMIT: OnceLock<bool> = OnceLock::new();
    *EMIT.get_or_init(|| !bool_from_env("RQ_DISABLE_TYPE_EMISSION"))
}

/// Strict mapping rejects bag entries that have no matching member instead
/// of skipping them.
pub fn strict_mapping() -> bool {
    static STRICT: OnceLock<bool> = OnceLock::new();
    *STRICT.get_or_init(|| bool_from_env("RQ_STRICT_MAPPING"))
}

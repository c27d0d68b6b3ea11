//! Dataset version counter.
//!
//! A single row (`id = 1`) in `relatorios_meta` holds an epoch-seconds value
//! that clients poll to notice changes. Each touch writes
//! `max(now, previous + 1)`, so the value is epoch-like but strictly
//! increasing even for several writes within one second.

pub const META_TABLE: &str = "relatorios_meta";

pub(crate) const CREATE_META_TABLE: &str =
    "CREATE TABLE IF NOT EXISTS relatorios_meta (id INTEGER PRIMARY KEY, version BIGINT)";

pub(crate) const BUMP_VERSION: &str = r#"
    INSERT INTO relatorios_meta (id, version)
    VALUES (1, $1)
    ON CONFLICT (id) DO UPDATE SET version = CASE
        WHEN excluded.version > COALESCE(relatorios_meta.version, 0) THEN excluded.version
        ELSE COALESCE(relatorios_meta.version, 0) + 1
    END
    RETURNING version
"#;

pub(crate) const READ_VERSION: &str =
    "SELECT COALESCE(version, 0) FROM relatorios_meta WHERE id = 1";

/// Current Unix time in whole seconds.
pub fn now_epoch() -> i64 {
    chrono::Utc::now().timestamp()
}

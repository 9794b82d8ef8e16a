/// Name of the session cookie set by the auth endpoints
pub const SESSION_COOKIE: &str = "taskdeck_session";

/// Session identifier size in bytes (hex-encoded on the wire)
pub const SESSION_ID_SIZE: usize = 32;

/// Key derivation context for session cookie signing (BLAKE3)
pub const KDF_CONTEXT_SESSION_KEY: &str = "taskdeck-session-cookie-v1";

/// Default HTTP API port
pub const DEFAULT_HTTP_PORT: u16 = 3000;

/// Maximum request body size in bytes (1 MiB)
pub const MAX_BODY_SIZE: usize = 1024 * 1024;

/// Title length bounds for tasks, projects, meetings and notes
pub const MAX_TITLE_LEN: usize = 200;

/// Tag names are shorter than titles
pub const MAX_TAG_NAME_LEN: usize = 50;

pub const MAX_DESCRIPTION_LEN: usize = 2_000;

pub const MAX_NOTE_CONTENT_LEN: usize = 50_000;

pub const MAX_DISPLAY_NAME_LEN: usize = 100;

/// RFC 5321 upper bound on an address
pub const MAX_EMAIL_LEN: usize = 254;

pub const MIN_PASSWORD_LEN: usize = 8;

/// bcrypt ignores input past this many bytes
pub const MAX_PASSWORD_BYTES: usize = 72;

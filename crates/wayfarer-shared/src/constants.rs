/// Application name
pub const APP_NAME: &str = "Wayfarer";

/// Minimum length of a community / group / event title (trimmed, in chars)
pub const TITLE_MIN_LEN: usize = 3;

/// Maximum length of a title (trimmed, in chars)
pub const TITLE_MAX_LEN: usize = 50;

/// Maximum length of a chat message, post or comment body (in chars)
pub const MAX_MESSAGE_LENGTH: usize = 4_000;

/// Prefix of client-only identities created while the backend is unreachable
pub const MOCK_USER_PREFIX: &str = "mock-";

/// Default HTTP request timeout for the remote backend, in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// File name of the local database inside the data directory
pub const DB_FILE_NAME: &str = "wayfarer.db";

/// Application name
pub const APP_NAME: &str = "Aqar";

/// Locale used when neither an override nor the route path names one
pub const DEFAULT_LOCALE: &str = "ar";

/// Root of every chat endpoint
pub const CHATS_BASE_PATH: &str = "/chats";

/// Root of the authentication endpoints
pub const AUTH_BASE_PATH: &str = "/auth";

/// Private channel authorization endpoint
pub const CHANNEL_AUTH_PATH: &str = "/pusher/auth";

/// History page size requested by the chat view
pub const MESSAGES_PER_PAGE: u32 = 20;

/// Prefix of the per-chat private live channel
pub const CHAT_CHANNEL_PREFIX: &str = "private-chat.";

/// Live event carrying a freshly created chat message
pub const EVENT_NEW_MESSAGE: &str = "new-message";

/// Max characters of a non-JSON error body kept in the error message
pub const NON_JSON_SNIPPET_LEN: usize = 200;

/// Persisted state keys (cookie and local storage)
pub const TOKEN_KEY: &str = "token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const USER_KEY: &str = "user";
pub const COUNTRY_KEY: &str = "selected_country_id";
pub const CURRENCY_KEY: &str = "selected_currency";

/// Access token lifetime in seconds (2 hours)
pub const TOKEN_MAX_AGE_SECS: i64 = 60 * 60 * 2;

/// Refresh token lifetime in seconds (30 days)
pub const REFRESH_TOKEN_MAX_AGE_SECS: i64 = 60 * 60 * 24 * 30;

/// Backend message that never gets a toast
pub const UNAUTHENTICATED_MESSAGE: &str = "Unauthenticated.";

/// Shown when an error carries no message of its own
pub const GENERIC_ERROR_MESSAGE: &str = "حدث خطأ غير متوقع";

/// Message attached to every 401
pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized. Please login again.";

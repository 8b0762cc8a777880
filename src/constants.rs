pub mod server {
    pub const PROTOCOL_VERSION: &str = "2025-06-18";
    pub const NAME: &str = "relay";
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}

pub mod network {
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
    pub const USER_AGENT: &str = concat!("relay/", env!("CARGO_PKG_VERSION"));
    pub const ALLOWED_SCHEMES: &[&str] = &["http", "https"];
}

pub mod defaults {
    pub const TASKS_BASE_URL: &str = "https://api.example.com";
    pub const CALENDAR_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";
    pub const GRAPHQL_ENDPOINT: &str = "https://api.example.com/graphql";
    pub const WEATHER_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";
    pub const MAX_REQUESTS_PER_MINUTE: u32 = 60;
    pub const MAX_RESPONSE_CHARS: usize = 8_000;
}

pub mod limits {
    pub const TASK_LIST_PREVIEW: usize = 10;
    pub const SCHEMA_TYPES_SHOWN: usize = 20;
    pub const SCHEMA_FIELDS_SHOWN: usize = 10;
    pub const GRAPHQL_INLINE_CHARS: usize = 3_000;
    pub const GRAPHQL_PREVIEW_CHARS: usize = 2_000;
    pub const SCHEMA_ERRORS_SHOWN: usize = 10;
}

pub mod credentials {
    pub const TASKS_SERVICE: &str = "basic-api-wrapper";
    pub const TASKS_ACCOUNT: &str = "api_token";
    pub const CALENDAR_SERVICE: &str = "google-calendar-v1";
    pub const CALENDAR_ACCOUNT: &str = "access_token";
    pub const GRAPHQL_SERVICE: &str = "graphql-direct-mcp";
    pub const GRAPHQL_ACCOUNT: &str = "api_token";
}

pub mod crypto {
    pub const KEY_SIZE: usize = 32;
    pub const IV_SIZE: usize = 12;
    pub const TAG_SIZE: usize = 16;
}

pub mod markers {
    pub const ERROR: &str = "❌ Error: ";
    pub const API_ERROR: &str = "❌ API Error: ";
    pub const TRUNCATED: &str = "\n\n*[Response truncated - too much data]*";
}

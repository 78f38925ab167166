/// Application name
pub const APP_NAME: &str = "Apoyo";

/// Display name given to senders who do not provide one
pub const ANONYMOUS_USERNAME: &str = "Anónimo";

/// Maximum message length, counted in characters (not bytes)
pub const MAX_CONTENT_CHARS: usize = 500;

/// Minimum group name length, counted in characters
pub const MIN_GROUP_NAME_CHARS: usize = 3;

/// Terms that mark a message as moderated
pub const DEFAULT_FORBIDDEN_TERMS: &[&str] =
    &["malo", "feo", "grosero", "tonto", "odio", "matar", "daño"];

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8000;

/// Outbound frames buffered per live subscriber before pushes start failing
pub const DEFAULT_SUBSCRIBER_QUEUE_CAPACITY: usize = 256;

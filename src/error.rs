//! Error types for gemchat.
//!
//! One enum covers everything that can stop an operation: startup
//! configuration, local files, the transport, and non-success answers from
//! the API.  Conditions the chat recovers from on its own (a corrupt history
//! file, a reply with an unexpected shape) are plain values elsewhere.

use std::error;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;

type Source = Arc<dyn error::Error + Send + Sync>;

/// The main error type for gemchat.
#[derive(Clone, Debug)]
pub enum Error {
    /// A non-success status without a more specific variant.
    Api {
        /// HTTP status code.
        status_code: u16,
        /// Gemini's status name from the error body, e.g. `FAILED_PRECONDITION`.
        error_status: Option<String>,
        /// The error body's message, or the raw body.
        message: String,
    },

    /// 401: the API key was not accepted.
    Authentication { message: String },

    /// 403: the key may not use this model or project.
    Permission { message: String },

    /// 404: usually an unknown model name.
    NotFound { message: String },

    /// 429: quota or rate limit exhausted.
    RateLimit {
        message: String,
        /// Seconds from the `retry-after` header.
        retry_after: Option<u64>,
    },

    /// 400: the request body was rejected.
    BadRequest { message: String },

    /// No response before the deadline, or a 408 from the server.
    Timeout {
        message: String,
        /// The deadline that elapsed, when known.
        after: Option<Duration>,
        /// Set when the server answered 408 rather than the client giving up.
        status_code: Option<u16>,
    },

    /// The server could not be reached.
    Connection {
        message: String,
        source: Option<Source>,
    },

    /// 500.
    InternalServer { message: String },

    /// 502, 503 or 504.
    ServiceUnavailable {
        status_code: u16,
        message: String,
        /// Seconds from the `retry-after` header.
        retry_after: Option<u64>,
    },

    /// JSON that could not be produced or parsed.
    Serialization {
        message: String,
        source: Option<Source>,
    },

    /// A local file operation failed.
    Io {
        message: String,
        source: Arc<io::Error>,
    },

    /// Any other failure inside the HTTP client.
    HttpClient {
        message: String,
        source: Option<Source>,
    },

    /// The endpoint URL could not be built.
    Url {
        message: String,
        source: Option<url::ParseError>,
    },

    /// Unusable startup configuration, such as a missing or empty key file.
    Config { message: String },
}

impl Error {
    /// Creates an error for a status with no dedicated variant.
    pub fn api(status_code: u16, error_status: Option<String>, message: String) -> Self {
        Error::Api {
            status_code,
            error_status,
            message,
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Error::Authentication {
            message: message.into(),
        }
    }

    pub fn permission(message: impl Into<String>) -> Self {
        Error::Permission {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Error::NotFound {
            message: message.into(),
        }
    }

    pub fn rate_limit(message: impl Into<String>, retry_after: Option<u64>) -> Self {
        Error::RateLimit {
            message: message.into(),
            retry_after,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Error::BadRequest {
            message: message.into(),
        }
    }

    /// Creates a timeout error; `after` is the deadline that elapsed.
    pub fn timeout(message: impl Into<String>, after: Option<Duration>) -> Self {
        Error::Timeout {
            message: message.into(),
            after,
            status_code: None,
        }
    }

    /// Creates the error for a 408 answer.
    pub fn request_timeout(message: impl Into<String>) -> Self {
        Error::Timeout {
            message: message.into(),
            after: None,
            status_code: Some(408),
        }
    }

    pub fn connection(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Connection {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    pub fn internal_server(message: impl Into<String>) -> Self {
        Error::InternalServer {
            message: message.into(),
        }
    }

    pub fn service_unavailable(
        status_code: u16,
        message: impl Into<String>,
        retry_after: Option<u64>,
    ) -> Self {
        Error::ServiceUnavailable {
            status_code,
            message: message.into(),
            retry_after,
        }
    }

    pub fn serialization(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Serialization {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Wraps a file-system failure with context about what was attempted.
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Error::Io {
            message: message.into(),
            source: Arc::new(source),
        }
    }

    pub fn http_client(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::HttpClient {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    pub fn url(message: impl Into<String>, source: Option<url::ParseError>) -> Self {
        Error::Url {
            message: message.into(),
            source,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// True for 5xx answers.
    pub fn is_server_error(&self) -> bool {
        match self {
            Error::InternalServer { .. } | Error::ServiceUnavailable { .. } => true,
            Error::Api { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config { .. })
    }

    /// True when the request never produced an HTTP response.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Timeout {
                status_code: None,
                ..
            } | Error::Connection { .. }
                | Error::HttpClient { .. }
        )
    }

    /// The HTTP status behind this error, if the server answered.
    pub fn status_code(&self) -> Option<u16> {
        let code = match self {
            Error::Api { status_code, .. } | Error::ServiceUnavailable { status_code, .. } => {
                *status_code
            }
            Error::Timeout {
                status_code: Some(status_code),
                ..
            } => *status_code,
            Error::BadRequest { .. } => 400,
            Error::Authentication { .. } => 401,
            Error::Permission { .. } => 403,
            Error::NotFound { .. } => 404,
            Error::RateLimit { .. } => 429,
            Error::InternalServer { .. } => 500,
            _ => return None,
        };
        Some(code)
    }

    /// Seconds the server asked us to wait, if it said.
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Error::RateLimit { retry_after, .. } | Error::ServiceUnavailable { retry_after, .. } => {
                *retry_after
            }
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Api {
                status_code,
                error_status: Some(error_status),
                message,
            } => write!(f, "{error_status} ({status_code}): {message}"),
            Error::Api {
                status_code,
                message,
                ..
            } => write!(f, "HTTP {status_code}: {message}"),
            Error::Authentication { message } => write!(f, "API key rejected: {message}"),
            Error::Permission { message } => write!(f, "permission denied: {message}"),
            Error::NotFound { message } => write!(f, "not found: {message}"),
            Error::RateLimit { message, .. } => write!(f, "rate limited: {message}"),
            Error::BadRequest { message } => write!(f, "bad request: {message}"),
            Error::Timeout {
                message,
                status_code: Some(status_code),
                ..
            } => write!(f, "timed out ({status_code}): {message}"),
            Error::Timeout {
                message,
                after: Some(after),
                ..
            } => write!(f, "timed out after {}s: {message}", after.as_secs_f64()),
            Error::Timeout { message, .. } => write!(f, "timed out: {message}"),
            Error::Connection { message, .. } => write!(f, "cannot connect: {message}"),
            Error::InternalServer { message } => write!(f, "server error: {message}"),
            Error::ServiceUnavailable {
                status_code,
                message,
                ..
            } => write!(f, "service unavailable ({status_code}): {message}"),
            Error::Serialization { message, .. } => write!(f, "malformed JSON: {message}"),
            Error::Io { message, source } => write!(f, "{message}: {source}"),
            Error::HttpClient { message, .. } => write!(f, "HTTP client: {message}"),
            Error::Url { message, .. } => write!(f, "invalid URL: {message}"),
            Error::Config { message } => write!(f, "configuration: {message}"),
        }?;
        if let Some(seconds) = self.retry_after() {
            write!(f, " (retry in {seconds}s)")?;
        }
        Ok(())
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Connection { source, .. }
            | Error::Serialization { source, .. }
            | Error::HttpClient { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Io { source, .. } => Some(source.as_ref()),
            Error::Url { source, .. } => source.as_ref().map(|e| e as &(dyn error::Error + 'static)),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::io("I/O error", err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::serialization(err.to_string(), Some(Box::new(err)))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::url(err.to_string(), Some(err))
    }
}

/// A specialized Result type for gemchat operations.
pub type Result<T> = std::result::Result<T, Error>;

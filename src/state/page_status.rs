//! Page outcome definitions
//!
//! Every dequeued URL ends in exactly one `PageStatus`. Failures and skips are
//! values reported to the result sink, never errors that stop the crawl.
use serde::Serialize;
use std::fmt;

/// Classified terminal failure of a fetch
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FailureKind {
    /// DNS, connection, TLS or body read failure
    NetworkError { message: String },

    /// The per-attempt timeout elapsed
    Timeout,

    /// The server answered with a non-success status
    HttpError { status: u16 },
}

impl FailureKind {
    /// Returns true if the failure is transient and may be retried
    ///
    /// 429 is only retryable when the caller opts in.
    pub fn is_retryable(&self, retry_on_429: bool) -> bool {
        match self {
            Self::NetworkError { .. } | Self::Timeout => true,
            Self::HttpError { status } => {
                (500..600).contains(status) || (*status == 429 && retry_on_429)
            }
        }
    }

    /// The `PageStatus` this failure is recorded as
    pub fn status(&self) -> PageStatus {
        match self {
            Self::NetworkError { .. } => PageStatus::NetworkError,
            Self::Timeout => PageStatus::Timeout,
            Self::HttpError { .. } => PageStatus::HttpError,
        }
    }

    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::HttpError { status } => Some(*status),
            _ => None,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NetworkError { .. } => write!(f, "network-error"),
            Self::Timeout => write!(f, "timeout"),
            Self::HttpError { status } => write!(f, "http-error({})", status),
        }
    }
}

/// Why a dequeued URL was not fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    RobotsDisallowed,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RobotsDisallowed => write!(f, "robots-disallowed"),
        }
    }
}

/// Recorded outcome of a single URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageStatus {
    /// Fetched successfully (links may still be missing after a parse error)
    Fetched,
    NetworkError,
    Timeout,
    HttpError,
    RobotsDisallowed,
}

impl PageStatus {
    /// Returns true if this represents a successful fetch
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Fetched)
    }

    /// Returns true if this represents a terminal fetch failure
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::NetworkError | Self::Timeout | Self::HttpError)
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Fetched => "fetched",
            Self::NetworkError => "network_error",
            Self::Timeout => "timeout",
            Self::HttpError => "http_error",
            Self::RobotsDisallowed => "robots_disallowed",
        }
    }

    /// Parses a status from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "fetched" => Some(Self::Fetched),
            "network_error" => Some(Self::NetworkError),
            "timeout" => Some(Self::Timeout),
            "http_error" => Some(Self::HttpError),
            "robots_disallowed" => Some(Self::RobotsDisallowed),
            _ => None,
        }
    }

    pub fn all_statuses() -> Vec<Self> {
        vec![
            Self::Fetched,
            Self::NetworkError,
            Self::Timeout,
            Self::HttpError,
            Self::RobotsDisallowed,
        ]
    }
}

impl From<SkipReason> for PageStatus {
    fn from(reason: SkipReason) -> Self {
        match reason {
            SkipReason::RobotsDisallowed => Self::RobotsDisallowed,
        }
    }
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_display() {
        assert_eq!(
            FailureKind::NetworkError {
                message: "refused".to_string()
            }
            .to_string(),
            "network-error"
        );
        assert_eq!(FailureKind::Timeout.to_string(), "timeout");
        assert_eq!(
            FailureKind::HttpError { status: 503 }.to_string(),
            "http-error(503)"
        );
    }

    #[test]
    fn test_retryable_classes() {
        assert!(FailureKind::Timeout.is_retryable(false));
        assert!(FailureKind::NetworkError {
            message: String::new()
        }
        .is_retryable(false));
        assert!(FailureKind::HttpError { status: 503 }.is_retryable(false));
        assert!(!FailureKind::HttpError { status: 404 }.is_retryable(true));
    }

    #[test]
    fn test_429_retry_is_opt_in() {
        let kind = FailureKind::HttpError { status: 429 };
        assert!(!kind.is_retryable(false));
        assert!(kind.is_retryable(true));
    }

    #[test]
    fn test_failure_maps_to_status() {
        assert_eq!(FailureKind::Timeout.status(), PageStatus::Timeout);
        assert_eq!(
            FailureKind::HttpError { status: 500 }.status(),
            PageStatus::HttpError
        );
        assert_eq!(
            PageStatus::from(SkipReason::RobotsDisallowed),
            PageStatus::RobotsDisallowed
        );
    }

    #[test]
    fn test_roundtrip_db_string() {
        for status in PageStatus::all_statuses() {
            let parsed = PageStatus::from_db_string(status.to_db_string());
            assert_eq!(Some(status), parsed, "Failed roundtrip for {:?}", status);
        }
        assert_eq!(PageStatus::from_db_string("processed"), None);
    }

    #[test]
    fn test_serialize_failure_kind() {
        let json = serde_json::to_string(&FailureKind::HttpError { status: 503 }).unwrap();
        assert_eq!(json, r#"{"kind":"http-error","status":503}"#);
    }
}

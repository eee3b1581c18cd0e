use thiserror::Error;

/// Why a data source produced no value.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("payload contained no usable data")]
    Empty,
}

impl FetchError {
    /// Network failures and non-2xx responses.
    pub fn is_transport(&self) -> bool {
        matches!(self, FetchError::Network(_) | FetchError::Status { .. })
    }

    /// Transport failures that may succeed on a later attempt: network
    /// errors, server errors and rate limiting. A rejected key or a missing
    /// resource will not.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Network(_) => true,
            FetchError::Status { status, .. } => *status == 429 || (500..600).contains(status),
            FetchError::Malformed(_) | FetchError::Empty => false,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Malformed(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("geolocation is not supported")]
    Unsupported,

    #[error("timed out waiting for a location fix")]
    Timeout,
}

#[derive(Debug, Clone, Copy, Error, PartialEq)]
pub enum CoordinateError {
    #[error("latitude {0} is outside [-90, 90]")]
    Latitude(f64),

    #[error("longitude {0} is outside [-180, 180]")]
    Longitude(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_classification() {
        assert!(FetchError::Network("reset".into()).is_transport());
        assert!(
            FetchError::Status {
                status: 502,
                body: String::new()
            }
            .is_transport()
        );
        assert!(!FetchError::Malformed("missing main".into()).is_transport());
        assert!(!FetchError::Empty.is_transport());
    }

    #[test]
    fn only_transient_failures_are_retryable() {
        let status = |status| FetchError::Status {
            status,
            body: String::new(),
        };

        assert!(FetchError::Network("reset".into()).is_retryable());
        assert!(status(503).is_retryable());
        assert!(status(429).is_retryable());
        assert!(!status(401).is_retryable());
        assert!(!status(404).is_retryable());
        assert!(status(404).is_transport());
        assert!(!FetchError::Empty.is_retryable());
    }

    #[test]
    fn json_errors_become_malformed() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(matches!(FetchError::from(err), FetchError::Malformed(_)));
    }
}

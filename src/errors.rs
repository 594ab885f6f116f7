use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: message.into(),
        }
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            message: message.into(),
        }
    }

    pub fn internal(err: impl std::error::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UnknownHabit(_) => Self::not_found(err.to_string()),
            StoreError::Invalid(_) => Self::unprocessable(err.to_string()),
            StoreError::DayOutOfRange { .. } | StoreError::Declined => {
                Self::bad_request(err.to_string())
            }
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::unprocessable(err.to_string())
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::NotConfigured => Self::unavailable(err.to_string()),
            AuthError::InvalidEmail | AuthError::MissingToken => Self::bad_request(err.to_string()),
            AuthError::Rejected { .. } | AuthError::Transport(_) | AuthError::Decode(_) => {
                Self::bad_gateway(err.to_string())
            }
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(err)
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        (self.status, self.message).into_response()
    }
}

/// Rejected mutations of the resident month.
#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("unknown habit: {0}")]
    UnknownHabit(String),
    #[error("day {day} is outside 1..={days}")]
    DayOutOfRange { day: u32, days: u32 },
    #[error("invalid value: {0}")]
    Invalid(String),
    #[error("action was not confirmed")]
    Declined,
}

/// An import file that could not be parsed at all.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("invalid JSON: {0}")]
    Unparsable(String),
    #[error("expected a JSON object describing a month")]
    NotAnObject,
}

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("backend unreachable: {0}")]
    Transport(String),
    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("sign-in requires a remote backend")]
    NotConfigured,
    #[error("a valid email address is required")]
    InvalidEmail,
    #[error("an access token is required")]
    MissingToken,
    #[error("identity provider returned {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("identity provider unreachable: {0}")]
    Transport(String),
    #[error("unexpected identity response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

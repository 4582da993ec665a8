use std::fmt;

/// Input field a validation or conflict error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Email,
    Password,
    Content,
    Author,
    Picture,
    Followed,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Email => "email",
            Field::Password => "password",
            Field::Content => "content",
            Field::Author => "author",
            Field::Picture => "picture",
            Field::Followed => "followed",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced to the request layer. Messages never contain a plaintext
/// password or token.
#[derive(Debug)]
pub enum CoreError {
    ValidationFailed { field: Field, reason: String },
    InvalidCredentials,
    Expired,
    NotActivated,
    Conflict(Field),
    NotFound(&'static str),
    Forbidden,
    PersistenceFailure(String),
    Internal(String),
}

impl CoreError {
    pub fn validation(field: Field, reason: impl Into<String>) -> Self {
        CoreError::ValidationFailed {
            field,
            reason: reason.into(),
        }
    }

    /// Whether the caller can re-prompt or resend instead of failing the request.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            CoreError::PersistenceFailure(_) | CoreError::Internal(_)
        )
    }

    /// Text safe to show an end user. Expired and invalid tokens read the same.
    pub fn user_message(&self) -> String {
        match self {
            CoreError::ValidationFailed { field, reason } => format!("{} {}", field, reason),
            CoreError::InvalidCredentials | CoreError::Expired => {
                "Invalid email/password combination or link".to_string()
            }
            CoreError::NotActivated => "Account not activated. Check your email".to_string(),
            CoreError::Conflict(field) => format!("{} has already been taken", field),
            CoreError::NotFound(what) => format!("{} not found", what),
            CoreError::Forbidden => "Forbidden".to_string(),
            CoreError::PersistenceFailure(_) | CoreError::Internal(_) => {
                "Something went wrong".to_string()
            }
        }
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::ValidationFailed { field, reason } => {
                write!(f, "Validation failed: {} {}", field, reason)
            }
            CoreError::InvalidCredentials => write!(f, "Invalid credentials"),
            CoreError::Expired => write!(f, "Expired"),
            CoreError::NotActivated => write!(f, "Account not activated"),
            CoreError::Conflict(field) => write!(f, "Conflict: {} already taken", field),
            CoreError::NotFound(what) => write!(f, "Not Found: {}", what),
            CoreError::Forbidden => write!(f, "Forbidden"),
            CoreError::PersistenceFailure(msg) => write!(f, "Persistence failure: {}", msg),
            CoreError::Internal(msg) => write!(f, "Internal Error: {}", msg),
        }
    }
}

impl std::error::Error for CoreError {}

// Hashing backends report through anyhow; those are internal errors.
impl From<anyhow::Error> for CoreError {
    fn from(err: anyhow::Error) -> Self {
        CoreError::Internal(err.to_string())
    }
}

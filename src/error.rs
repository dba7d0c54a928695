use thiserror::Error;

/// Failures surfaced by board operations.
///
/// Every variant is terminal for the operation that produced it: the caller is told,
/// nothing is retried.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("failed to fetch {what}")]
    FetchFailed {
        what: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to write {what}")]
    WriteFailed {
        what: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("sign-in required")]
    Unauthorized,
    #[error("{0}")]
    InvalidInput(String),
}

impl BoardError {
    pub fn fetch(what: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        BoardError::FetchFailed { what: what.into(), source: source.into() }
    }

    pub fn write(what: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        BoardError::WriteFailed { what: what.into(), source: source.into() }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        BoardError::InvalidInput(msg.into())
    }

    /// Short message meant for the person using the board.
    pub fn notice(&self) -> String {
        match self {
            BoardError::FetchFailed { .. } => "Failed to load posts.".to_string(),
            BoardError::WriteFailed { .. } => "Failed to save changes.".to_string(),
            BoardError::Unauthorized => "Please sign in first.".to_string(),
            BoardError::InvalidInput(msg) => msg.clone(),
        }
    }
}

pub type BoardResult<T> = std::result::Result<T, BoardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notice_hides_source_detail() {
        let err = BoardError::fetch("post 42", anyhow::anyhow!("connection reset by peer"));
        assert_eq!(err.notice(), "Failed to load posts.");
        assert_eq!(err.to_string(), "failed to fetch post 42");
    }

    #[test]
    fn invalid_input_notice_is_the_message() {
        let err = BoardError::invalid("Title and content are required.");
        assert_eq!(err.notice(), "Title and content are required.");
    }
}

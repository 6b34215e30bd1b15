use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid stage: {0}")]
    InvalidStage(String),

    #[error("Invalid workflow request: {0}")]
    InvalidRequest(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = CoreError::InvalidStage("reporting".to_string());
        assert!(error.to_string().contains("reporting"));
    }
}

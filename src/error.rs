use thiserror::Error;

/// Why a document could not be scored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScoreError {
    /// Too little text to be a real prospectus; usually a scanned-image PDF.
    #[error("document has {chars} characters, below the {min_chars} needed to score (scanned image?)")]
    DocumentTooShort { chars: usize, min_chars: usize },
}

use thiserror::Error;

/// Domain-level error type shared across poflow crates.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Fatal import error: the uploaded input is structurally unusable.
///
/// Raised before any row work begins. Row-level problems never surface
/// here -- they are recorded on the rows themselves and folded into the
/// batch report.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("file contains no data rows")]
    NoRows,

    #[error("no usable field mapping could be determined from the headers")]
    NoMapping,

    #[error("unable to parse {kind} input: {message}")]
    Malformed { kind: String, message: String },
}

//! Problem and plan representation consumed by the validator.

pub mod effect;
pub mod expression;
pub mod plan;
pub mod problem;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}: {1}")]
    Io(String, #[source] std::io::Error),
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("plan entry {entry}: {message}")]
    PlanParse { entry: usize, message: String },
}

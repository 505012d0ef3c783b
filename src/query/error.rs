use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("Invalid field name: {0}")]
    InvalidField(String),

    #[error("Invalid query parameter: {0}")]
    InvalidParameter(String),

    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    #[error("Invalid {field}: {value}.")]
    Cast { field: String, value: String },

    #[error("Projection cannot mix included and excluded fields: {0}")]
    MixedProjection(String),
}

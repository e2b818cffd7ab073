use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValueError {
    #[error("Unsupported value for field `{field}`: {kind} values cannot be stored in a record")]
    UnsupportedValue { field: String, kind: &'static str },

    #[error("Expected a JSON array of records, found {0}")]
    NotAnArray(&'static str),

    #[error("Expected a JSON object at row {0}")]
    NotAnObject(usize),
}

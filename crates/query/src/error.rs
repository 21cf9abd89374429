//! Error types for condition handling and record storage.

use mblock_types::ServiceError;
use thiserror::Error;

/// Programmer errors in a match condition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("Unknown `where` operator: {operator}")]
    UnknownOperator { operator: String },

    #[error("Operator '{operator}' on field '{field}' expects an array operand")]
    ExpectedArray { field: String, operator: String },

    #[error("Invalid match condition: {reason}")]
    InvalidCondition { reason: String },
}

impl QueryError {
    pub fn unknown_operator(operator: impl Into<String>) -> Self {
        Self::UnknownOperator { operator: operator.into() }
    }

    pub fn expected_array(field: impl Into<String>, operator: impl Into<String>) -> Self {
        Self::ExpectedArray {
            field: field.into(),
            operator: operator.into(),
        }
    }

    pub fn invalid_condition(reason: impl Into<String>) -> Self {
        Self::InvalidCondition { reason: reason.into() }
    }
}

/// Errors raised by storage backends.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("No such table in store: {table}")]
    NoSuchTable { table: String },

    #[error("{operation} must provide a `where` condition")]
    MissingWhere { operation: String },

    #[error("No record found in {table}")]
    NoRecordFound { table: String },

    #[error("Record in {table} is missing an `id` field")]
    MissingId { table: String },

    #[error(transparent)]
    Query(#[from] QueryError),
}

impl StoreError {
    pub fn no_such_table(table: impl Into<String>) -> Self {
        Self::NoSuchTable { table: table.into() }
    }

    pub fn missing_where(operation: impl Into<String>) -> Self {
        Self::MissingWhere {
            operation: operation.into(),
        }
    }

    pub fn no_record_found(table: impl Into<String>) -> Self {
        Self::NoRecordFound { table: table.into() }
    }

    pub fn missing_id(table: impl Into<String>) -> Self {
        Self::MissingId { table: table.into() }
    }
}

impl From<QueryError> for ServiceError {
    fn from(error: QueryError) -> Self {
        ServiceError::new(500, "QueryEngineError").with_message(error.to_string())
    }
}

impl From<StoreError> for ServiceError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Query(query_error) => query_error.into(),
            StoreError::NoRecordFound { .. } => ServiceError::not_found().with_message(error.to_string()),
            StoreError::MissingId { .. } => ServiceError::bad_request().with_message(error.to_string()),
            StoreError::NoSuchTable { .. } | StoreError::MissingWhere { .. } => {
                ServiceError::new(500, "StoreError").with_message(error.to_string())
            }
        }
    }
}

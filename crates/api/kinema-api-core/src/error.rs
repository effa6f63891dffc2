//! Schema-error taxonomy for edit-time rejections.
//!
//! These are reported synchronously at the edit boundary; graph state is left
//! unchanged when a handler returns one.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("display name '{0}' is already used by another input")]
    DuplicateName(String),

    #[error("input names must not be empty")]
    EmptyName,

    #[error("no socket with identifier '{0}'")]
    UnknownSocket(String),

    #[error("socket '{0}' does not allow renaming")]
    NotEditable(String),

    #[error("socket '{0}' does not allow removal")]
    NotRemovable(String),

    #[error("node has no vectorization group '{0}'")]
    UnknownGroup(String),

    #[error("node does not handle this edit event")]
    UnsupportedEdit,
}

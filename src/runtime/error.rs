use thiserror::Error;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("Type mismatch: {message}")]
    TypeMismatch { message: String },
    #[error("Function `{name}` expected {expected} arguments but received {received}")]
    ArityMismatch {
        name: String,
        expected: usize,
        received: usize,
    },
    #[error("Function `{name}` has no parameter `{parameter}`")]
    UnknownParameter { name: String, parameter: String },
    #[error("Argument `{parameter}` of `{name}` is supplied more than once")]
    DuplicateArgument { name: String, parameter: String },
    #[error("Pipeline stage ({stage}) cannot take a receiver")]
    StageRejectsReceiver { stage: String },
    #[error("Value of type {found} is not callable")]
    NotCallable { found: String },
    #[error("Module `{module}` has no top-level value to use as an assembly")]
    NotAnAssembly { module: String },
    #[error("`{name}` is read before it has been evaluated")]
    Uninitialized { name: String },
    #[error("`{name}` has no resolved target")]
    Unresolved { name: String },
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Range {start}..{end} has more than {limit} elements")]
    RangeTooLarge { start: i64, end: i64, limit: usize },
    #[error("Index {index} is out of range for an array of length {len}")]
    IndexOutOfRange { index: i64, len: usize },
    #[error("Unknown host function `{name}`")]
    UnknownHost { name: String },
    #[error("Host function `{name}` failed: {message}")]
    Host { name: String, message: String },
    #[error("Module `{module}` has errors and cannot be evaluated")]
    ModuleHasErrors { module: String },
    #[error("No top-level `{name}` to evaluate")]
    MissingEntry { name: String },
    #[error("Invalid argument `{argument}`: {message}")]
    InvalidArgument { argument: String, message: String },
}

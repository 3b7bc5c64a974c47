//! Evaluation of resolved modules.

pub mod environment;
pub mod error;
pub mod host;
pub mod value;

mod call;
mod entry;
mod interpreter;
mod pipeline;

pub use call::{bind_arguments, ParamSpec};
pub use entry::{literal_value, Entry, EntryArg};
pub use error::{RuntimeError, RuntimeResult};
pub use host::{HostFunction, HostRegistry, Signature};
pub use interpreter::Interpreter;
pub use value::Value;

use crate::language::types::Type;
use environment::Frame;
use interpreter::Context;
use tracing::{debug, trace};

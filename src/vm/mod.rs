//! Virtual machine module
//!
//! The VM is a stack machine whose stack is the collector's root set.

pub mod interpreter;
pub mod machine;
pub mod stack;

pub use interpreter::{Interpreter, Output, ScriptError};
pub use machine::{PairField, Vm, VmError, VmResult};
pub use stack::{RootStack, StackError};

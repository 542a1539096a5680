//! Babygc - a mark-and-sweep garbage collector for a tiny stack VM
//!
//! Every heap cell is either a scalar integer or a pair of references to
//! other cells. The VM's stack is the only root set: a cell survives a
//! collection exactly when it can be reached from the stack.
//!
//! # Features
//! - Arena registry with generational handles, no raw pointers
//! - Iterative marking, safe for cycles and deep structures
//! - Adaptive threshold: the next cycle runs at twice the survivor count
//! - Line-oriented command language and REPL (`bgc`)
//!
//! # Example
//! ```
//! use babygc::Vm;
//!
//! let mut vm = Vm::new(256, 256);
//! vm.push_scalar(1).unwrap();
//! vm.push_scalar(2).unwrap();
//! vm.push_pair().unwrap();
//! vm.pop().unwrap();
//!
//! vm.collect();
//! assert_eq!(vm.live_count(), 0);
//! ```

// Core modules
pub mod config;
pub mod value;

// Garbage collector
pub mod gc;

// Virtual machine
pub mod vm;

// Command language
pub mod parser;

// Re-export main types
pub use config::{ConfigError, VmConfig};
pub use gc::{CollectionReport, GcStats};
pub use value::{Cell, CellKind, CellRef};
pub use vm::{Interpreter, Vm, VmError};

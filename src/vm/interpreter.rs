//! Command interpreter
//!
//! Executes driver commands against a [`Vm`]. This is what the `bgc` binary
//! runs for both scripts and the REPL.

use crate::gc::{CollectionReport, GcStats};
use crate::parser::{parse_line, Command, ParseError};
use crate::value::{Cell, CellRef};
use crate::vm::machine::{Vm, VmError, VmResult};
use std::fmt;
use thiserror::Error;

/// Error while running a script
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: ParseError,
    },
    #[error("line {line}: {source}")]
    Runtime {
        line: usize,
        #[source]
        source: VmError,
    },
}

impl ScriptError {
    /// 1-based line the error occurred on
    pub fn line(&self) -> usize {
        match self {
            ScriptError::Parse { line, .. } | ScriptError::Runtime { line, .. } => *line,
        }
    }
}

/// Result of one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// A cell and its contents
    Cell(CellRef, Cell),
    /// A live count or threshold
    Number(usize),
    /// Stack contents, top first
    Stack(Vec<(CellRef, Cell)>),
    Collected(CollectionReport),
    Stats(GcStats),
    Text(String),
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Output::Cell(r, cell) => write!(f, "{} = {}", r, cell),
            Output::Number(n) => write!(f, "{}", n),
            Output::Stack(entries) => {
                if entries.is_empty() {
                    return f.write_str("(empty)");
                }
                for (depth, (r, cell)) in entries.iter().enumerate() {
                    if depth > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "[{}] {} = {}", depth, r, cell)?;
                }
                Ok(())
            }
            Output::Collected(report) => write!(
                f,
                "collected {} of {} cells, {} live, next threshold {}",
                report.freed, report.live_before, report.live_after, report.next_threshold
            ),
            Output::Stats(stats) => write!(
                f,
                "collections: {}, allocated: {}, freed: {}, last freed: {}, peak live: {}",
                stats.collections,
                stats.total_allocated,
                stats.total_freed,
                stats.last_freed,
                stats.peak_live
            ),
            Output::Text(text) => f.write_str(text),
        }
    }
}

/// Runs commands against an owned VM
pub struct Interpreter {
    vm: Vm,
}

impl Interpreter {
    pub fn new(vm: Vm) -> Self {
        Interpreter { vm }
    }

    #[inline]
    pub fn vm(&self) -> &Vm {
        &self.vm
    }

    /// Give the VM back
    pub fn into_vm(self) -> Vm {
        self.vm
    }

    /// Stack entry at `depth` from the top
    fn at(&self, depth: usize) -> VmResult<CellRef> {
        self.vm.peek(depth).ok_or(VmError::StackUnderflow)
    }

    /// Resolve a handle to a cell output
    fn describe(&self, r: CellRef) -> VmResult<Output> {
        let cell = self.vm.get(r).ok_or(VmError::InvalidHandle(r))?;
        Ok(Output::Cell(r, *cell))
    }

    /// Execute a single command
    pub fn execute(&mut self, command: Command) -> VmResult<Output> {
        match command {
            Command::Push(value) => {
                let r = self.vm.push_scalar(value)?;
                self.describe(r)
            }
            Command::Pair => {
                let r = self.vm.push_pair()?;
                self.describe(r)
            }
            Command::Pop => {
                let r = self.vm.pop()?;
                // The popped cell stays registered until the next cycle.
                self.describe(r)
            }
            Command::Dup(depth) => {
                let r = self.at(depth)?;
                self.vm.push(r)?;
                self.describe(r)
            }
            Command::Collect => Ok(Output::Collected(self.vm.collect())),
            Command::Count => Ok(Output::Number(self.vm.live_count())),
            Command::Stack => {
                let entries = self
                    .vm
                    .stack()
                    .iter()
                    .rev()
                    .map(|&r| {
                        self.vm
                            .get(r)
                            .map(|cell| (r, *cell))
                            .ok_or(VmError::InvalidHandle(r))
                    })
                    .collect::<VmResult<Vec<_>>>()?;
                Ok(Output::Stack(entries))
            }
            Command::Show(depth) => {
                let r = self.at(depth)?;
                self.describe(r)
            }
            Command::SetField {
                field,
                pair,
                target,
            } => {
                let pair = self.at(pair)?;
                let target = self.at(target)?;
                self.vm.set_field(pair, field, target)?;
                self.describe(pair)
            }
            Command::Stats => Ok(Output::Stats(*self.vm.stats())),
            Command::Threshold => Ok(Output::Number(self.vm.threshold())),
            Command::Reset => Ok(Output::Collected(self.vm.reset())),
            Command::Dump => Ok(Output::Text(self.dump())),
        }
    }

    #[cfg(feature = "dump")]
    fn dump(&self) -> String {
        self.vm.dump()
    }

    #[cfg(not(feature = "dump"))]
    fn dump(&self) -> String {
        "dump support not enabled (build with --features dump)".to_string()
    }

    /// Parse and execute one line
    ///
    /// Returns `Ok(None)` for blank and comment lines.
    pub fn run_line(&mut self, line_no: usize, line: &str) -> Result<Option<Output>, ScriptError> {
        let Some(command) = parse_line(line).map_err(|source| ScriptError::Parse {
            line: line_no,
            source,
        })?
        else {
            return Ok(None);
        };

        self.execute(command)
            .map(Some)
            .map_err(|source| ScriptError::Runtime {
                line: line_no,
                source,
            })
    }

    /// Run a script, stopping at the first error
    pub fn run_script(&mut self, source: &str) -> Result<Vec<Output>, ScriptError> {
        let mut outputs = Vec::new();
        for (i, line) in source.lines().enumerate() {
            if let Some(output) = self.run_line(i + 1, line)? {
                outputs.push(output);
            }
        }
        Ok(outputs)
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter::new(Vm::default())
    }
}

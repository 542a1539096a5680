//! Parser for the driver command language

pub mod command;

pub use command::{parse_line, parse_script, Command, ParseError};

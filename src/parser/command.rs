//! Driver command language
//!
//! One command per line. `#` starts a comment, blank lines are ignored.
//!
//! ```text
//! push 3          # allocate a scalar and push it
//! push 4
//! pair            # (3 . 4)
//! setsecond 0 0   # point the pair at itself
//! gc
//! count
//! ```
//!
//! Stack positions are depths from the top: `0` is the top entry.

use crate::vm::machine::PairField;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

/// `<word> [args...]`, comment already removed
static LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?P<cmd>[A-Za-z][A-Za-z_-]*)(?:\s+(?P<args>.*?))?\s*$")
        .unwrap_or_else(|e| panic!("invalid command regex: {e}"))
});

/// Signed decimal integer
static INTEGER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?[0-9]+$").unwrap_or_else(|e| panic!("invalid integer regex: {e}"))
});

/// A parsed driver command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `push <int>`
    Push(i32),
    /// `pair`
    Pair,
    /// `pop`
    Pop,
    /// `dup [depth]`: push an existing stack entry again
    Dup(usize),
    /// `gc`
    Collect,
    /// `count`
    Count,
    /// `stack`
    Stack,
    /// `show [depth]`
    Show(usize),
    /// `setfirst <pair-depth> <target-depth>` / `setsecond ...`
    SetField {
        field: PairField,
        pair: usize,
        target: usize,
    },
    /// `stats`
    Stats,
    /// `threshold`
    Threshold,
    /// `reset`
    Reset,
    /// `dump`
    Dump,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Push(v) => write!(f, "push {}", v),
            Command::Pair => f.write_str("pair"),
            Command::Pop => f.write_str("pop"),
            Command::Dup(depth) => write!(f, "dup {}", depth),
            Command::Collect => f.write_str("gc"),
            Command::Count => f.write_str("count"),
            Command::Stack => f.write_str("stack"),
            Command::Show(depth) => write!(f, "show {}", depth),
            Command::SetField {
                field: PairField::First,
                pair,
                target,
            } => write!(f, "setfirst {} {}", pair, target),
            Command::SetField {
                field: PairField::Second,
                pair,
                target,
            } => write!(f, "setsecond {} {}", pair, target),
            Command::Stats => f.write_str("stats"),
            Command::Threshold => f.write_str("threshold"),
            Command::Reset => f.write_str("reset"),
            Command::Dump => f.write_str("dump"),
        }
    }
}

/// Command parse error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("malformed line: {0:?}")]
    Malformed(String),
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("{command}: missing argument <{name}>")]
    MissingArgument {
        command: &'static str,
        name: &'static str,
    },
    #[error("{command}: unexpected argument {arg:?}")]
    UnexpectedArgument { command: &'static str, arg: String },
    #[error("invalid integer: {0:?}")]
    InvalidInteger(String),
    #[error("integer out of range: {0}")]
    OutOfRange(String),
}

/// Parse one line
///
/// Returns `Ok(None)` for blank and comment-only lines.
pub fn parse_line(line: &str) -> Result<Option<Command>, ParseError> {
    let code = match line.find('#') {
        Some(pos) => &line[..pos],
        None => line,
    };
    if code.trim().is_empty() {
        return Ok(None);
    }

    let caps = LINE
        .captures(code)
        .ok_or_else(|| ParseError::Malformed(code.trim().to_string()))?;
    let name = caps["cmd"].to_ascii_lowercase();
    let mut args = Args {
        tokens: caps
            .name("args")
            .map(|m| m.as_str().split_whitespace().collect())
            .unwrap_or_default(),
        pos: 0,
    };

    let command = match name.as_str() {
        "push" => Command::Push(args.required("push", "value")?),
        "pair" => Command::Pair,
        "pop" => Command::Pop,
        "dup" => Command::Dup(args.optional()?.unwrap_or(0)),
        "gc" | "collect" => Command::Collect,
        "count" => Command::Count,
        "stack" => Command::Stack,
        "show" => Command::Show(args.optional()?.unwrap_or(0)),
        "setfirst" => Command::SetField {
            field: PairField::First,
            pair: args.required("setfirst", "pair-depth")?,
            target: args.required("setfirst", "target-depth")?,
        },
        "setsecond" => Command::SetField {
            field: PairField::Second,
            pair: args.required("setsecond", "pair-depth")?,
            target: args.required("setsecond", "target-depth")?,
        },
        "stats" => Command::Stats,
        "threshold" => Command::Threshold,
        "reset" => Command::Reset,
        "dump" => Command::Dump,
        _ => return Err(ParseError::UnknownCommand(name)),
    };

    args.finish(command)?;
    Ok(Some(command))
}

/// Parse a whole script, keeping 1-based line numbers
pub fn parse_script(source: &str) -> Result<Vec<(usize, Command)>, (usize, ParseError)> {
    let mut commands = Vec::new();
    for (i, line) in source.lines().enumerate() {
        if let Some(cmd) = parse_line(line).map_err(|e| (i + 1, e))? {
            commands.push((i + 1, cmd));
        }
    }
    Ok(commands)
}

/// Argument cursor for one command
struct Args<'a> {
    tokens: Vec<&'a str>,
    pos: usize,
}

impl Args<'_> {
    fn next_int<T: TryFrom<i64>>(&mut self) -> Result<Option<T>, ParseError> {
        let Some(&token) = self.tokens.get(self.pos) else {
            return Ok(None);
        };
        self.pos += 1;

        if !INTEGER.is_match(token) {
            return Err(ParseError::InvalidInteger(token.to_string()));
        }
        let wide: i64 = token
            .parse()
            .map_err(|_| ParseError::OutOfRange(token.to_string()))?;
        T::try_from(wide)
            .map(Some)
            .map_err(|_| ParseError::OutOfRange(token.to_string()))
    }

    fn required<T: TryFrom<i64>>(
        &mut self,
        command: &'static str,
        name: &'static str,
    ) -> Result<T, ParseError> {
        self.next_int()?
            .ok_or(ParseError::MissingArgument { command, name })
    }

    #[inline]
    fn optional<T: TryFrom<i64>>(&mut self) -> Result<Option<T>, ParseError> {
        self.next_int()
    }

    fn finish(&self, command: Command) -> Result<(), ParseError> {
        match self.tokens.get(self.pos) {
            Some(extra) => Err(ParseError::UnexpectedArgument {
                command: command_name(&command),
                arg: extra.to_string(),
            }),
            None => Ok(()),
        }
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Push(_) => "push",
        Command::Pair => "pair",
        Command::Pop => "pop",
        Command::Dup(_) => "dup",
        Command::Collect => "gc",
        Command::Count => "count",
        Command::Stack => "stack",
        Command::Show(_) => "show",
        Command::SetField {
            field: PairField::First,
            ..
        } => "setfirst",
        Command::SetField {
            field: PairField::Second,
            ..
        } => "setsecond",
        Command::Stats => "stats",
        Command::Threshold => "threshold",
        Command::Reset => "reset",
        Command::Dump => "dump",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_and_comments() {
        assert_eq!(parse_line(""), Ok(None));
        assert_eq!(parse_line("   "), Ok(None));
        assert_eq!(parse_line("# just a comment"), Ok(None));
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(parse_line("pair"), Ok(Some(Command::Pair)));
        assert_eq!(parse_line("  pop  "), Ok(Some(Command::Pop)));
        assert_eq!(parse_line("gc"), Ok(Some(Command::Collect)));
        assert_eq!(parse_line("collect"), Ok(Some(Command::Collect)));
        assert_eq!(parse_line("COUNT"), Ok(Some(Command::Count)));
        assert_eq!(parse_line("stats # trailing"), Ok(Some(Command::Stats)));
    }

    #[test]
    fn test_push() {
        assert_eq!(parse_line("push 42"), Ok(Some(Command::Push(42))));
        assert_eq!(parse_line("push -7"), Ok(Some(Command::Push(-7))));
        assert_eq!(parse_line("push +3"), Ok(Some(Command::Push(3))));
        assert_eq!(
            parse_line("push"),
            Err(ParseError::MissingArgument {
                command: "push",
                name: "value"
            })
        );
        assert_eq!(
            parse_line("push x1"),
            Err(ParseError::InvalidInteger("x1".to_string()))
        );
        assert_eq!(
            parse_line("push 3000000000"),
            Err(ParseError::OutOfRange("3000000000".to_string()))
        );
    }

    #[test]
    fn test_depth_arguments() {
        assert_eq!(parse_line("show"), Ok(Some(Command::Show(0))));
        assert_eq!(parse_line("show 2"), Ok(Some(Command::Show(2))));
        assert_eq!(parse_line("dup 1"), Ok(Some(Command::Dup(1))));
        assert_eq!(
            parse_line("show -1"),
            Err(ParseError::OutOfRange("-1".to_string()))
        );
        assert_eq!(
            parse_line("setsecond 1 0"),
            Ok(Some(Command::SetField {
                field: PairField::Second,
                pair: 1,
                target: 0
            }))
        );
        assert_eq!(
            parse_line("setfirst 0"),
            Err(ParseError::MissingArgument {
                command: "setfirst",
                name: "target-depth"
            })
        );
    }

    #[test]
    fn test_rejects_extra_arguments() {
        assert_eq!(
            parse_line("pop 1"),
            Err(ParseError::UnexpectedArgument {
                command: "pop",
                arg: "1".to_string()
            })
        );
    }

    #[test]
    fn test_unknown_and_malformed() {
        assert_eq!(
            parse_line("frobnicate"),
            Err(ParseError::UnknownCommand("frobnicate".to_string()))
        );
        assert_eq!(
            parse_line("42"),
            Err(ParseError::Malformed("42".to_string()))
        );
    }

    #[test]
    fn test_display_parses_back() {
        let cmd = Command::SetField {
            field: PairField::First,
            pair: 2,
            target: 1,
        };
        assert_eq!(parse_line(&cmd.to_string()), Ok(Some(cmd)));
    }

    #[test]
    fn test_parse_script_line_numbers() {
        let source = "push 1\n\n# comment\npush 2\npair\n";
        let commands = parse_script(source).unwrap();
        assert_eq!(
            commands,
            vec![
                (1, Command::Push(1)),
                (4, Command::Push(2)),
                (5, Command::Pair)
            ]
        );

        let err = parse_script("push 1\nbogus\n").unwrap_err();
        assert_eq!(err.0, 2);
    }
}

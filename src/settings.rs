//! Engine settings and `setoption` parsing.
//!
//! [`Settings`] holds everything the controller can tune at runtime. It is
//! filled from the command line first, then updated by AEI `setoption`
//! commands (or `-O name=value` flags, which go through the same path).

use crate::constants::{DEFAULT_CONCURRENCY, DEFAULT_HASH_MB};
use crate::error::ParseError;
use crate::evaluator::EvaluatorKind;
use crate::timecontrol::TimeControl;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// Name reported by `id name`.
    pub bot_name: String,
    /// Number of search workers.
    pub concurrency: usize,
    /// Transposition table size in megabytes.
    pub hash_mb: usize,
    /// Stop once the most visited line has this many steps. 0 disables.
    pub depth: u8,
    /// Minimum line length before a time stop is honoured.
    pub min_depth: u8,
    /// Iteration budget per search. 0 means unlimited.
    pub playouts: u64,
    /// Seed for setup sampling and the random evaluator.
    pub seed: u64,
    pub use_table: bool,
    pub use_ponder: bool,
    pub evaluator: EvaluatorKind,
    pub time: TimeControl,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            bot_name: env!("CARGO_PKG_NAME").to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            hash_mb: DEFAULT_HASH_MB,
            depth: 0,
            min_depth: 0,
            playouts: 0,
            seed: 0,
            use_table: true,
            use_ponder: true,
            evaluator: EvaluatorKind::default(),
            time: TimeControl::new(),
        }
    }
}

fn bad(name: &str, value: &str) -> ParseError {
    ParseError::OptionValue {
        name: name.to_string(),
        value: value.to_string(),
    }
}

fn parse_num<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ParseError> {
    value.parse().map_err(|_| bad(name, value))
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ParseError> {
    match value {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        _ => Err(bad(name, value)),
    }
}

/// Split the arguments of `setoption` (`name <X> value <Y>`).
pub fn parse_setoption(args: &str) -> Result<(String, String), ParseError> {
    let tokens: Vec<&str> = args.split_whitespace().collect();
    match tokens.as_slice() {
        ["name", name, "value", value] => Ok((name.to_string(), value.to_string())),
        _ => Err(ParseError::SetOption(args.to_string())),
    }
}

/// Split a `name=value` command line override.
pub fn parse_override(s: &str) -> Result<(String, String), ParseError> {
    match s.split_once('=') {
        Some((name, value)) if !name.is_empty() && !value.is_empty() => {
            Ok((name.to_string(), value.trim_matches('"').to_string()))
        }
        _ => Err(ParseError::SetOption(s.to_string())),
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one option.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), ParseError> {
        match name {
            "tcmove" | "tcreserve" | "tcmax" | "tctotal" | "tcturns" | "tcturntime"
            | "greserve" | "sreserve" | "gused" | "sused" | "moveused" | "lastmoveused" => {
                let secs: u64 = parse_num(name, value)?;
                self.time.apply(name, secs);
            }
            "tcpercent" => {
                let pct: u64 = parse_num(name, value)?;
                if pct > 100 {
                    return Err(bad(name, value));
                }
                self.time.apply(name, pct);
            }
            "hash" => self.hash_mb = parse_num(name, value)?,
            "depth" => self.depth = parse_num(name, value)?,
            "mindepth" => self.min_depth = parse_num(name, value)?,
            "playouts" => self.playouts = parse_num(name, value)?,
            "seed" => self.seed = parse_num(name, value)?,
            "goroutines" | "concurrency" => {
                let n: usize = parse_num(name, value)?;
                if n == 0 {
                    return Err(bad(name, value));
                }
                self.concurrency = n;
            }
            "use_transposition_table" => self.use_table = parse_bool(name, value)?,
            "use_ponder" => self.use_ponder = parse_bool(name, value)?,
            "evaluator" => self.evaluator = value.parse()?,
            _ => return Err(ParseError::UnknownOption(name.to_string())),
        }
        Ok(())
    }

    /// Parse and apply the arguments of a `setoption` command.
    pub fn set_option(&mut self, args: &str) -> Result<(String, String), ParseError> {
        let (name, value) = parse_setoption(args)?;
        self.set(&name, &value)?;
        Ok((name, value))
    }
}

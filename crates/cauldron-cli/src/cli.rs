//! Command-line parsing for the `cauldron` binary.

use std::path::{Path, PathBuf};

use cauldron::{ConfigError, Policy};

use crate::feast::FeastConfig;
use crate::race::CounterKind;

pub const USAGE: &str = "\
Usage:
  cauldron feast [--policy unordered|turn-ordered] [options]
  cauldron race <increments> <decrements> [--unsync] [--json]

Feast options:
  --config <file>       JSON feast configuration to start from
  --policy <policy>     unordered or turn-ordered [default: unordered]
  --capacity <n>        Servings the pot holds [default: 5]
  --savages <n>         Savages at the table [default: 8 unordered, 3 turn-ordered]
  --meals <n>           Servings each unordered savage eats [default: 1]
  --eat-ms <ms>         Eating time per serving [default: 100 unordered, 300 turn-ordered]
  --duration-ms <ms>    Length of a turn-ordered feast [default: 10000]
  --limit <n>           Close a turn-ordered pot after n servings
  --json                Print the report as JSON

Race options:
  --unsync              Use the unsynchronized counter
  --json                Print the outcome as JSON";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Feast(FeastOptions),
    Race {
        increments: usize,
        decrements: usize,
        counter: CounterKind,
        json: bool,
    },
}

/// Feast flags as given; resolved into a [`FeastConfig`] by [`FeastOptions::resolve`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeastOptions {
    pub config: Option<PathBuf>,
    pub policy: Option<Policy>,
    pub capacity: Option<usize>,
    pub savages: Option<usize>,
    pub meals: Option<u32>,
    pub eat_ms: Option<u64>,
    pub duration_ms: Option<u64>,
    pub limit: Option<u64>,
    pub json: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid feast configuration in {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

impl FeastOptions {
    /// Start from the config file (or the policy's defaults) and apply flags.
    pub fn resolve(&self) -> Result<FeastConfig, CliError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => FeastConfig::for_policy(self.policy.unwrap_or_default()),
        };

        if let Some(policy) = self.policy {
            config.pot.policy = policy;
        }
        if let Some(capacity) = self.capacity {
            config.pot.capacity = capacity;
        }
        if let Some(savages) = self.savages {
            config.pot.consumers = savages;
        }
        if let Some(meals) = self.meals {
            config.meals = meals;
        }
        if let Some(eat_ms) = self.eat_ms {
            config.eat_ms = eat_ms;
        }
        if let Some(duration_ms) = self.duration_ms {
            config.duration_ms = Some(duration_ms);
        }
        if let Some(limit) = self.limit {
            config.pot.service_limit = Some(limit);
        }
        Ok(config)
    }
}

fn load_config(path: &Path) -> Result<FeastConfig, CliError> {
    let raw = std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| CliError::Parse {
        path: path.display().to_string(),
        source,
    })
}

/// Parse `argv` (including the program name). An empty error message means
/// help was requested.
pub fn parse_args(args: &[String]) -> Result<Command, String> {
    let mut rest = args.iter().skip(1).map(String::as_str);

    match rest.next() {
        Some("feast") => parse_feast(rest).map(Command::Feast),
        Some("race") => parse_race(rest),
        Some("--help" | "-h") | None => Err(String::new()),
        Some(other) => Err(format!("unknown command: {other}")),
    }
}

fn parse_feast<'a>(mut args: impl Iterator<Item = &'a str>) -> Result<FeastOptions, String> {
    let mut options = FeastOptions::default();

    while let Some(arg) = args.next() {
        let mut value = |flag: &str| {
            args.next()
                .ok_or_else(|| format!("{flag} requires a value"))
        };
        match arg {
            "--config" => options.config = Some(PathBuf::from(value(arg)?)),
            "--policy" => {
                options.policy = Some(
                    value(arg)?
                        .parse::<Policy>()
                        .map_err(|e: ConfigError| e.to_string())?,
                )
            }
            "--capacity" => options.capacity = Some(number(arg, value(arg)?)?),
            "--savages" => options.savages = Some(number(arg, value(arg)?)?),
            "--meals" => options.meals = Some(number(arg, value(arg)?)?),
            "--eat-ms" => options.eat_ms = Some(number(arg, value(arg)?)?),
            "--duration-ms" => options.duration_ms = Some(number(arg, value(arg)?)?),
            "--limit" => options.limit = Some(number(arg, value(arg)?)?),
            "--json" => options.json = true,
            "--help" | "-h" => return Err(String::new()),
            other => return Err(format!("unknown flag: {other}")),
        }
    }

    Ok(options)
}

fn parse_race<'a>(args: impl Iterator<Item = &'a str>) -> Result<Command, String> {
    let mut counts = Vec::new();
    let mut counter = CounterKind::Synchronized;
    let mut json = false;

    for arg in args {
        match arg {
            "--unsync" => counter = CounterKind::Unsynchronized,
            "--json" => json = true,
            "--help" | "-h" => return Err(String::new()),
            flag if flag.starts_with('-') => return Err(format!("unknown flag: {flag}")),
            count => counts.push(number::<usize>("thread count", count)?),
        }
    }

    match counts[..] {
        [increments, decrements] => Ok(Command::Race {
            increments,
            decrements,
            counter,
            json,
        }),
        _ => Err("race requires <increments> and <decrements>".to_string()),
    }
}

fn number<T: std::str::FromStr>(what: &str, raw: &str) -> Result<T, String> {
    raw.parse()
        .map_err(|_| format!("{what} expects a non-negative integer, got '{raw}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        std::iter::once("cauldron")
            .chain(args.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn feast_defaults_follow_policy() {
        let Command::Feast(options) = parse_args(&argv(&["feast", "--policy", "turn-ordered"]))
            .unwrap()
        else {
            panic!("expected feast command");
        };
        let config = options.resolve().unwrap();
        assert_eq!(config, FeastConfig::for_policy(Policy::TurnOrdered));
    }

    #[test]
    fn feast_flags_override_defaults() {
        let Command::Feast(options) = parse_args(&argv(&[
            "feast",
            "--capacity",
            "7",
            "--savages",
            "4",
            "--meals",
            "2",
            "--eat-ms",
            "0",
            "--json",
        ]))
        .unwrap() else {
            panic!("expected feast command");
        };
        assert!(options.json);

        let config = options.resolve().unwrap();
        assert_eq!(config.pot.capacity, 7);
        assert_eq!(config.pot.consumers, 4);
        assert_eq!(config.meals, 2);
        assert_eq!(config.eat_ms, 0);
        assert_eq!(config.pot.policy, Policy::Unordered);
    }

    #[test]
    fn race_parses_counts_and_mode() {
        assert_eq!(
            parse_args(&argv(&["race", "3", "1", "--unsync", "--json"])).unwrap(),
            Command::Race {
                increments: 3,
                decrements: 1,
                counter: CounterKind::Unsynchronized,
                json: true,
            }
        );
        assert_eq!(
            parse_args(&argv(&["race", "2", "2"])).unwrap(),
            Command::Race {
                increments: 2,
                decrements: 2,
                counter: CounterKind::Synchronized,
                json: false,
            }
        );
    }

    #[test]
    fn parse_errors_are_readable() {
        insta::assert_snapshot!(
            parse_args(&argv(&["race", "3"])).unwrap_err(),
            @"race requires <increments> and <decrements>"
        );
        insta::assert_snapshot!(
            parse_args(&argv(&["feast", "--capacity", "lots"])).unwrap_err(),
            @"--capacity expects a non-negative integer, got 'lots'"
        );
        insta::assert_snapshot!(
            parse_args(&argv(&["feast", "--policy", "fifo"])).unwrap_err(),
            @"unknown policy 'fifo', expected 'unordered' or 'turn-ordered'"
        );
        insta::assert_snapshot!(
            parse_args(&argv(&["feast", "--limit"])).unwrap_err(),
            @"--limit requires a value"
        );
        insta::assert_snapshot!(parse_args(&argv(&["dance"])).unwrap_err(), @"unknown command: dance");
    }

    #[test]
    fn help_is_an_empty_error() {
        assert_eq!(parse_args(&argv(&[])).unwrap_err(), "");
        assert_eq!(parse_args(&argv(&["feast", "--help"])).unwrap_err(), "");
    }

    #[test]
    fn missing_config_file_is_reported() {
        let options = FeastOptions {
            config: Some(PathBuf::from("/nonexistent/feast.json")),
            ..FeastOptions::default()
        };
        assert!(matches!(options.resolve(), Err(CliError::Read { .. })));
    }
}

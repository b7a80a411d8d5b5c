use std::fmt;
use std::path::PathBuf;

use practice_core::model::{
    DetectionMode, Difficulty, Pose, PoseParseError, PracticeSettings, PracticeSettingsDraft,
    SettingsError, UserId,
};
use services::HistoryQuery;

pub const DEFAULT_DB_URL: &str = "sqlite://practice.sqlite3";
const DEFAULT_SIMULATED_TICKS: u32 = 25;

#[derive(Debug)]
pub enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidNumber { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
    Core(practice_core::Error),
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::Core(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<PoseParseError> for ArgsError {
    fn from(err: PoseParseError) -> Self {
        ArgsError::Core(err.into())
    }
}

impl From<SettingsError> for ArgsError {
    fn from(err: SettingsError) -> Self {
        ArgsError::Core(err.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Stats,
    History,
    Submit,
    Award,
    Clear,
    Repair,
    Simulate,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "stats" => Some(Self::Stats),
            "history" => Some(Self::History),
            "submit" => Some(Self::Submit),
            "award" => Some(Self::Award),
            "clear" => Some(Self::Clear),
            "repair" => Some(Self::Repair),
            "simulate" => Some(Self::Simulate),
            _ => None,
        }
    }

    fn needs_user(self) -> bool {
        !matches!(self, Self::Repair)
    }
}

pub fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  app stats    --user <id>");
    eprintln!("  app history  --user <id> [--pose <name>] [--page <n>] [--limit <n>]");
    eprintln!("  app submit   --user <id>            # session JSON on stdin");
    eprintln!("  app award    --user <id> --id <achievement> --title <t> --description <d>");
    eprintln!("  app clear    --user <id>");
    eprintln!("  app repair");
    eprintln!("  app simulate --user <id> --pose <name> [--confidences 40,85,99] [--ticks <n>]");
    eprintln!();
    eprintln!("Common flags:");
    eprintln!("  --db <sqlite_url> | --local <dir>");
    eprintln!("  --difficulty beginner|intermediate|advanced  --threshold <80-99>");
    eprintln!("  --tick-ms <ms>  --mode local|server  --verbose");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  PRACTICE_DB_URL, PRACTICE_HOLD_THRESHOLD, PRACTICE_TICK_MS, RUST_LOG");
}

/// Where aggregates are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Sqlite(String),
    Local(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AwardArgs {
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Args {
    pub command: Command,
    pub backend: Backend,
    pub verbose: bool,
    pub settings: PracticeSettings,
    pub user: Option<UserId>,
    pub history: HistoryQuery,
    pub pose: Option<Pose>,
    pub confidences: Vec<f64>,
    pub ticks: u32,
    pub award: AwardArgs,
}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_number<T: std::str::FromStr>(flag: &'static str, raw: String) -> Result<T, ArgsError> {
    raw.trim()
        .parse()
        .map_err(|_| ArgsError::InvalidNumber { flag, raw })
}

fn parse_confidences(raw: String) -> Result<Vec<f64>, ArgsError> {
    raw.split(',')
        .map(|part| parse_number("--confidences", part.to_owned()))
        .collect()
}

fn parse_mode(raw: &str) -> Result<DetectionMode, ArgsError> {
    match raw.trim() {
        "local" => Ok(DetectionMode::Local),
        "server" => Ok(DetectionMode::Server),
        _ => Err(ArgsError::UnknownArg(format!("--mode {raw}"))),
    }
}

impl Args {
    /// Parse `argv` (without the program name), layering flags over environment values.
    pub fn parse(
        argv: impl IntoIterator<Item = String>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ArgsError> {
        let mut args = argv.into_iter();
        let first = args.next().ok_or(ArgsError::MissingFlag { flag: "<command>" })?;
        let command =
            Command::from_arg(&first).ok_or_else(|| ArgsError::UnknownCommand(first.clone()))?;

        let mut backend = Backend::Sqlite(
            env("PRACTICE_DB_URL").map_or_else(|| DEFAULT_DB_URL.into(), normalize_sqlite_url),
        );
        let mut draft = PracticeSettingsDraft {
            threshold: env("PRACTICE_HOLD_THRESHOLD").and_then(|v| v.trim().parse().ok()),
            tick_interval_ms: env("PRACTICE_TICK_MS").and_then(|v| v.trim().parse().ok()),
            ..PracticeSettingsDraft::new()
        };
        let mut verbose = false;
        let mut user = None;
        let mut history = HistoryQuery::default();
        let mut pose = None;
        let mut confidences = Vec::new();
        let mut ticks = DEFAULT_SIMULATED_TICKS;
        let mut award = AwardArgs::default();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    backend = Backend::Sqlite(normalize_sqlite_url(value));
                }
                "--local" => {
                    backend = Backend::Local(PathBuf::from(require_value(&mut args, "--local")?));
                }
                "--user" => {
                    let value = require_value(&mut args, "--user")?;
                    user = Some(UserId::new(parse_number("--user", value)?));
                }
                "--pose" => {
                    let parsed: Pose = require_value(&mut args, "--pose")?.parse()?;
                    pose = Some(parsed);
                    history.pose = Some(parsed);
                }
                "--page" => history.page = parse_number("--page", require_value(&mut args, "--page")?)?,
                "--limit" => {
                    history.limit = parse_number("--limit", require_value(&mut args, "--limit")?)?;
                }
                "--difficulty" => {
                    let parsed: Difficulty = require_value(&mut args, "--difficulty")?.parse()?;
                    draft.difficulty = Some(parsed);
                }
                "--threshold" => {
                    let value = require_value(&mut args, "--threshold")?;
                    draft.threshold = Some(parse_number("--threshold", value)?);
                }
                "--tick-ms" => {
                    let value = require_value(&mut args, "--tick-ms")?;
                    draft.tick_interval_ms = Some(parse_number("--tick-ms", value)?);
                }
                "--mode" => {
                    draft.detection_mode = Some(parse_mode(&require_value(&mut args, "--mode")?)?);
                }
                "--confidences" => {
                    confidences = parse_confidences(require_value(&mut args, "--confidences")?)?;
                }
                "--ticks" => ticks = parse_number("--ticks", require_value(&mut args, "--ticks")?)?,
                "--id" => award.id = Some(require_value(&mut args, "--id")?),
                "--title" => award.title = Some(require_value(&mut args, "--title")?),
                "--description" => {
                    award.description = Some(require_value(&mut args, "--description")?);
                }
                "--verbose" | "-v" => verbose = true,
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        if command.needs_user() && user.is_none() {
            return Err(ArgsError::MissingFlag { flag: "--user" });
        }
        if command == Command::Simulate && pose.is_none() {
            return Err(ArgsError::MissingFlag { flag: "--pose" });
        }

        Ok(Self {
            command,
            backend,
            verbose,
            settings: draft.validate()?,
            user,
            history,
            pose,
            confidences,
            ticks,
            award,
        })
    }
}

pub fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

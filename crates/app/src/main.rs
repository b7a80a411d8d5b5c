mod args;

use std::io::Read;
use std::time::Duration;

use practice_core::hold_timer::Zone;
use practice_core::model::{AchievementSubmission, SessionSubmission, UserId};
use serde_json::json;
use services::{AppServices, Clock, PracticeLoop, ScriptedFrames, StatsView};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::args::{Args, ArgsError, AwardArgs, Backend, Command, print_usage};

/// Confidence ramp used by `simulate` when no script is given.
const DEFAULT_SCRIPT: [f64; 6] = [35.0, 62.0, 84.0, 96.0, 98.0, 99.0];

fn init_tracing(verbose: bool) {
    // --verbose > RUST_LOG > "warn"
    let filter = if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

fn required_user(args: &Args) -> Result<UserId, ArgsError> {
    args.user.ok_or(ArgsError::MissingFlag { flag: "--user" })
}

fn award_submission(award: &AwardArgs) -> Result<AchievementSubmission, ArgsError> {
    let field = |value: &Option<String>, flag: &'static str| {
        value.clone().ok_or(ArgsError::MissingFlag { flag })
    };
    Ok(AchievementSubmission {
        achievement_id: field(&award.id, "--id")?,
        title: field(&award.title, "--title")?,
        description: field(&award.description, "--description")?,
    })
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    if matches!(argv.first().map(String::as_str), None | Some("--help" | "-h")) {
        print_usage();
        return Ok(());
    }

    let args = Args::parse(argv, |key| std::env::var(key).ok()).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;
    init_tracing(args.verbose);

    // Open + migrate storage at startup. Keep this in the binary glue so core/services stay pure.
    let clock = Clock::default_clock();
    let app = match &args.backend {
        Backend::Sqlite(url) => {
            prepare_sqlite_file(url)?;
            AppServices::new_sqlite(url, clock, args.settings).await?
        }
        Backend::Local(dir) => AppServices::new_local(dir.clone(), clock, args.settings).await?,
    };
    let progress = app.progress();

    match args.command {
        Command::Stats => {
            let view = progress.stats(required_user(&args)?).await?;
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        Command::History => {
            let page = progress.history(required_user(&args)?, args.history).await?;
            println!("{}", serde_json::to_string_pretty(&page)?);
        }
        Command::Submit => {
            let mut input = String::new();
            std::io::stdin().read_to_string(&mut input)?;
            let submission: SessionSubmission = serde_json::from_str(&input)?;
            let outcome = progress
                .add_session(required_user(&args)?, &submission)
                .await?;
            let body = json!({
                "duplicate": outcome.duplicate,
                "unlocked": outcome.unlocked,
                "stats": StatsView::from_progress(&outcome.progress),
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Command::Award => {
            let submission = award_submission(&args.award)?;
            let outcome = progress
                .add_achievement(required_user(&args)?, &submission)
                .await?;
            let body = json!({
                "achievementId": submission.achievement_id,
                "added": outcome.added,
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Command::Clear => {
            let deleted = progress.clear(required_user(&args)?).await?;
            println!("{}", json!({ "deleted": deleted }));
        }
        Command::Repair => {
            let report = app.repair().run().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Simulate => simulate(&app, &args).await?,
    }

    Ok(())
}

/// Drive a practice loop from a scripted confidence stream, then submit the session.
async fn simulate(app: &AppServices, args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let user = required_user(args)?;
    let pose = args.pose.ok_or(ArgsError::MissingFlag { flag: "--pose" })?;
    let script = if args.confidences.is_empty() {
        DEFAULT_SCRIPT.to_vec()
    } else {
        args.confidences.clone()
    };

    let settings = app.settings();
    let (handle, mut readings) =
        PracticeLoop::spawn(ScriptedFrames::new(script), pose, settings, app.clock());

    let watcher = tokio::spawn(async move {
        let mut last_zone: Option<Zone> = None;
        while let Some(reading) = readings.recv().await {
            if last_zone != Some(reading.zone) {
                info!(zone = reading.zone.label(), "{}", reading.zone.prompt());
                last_zone = Some(reading.zone);
            }
        }
    });

    let tick = Duration::from_millis(settings.tick_interval_ms());
    tokio::time::sleep(tick.saturating_mul(args.ticks)).await;
    let session = handle.stop().await?;
    // The loop dropped its sender, so the watcher drains and exits.
    let _ = watcher.await;

    // Submit through the same wire shape a remote client would post.
    let outcome = app
        .progress()
        .add_session(user, &SessionSubmission::from_session(&session))
        .await?;
    let target_hold = settings.difficulty().target_hold_secs();
    let body = json!({
        "session": session,
        "targetHold": target_hold,
        "targetReached": session.best_hold() >= f64::from(target_hold),
        "unlocked": outcome.unlocked,
        "stats": StatsView::from_progress(&outcome.progress),
    });
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}

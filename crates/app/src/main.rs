use std::fmt;
use std::path::PathBuf;

use services::{AppServices, SeedDataset};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod terminal;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    IncompleteDataset,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::IncompleteDataset => {
                write!(f, "--grammar and --questions must be given together")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

struct Args {
    db_url: String,
    grammar_json: Option<PathBuf>,
    questions_json: Option<PathBuf>,
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  bunpo [quiz]        [--db <sqlite_url>] [--grammar <json> --questions <json>]");
    eprintln!("  bunpo achievements  [--db <sqlite_url>] [--grammar <json> --questions <json>]");
    eprintln!("  bunpo seed          [--db <sqlite_url>] [--grammar <json> --questions <json>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite://bunpo.sqlite3");
    eprintln!("  --grammar/--questions: the bundled N5 dataset");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  BUNPO_DB_URL, BUNPO_GRAMMAR_JSON, BUNPO_QUESTIONS_JSON, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Quiz,
    Achievements,
    Seed,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "quiz" => Some(Self::Quiz),
            "achievements" => Some(Self::Achievements),
            "seed" => Some(Self::Seed),
            _ => None,
        }
    }
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("BUNPO_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://bunpo.sqlite3".into(), normalize_sqlite_url);
        let mut grammar_json = std::env::var_os("BUNPO_GRAMMAR_JSON").map(PathBuf::from);
        let mut questions_json = std::env::var_os("BUNPO_QUESTIONS_JSON").map(PathBuf::from);

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--grammar" => {
                    grammar_json = Some(require_value(args, "--grammar")?.into());
                }
                "--questions" => {
                    questions_json = Some(require_value(args, "--questions")?.into());
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        if grammar_json.is_some() != questions_json.is_some() {
            return Err(ArgsError::IncompleteDataset);
        }

        Ok(Self {
            db_url,
            grammar_json,
            questions_json,
        })
    }

    fn dataset(&self) -> Result<SeedDataset, Box<dyn std::error::Error>> {
        match (&self.grammar_json, &self.questions_json) {
            (Some(grammar), Some(questions)) => {
                let grammar = std::fs::read_to_string(grammar)?;
                let questions = std::fs::read_to_string(questions)?;
                Ok(SeedDataset::from_json(&grammar, &questions)?)
            }
            _ => Ok(SeedDataset::bundled()?),
        }
    }
}

fn normalize_sqlite_url(raw: String) -> String {
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

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    // No subcommand means a quiz.
    let cmd = match argv.first().map(String::as_str) {
        None => Command::Quiz,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Quiz,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let parsed = Args::parse(&mut argv.into_iter()).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let dataset = parsed.dataset()?;
    prepare_sqlite_file(&parsed.db_url)?;
    info!(db = %parsed.db_url, ?cmd, "opening database");
    let services = AppServices::new_sqlite(&parsed.db_url, &dataset).await?;

    match cmd {
        Command::Quiz => terminal::run_quiz(services.quiz()).await?,
        Command::Achievements => terminal::run_achievements(&services.achievements()).await?,
        Command::Seed => {
            let report = services.seeded();
            println!(
                "seeded {} grammar points and {} questions into {}",
                report.grammar_points, report.questions, parsed.db_url
            );
        }
    }

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
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

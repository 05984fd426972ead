//! `circadian` command-line front end.
//!
//! # Responsibility
//! - Expose data entry, browsing, export/import and maintenance over the
//!   core store.
//! - Print core error messages verbatim and exit non-zero on failure.
//!
//! # Invariants
//! - The CLI never writes the data file directly; every change goes through
//!   `circadian_core`.

use chrono::{Local, NaiveDate};
use circadian_core::model::record::format_timestamp;
use circadian_core::{
    init_logging, LogConfig, MeasurementQuery, MeasurementRecord, MeasurementRepository,
    MeasurementService, MetricSummary, PersonFilter, RawEntry, StoreConfig,
};
use clap::{Args, Parser, Subcommand};
use log::info;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

type CliResult = Result<(), Box<dyn Error>>;

/// Record and inspect circadian health measurements stored in a CSV file.
#[derive(Parser)]
#[command(name = "circadian", version)]
struct Cli {
    /// Data file. Defaults to `$CIRCADIAN_DATA_PATH`, then `./circadian_data.csv`.
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    /// trace|debug|info|warn|error. Defaults to `$CIRCADIAN_LOG_LEVEL`.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Directory for rolling log files. Logging stays off when unset.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the data file with its header if it does not exist.
    Init,

    /// Record one measurement.
    Add {
        #[arg(long)]
        person: String,
        /// `YYYY-MM-DD HH:MM[:SS]`; defaults to now.
        #[arg(long)]
        timestamp: Option<String>,
        #[arg(long)]
        heart_rate: String,
        #[arg(long)]
        systolic: String,
        #[arg(long)]
        diastolic: String,
        /// Subjective energy, 1-10.
        #[arg(long)]
        energy: String,
        #[arg(long, default_value = "")]
        notes: String,
    },

    /// Show stored records.
    List {
        #[command(flatten)]
        filters: FilterArgs,
        /// Print records as a JSON array.
        #[arg(long)]
        json: bool,
    },

    /// Write records as CSV to a file or stdout.
    Export {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Import rows from a CSV file, skipping invalid and duplicate rows.
    Import { file: PathBuf },

    /// Delete every record of one person.
    DeletePerson { person: String },

    /// Delete all records.
    Clear {
        /// Confirm the deletion.
        #[arg(long)]
        yes: bool,
    },

    /// Summary statistics and hour-of-day averages.
    Stats {
        #[arg(long)]
        person: Option<String>,
    },

    /// Copy valid records to a backup file.
    Backup {
        /// Defaults to `<data stem>_backup_YYYYMMDD_HHMMSS.csv` beside the data file.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Default)]
struct FilterArgs {
    /// Person id, or `all`.
    #[arg(long)]
    person: Option<String>,
    /// First day to include (YYYY-MM-DD).
    #[arg(long, value_parser = parse_date)]
    from: Option<NaiveDate>,
    /// Last day to include (YYYY-MM-DD).
    #[arg(long, value_parser = parse_date)]
    to: Option<NaiveDate>,
    /// Case-insensitive text the notes must contain.
    #[arg(long)]
    notes: Option<String>,
    /// Case-insensitive text matched against person id or notes.
    #[arg(long)]
    search: Option<String>,
}

impl FilterArgs {
    fn to_query(&self) -> MeasurementQuery {
        MeasurementQuery {
            person: self
                .person
                .as_deref()
                .map(PersonFilter::from_selection)
                .unwrap_or_default(),
            from: self.from.and_then(|day| day.and_hms_opt(0, 0, 0)),
            to: self.to.and_then(|day| day.and_hms_opt(23, 59, 59)),
            notes_contains: self.notes.clone(),
            search: self.search.clone(),
            ..MeasurementQuery::all()
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    start_logging(&cli);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> CliResult {
    let mut config = StoreConfig::from_env();
    if let Some(data) = cli.data {
        config = config.with_data_path(data);
    }
    let repo = config.open();
    info!("event=cli_command module=cli status=start command={}", cli.command.name());

    match cli.command {
        Command::Init => {
            repo.ensure_initialized()?;
            println!("data file ready: {}", repo.path().display());
        }
        Command::Add {
            person,
            timestamp,
            heart_rate,
            systolic,
            diastolic,
            energy,
            notes,
        } => {
            let raw = RawEntry {
                person_id: person,
                timestamp: timestamp
                    .unwrap_or_else(|| format_timestamp(&Local::now().naive_local())),
                heart_rate,
                systolic_bp: systolic,
                diastolic_bp: diastolic,
                energy_level: energy,
                notes,
            };
            repo.ensure_initialized()?;
            let service = MeasurementService::with_policy(repo, config.policy);
            let receipt = service.submit_entry(&raw)?;
            println!("saved: {}", receipt.record.key());
            for warning in receipt.warnings {
                println!("warning: {warning}");
            }
        }
        Command::List { filters, json } => {
            let records = repo.query(&filters.to_query())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                print_records(&records);
            }
        }
        Command::Export { filters, output } => {
            let csv = repo.export(&filters.to_query())?;
            match output {
                Some(path) => {
                    write_file(&path, &csv)?;
                    println!("exported to {}", path.display());
                }
                None => print!("{csv}"),
            }
        }
        Command::Import { file } => {
            let raw_csv = fs::read_to_string(&file)
                .map_err(|err| format!("failed to read `{}`: {err}", file.display()))?;
            repo.ensure_initialized()?;
            let report = repo.import_records(&raw_csv)?;
            println!("{report}");
            for issue in &report.issues {
                println!("  {issue}");
            }
        }
        Command::DeletePerson { person } => {
            let removed = repo.delete_by_person(&person)?;
            println!("deleted {removed} records");
        }
        Command::Clear { yes } => {
            if !yes {
                return Err("refusing to delete all records without --yes".into());
            }
            repo.delete_all()?;
            println!("all records deleted");
        }
        Command::Stats { person } => {
            let person = person.filter(|person| !person.trim().eq_ignore_ascii_case("all"));
            let service = MeasurementService::with_policy(repo, config.policy);
            let Some(stats) = service.summary(person.as_deref())? else {
                println!("no records");
                return Ok(());
            };
            println!("entries: {}", stats.total_entries);
            println!("people: {}", stats.unique_people);
            println!(
                "range: {} .. {}",
                format_timestamp(&stats.first_timestamp),
                format_timestamp(&stats.last_timestamp)
            );
            print_metric("heart_rate", &stats.heart_rate);
            print_metric("systolic_bp", &stats.systolic_bp);
            print_metric("diastolic_bp", &stats.diastolic_bp);
            print_metric("energy_level", &stats.energy_level);

            let query = match &person {
                Some(person) => MeasurementQuery::for_person(person.as_str()),
                None => MeasurementQuery::all(),
            };
            println!("hour  count  heart_rate  systolic  diastolic  energy");
            for hour in service.hourly_profile(&query)? {
                println!(
                    "{:02}    {:>5}  {:>10.1}  {:>8.1}  {:>9.1}  {:>6.1}",
                    hour.hour,
                    hour.count,
                    hour.heart_rate,
                    hour.systolic_bp,
                    hour.diastolic_bp,
                    hour.energy_level
                );
            }
        }
        Command::Backup { output } => {
            let written = repo.backup(output.as_deref())?;
            println!("backup written to {}", written.display());
        }
    }

    Ok(())
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Add { .. } => "add",
            Self::List { .. } => "list",
            Self::Export { .. } => "export",
            Self::Import { .. } => "import",
            Self::DeletePerson { .. } => "delete-person",
            Self::Clear { .. } => "clear",
            Self::Stats { .. } => "stats",
            Self::Backup { .. } => "backup",
        }
    }
}

/// Starts file logging when a directory is configured; failures only warn.
fn start_logging(cli: &Cli) {
    let mut config = LogConfig::from_env();
    if let Some(level) = &cli.log_level {
        config.level = level.clone();
    }
    if let Some(dir) = &cli.log_dir {
        config.log_dir = Some(dir.clone());
    }
    let Some(log_dir) = config.log_dir else {
        return;
    };

    let log_dir = absolute(&log_dir);
    if let Err(err) = init_logging(&config.level, &log_dir) {
        eprintln!("warning: logging disabled: {err}");
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| format!("invalid date `{value}`; use YYYY-MM-DD"))
}

fn write_file(path: &Path, contents: &str) -> CliResult {
    fs::write(path, contents)
        .map_err(|err| format!("failed to write `{}`: {err}", path.display()).into())
}

fn print_records(records: &[MeasurementRecord]) {
    if records.is_empty() {
        println!("no records");
        return;
    }
    println!("#    person_id             timestamp            hr   sys  dia  energy  notes");
    for (index, record) in records.iter().enumerate() {
        println!(
            "{:<4} {:<20}  {}  {:>3}  {:>3}  {:>3}  {:>6}  {}",
            index,
            record.person_id,
            format_timestamp(&record.timestamp),
            record.heart_rate,
            record.systolic_bp,
            record.diastolic_bp,
            record.energy_level,
            record.notes.as_deref().unwrap_or("")
        );
    }
}

fn print_metric(name: &str, metric: &MetricSummary) {
    let std_dev = metric
        .std_dev
        .map(|value| format!("{value:.1}"))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{name}: mean {:.1} std {std_dev} min {} max {}",
        metric.mean, metric.min, metric.max
    );
}

#[cfg(test)]
mod tests {
    use super::{parse_date, Cli, Command, FilterArgs};
    use circadian_core::PersonFilter;
    use clap::{CommandFactory, Parser};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn filters_cover_whole_days() {
        let filters = FilterArgs {
            person: Some("ALL".to_string()),
            from: Some(parse_date("2024-01-01").unwrap()),
            to: Some(parse_date("2024-01-02").unwrap()),
            notes: None,
            search: None,
        };
        let query = filters.to_query();
        assert_eq!(query.person, PersonFilter::All);
        assert_eq!(
            query.to.unwrap().format("%Y-%m-%d %H:%M:%S").to_string(),
            "2024-01-02 23:59:59"
        );
    }

    #[test]
    fn search_flag_reaches_query() {
        let cli = Cli::try_parse_from(["circadian", "list", "--search", "ali"]).unwrap();
        match cli.command {
            Command::List { filters, .. } => {
                assert_eq!(filters.to_query().search.as_deref(), Some("ali"));
            }
            _ => panic!("expected list command"),
        }
    }

    #[test]
    fn parse_date_rejects_other_formats() {
        assert!(parse_date("01/02/2024").is_err());
    }
}

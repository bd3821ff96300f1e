use clap::Parser;
use common::model::status::ResponseStatus;
use env_logger::Env;
use form_validator::cli::{Args, Command};
use form_validator::config::{load_config, ValidatorConfig};
use form_validator::services::directory::RestDirectory;
use form_validator::services::history::ResultLog;
use form_validator::services::sheet::{CsvSheet, SheetColumns, SheetStore};
use form_validator::ResponseValidator;
use log::error;
use std::collections::BTreeMap;
use std::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::init_from_env(Env::default().default_filter_or("info"));
    let args = Args::parse();

    match execute(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn execute(args: &Args) -> Result<(), Box<dyn Error>> {
    let config = load_config(&args.config)?;
    match args.command() {
        Command::Run { dry_run, json } => run(&config, dry_run, json),
        Command::Report => report(&config),
        Command::CheckConfig => check_config(&config),
    }
}

fn open_sheet(config: &ValidatorConfig) -> CsvSheet {
    CsvSheet::new(
        &config.sheet.path,
        SheetColumns {
            username: config.sheet.username_column.clone(),
            timestamp: config.sheet.timestamp_column.clone(),
            status: config.sheet.status_column.clone(),
        },
    )
}

fn run(config: &ValidatorConfig, dry_run: bool, json: bool) -> Result<(), Box<dyn Error>> {
    let token = config.directory.token()?;
    let log = config
        .history
        .db_path
        .as_deref()
        .map(ResultLog::open)
        .transpose()?;
    let mut sheet = open_sheet(config);

    // The session is only alive for the duration of the run.
    let summary = {
        let directory = RestDirectory::login(&config.directory, &token)?;
        let mut validator = ResponseValidator::new(config, &directory)?.dry_run(dry_run);
        validator.run(&mut sheet, log.as_ref())?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(())
}

fn report(config: &ValidatorConfig) -> Result<(), Box<dyn Error>> {
    let rows = open_sheet(config).read_rows()?;
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for row in &rows {
        *counts.entry(row.status.to_string()).or_insert(0) += 1;
    }

    println!("{}: {} row(s)", config.sheet.path.display(), rows.len());
    let unprocessed = counts.remove("unprocessed").unwrap_or(0);
    println!("  {:<18} {}", ResponseStatus::Unprocessed, unprocessed);
    for status in ResponseStatus::WRITABLE {
        let count = counts.remove(status.as_cell()).unwrap_or(0);
        println!("  {:<18} {}", status, count);
    }
    let other: usize = counts.values().sum();
    if other > 0 {
        println!("  {:<18} {}", "other", other);
    }
    Ok(())
}

fn check_config(config: &ValidatorConfig) -> Result<(), Box<dyn Error>> {
    println!("{}", toml::to_string_pretty(config)?);
    let token_state = match config.directory.token() {
        Ok(_) => "set",
        Err(_) => "NOT SET",
    };
    println!("# {} is {}", config.directory.token_env, token_state);
    Ok(())
}

//! CLI smoke entry point.
//!
//! # Responsibility
//! - Load a definition directory and print the registered entity types.
//! - Optionally dump every record of one entity from a SQLite file as JSON lines.

use datamapper_core::{
    core_version, default_log_level, init_logging, open_db, EntityBuilder, EntityConfig, Locator,
    RecursiveDirectoryStrategy, Repository, SqliteDataMapper, SqliteStore,
};
use log::info;
use std::path::PathBuf;
use std::process::ExitCode;

const USAGE: &str = "usage: datamapper_cli <definitions_dir> [--config <file>] \
[--log-dir <absolute_dir>] [--entity <name> --db <sqlite_file>]";

#[derive(Debug, Default)]
struct Args {
    definitions_dir: PathBuf,
    config: Option<PathBuf>,
    log_dir: Option<PathBuf>,
    entity: Option<String>,
    db: Option<PathBuf>,
}

fn parse_args(mut raw: impl Iterator<Item = String>) -> Result<Args, String> {
    let mut args = Args::default();
    let mut definitions_dir = None;

    while let Some(arg) = raw.next() {
        let mut value = |flag: &str| raw.next().ok_or_else(|| format!("{flag} needs a value"));
        match arg.as_str() {
            "--config" => args.config = Some(value("--config")?.into()),
            "--log-dir" => args.log_dir = Some(value("--log-dir")?.into()),
            "--entity" => args.entity = Some(value("--entity")?),
            "--db" => args.db = Some(value("--db")?.into()),
            flag if flag.starts_with("--") => return Err(format!("unknown flag `{flag}`")),
            _ if definitions_dir.is_none() => definitions_dir = Some(PathBuf::from(arg.as_str())),
            _ => return Err(format!("unexpected argument `{arg}`")),
        }
    }

    args.definitions_dir = definitions_dir.ok_or("missing <definitions_dir>")?;
    if args.entity.is_some() != args.db.is_some() {
        return Err("--entity and --db must be given together".to_string());
    }
    Ok(args)
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(log_dir) = &args.log_dir {
        init_logging(default_log_level(), log_dir)?;
    }

    let config = match &args.config {
        Some(path) => EntityConfig::from_file(path)?,
        None => EntityConfig::new(),
    };
    let locator =
        Locator::default().with_strategy(RecursiveDirectoryStrategy::new(&args.definitions_dir));
    let builder = EntityBuilder::load(&locator, &config)?;

    println!("datamapper_core version={}", core_version());
    for definition in builder.registry().iter() {
        println!("entity={} table={}", definition.name, definition.table);
    }

    if let (Some(entity), Some(db)) = (&args.entity, &args.db) {
        let conn = open_db(db)?;
        let fields: Vec<String> = builder
            .definition(entity)?
            .fields
            .iter()
            .map(|field| field.name.clone())
            .collect();
        let store = SqliteStore::new(&conn);
        let repository = Repository::new(SqliteDataMapper::new(builder.clone(), entity, store)?);
        let items = repository.find_all().columns(fields).get_items(None, 0)?;
        info!(
            "event=cli_dump module=cli status=ok entity={} rows={}",
            entity,
            items.len()
        );
        for record in items.records().unwrap_or_default() {
            println!("{}", serde_json::to_string(record)?);
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}\n{USAGE}");
            return ExitCode::from(2);
        }
    };

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

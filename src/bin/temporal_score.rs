use clap::Parser;
use qu::ick_use::*;
use std::{io, path::PathBuf};
use temporal_score::{
    load_ids,
    report::{emit, save_table, CsvReport},
    CancelToken, Config, CsvEraTable, Engine,
};

/// Count how often each drug comes before each condition, and score the pairs.
#[derive(Parser)]
struct Opt {
    /// File of drug concept IDs, 1 per line.
    drug_ids: PathBuf,
    /// File of condition concept IDs, 1 per line.
    cond_ids: PathBuf,
    /// Parameters file (TOML). Defaults are used for anything missing.
    #[clap(short, long)]
    parameters: Option<PathBuf>,
    /// Write the CSV report here rather than to standard output.
    #[clap(short, long)]
    output: Option<PathBuf>,
    /// CSV file of drug eras
    #[clap(long)]
    drug_eras: Option<PathBuf>,
    /// CSV file of condition eras
    #[clap(long)]
    condition_eras: Option<PathBuf>,
    /// Also save the results as a binary table. Must end in `.bin`.
    #[clap(long)]
    save: Option<PathBuf>,
}

#[qu::ick]
pub fn main(opt: Opt) -> Result {
    let mut config = match &opt.parameters {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    // command line wins over the parameters file
    if opt.output.is_some() {
        config.report = opt.output;
    }
    if opt.drug_eras.is_some() {
        config.drug_eras = opt.drug_eras;
    }
    if opt.condition_eras.is_some() {
        config.condition_eras = opt.condition_eras;
    }
    if opt.save.is_some() {
        config.results_table = opt.save;
    }
    let engine = Engine::new(&config)?;
    event!(
        Level::INFO,
        "parameters:\n{}",
        serde_json::to_string_pretty(&config)?
    );

    let drug_ids = load_ids(&opt.drug_ids)?;
    let cond_ids = load_ids(&opt.cond_ids)?;
    let drug_eras = config
        .drug_eras
        .as_ref()
        .context("no drug eras: pass `--drug-eras` or set `drug_eras` in the parameters")?;
    let condition_eras = config.condition_eras.as_ref().context(
        "no condition eras: pass `--condition-eras` or set `condition_eras` in the parameters",
    )?;

    let rows = engine.run(
        &CsvEraTable::new(drug_eras),
        &CsvEraTable::new(condition_eras),
        &drug_ids,
        &cond_ids,
        &CancelToken::new(),
    )?;

    match &config.report {
        Some(path) => {
            let mut report = CsvReport::create(path)?;
            emit(&mut report, &rows)?;
            event!(Level::INFO, "report written to \"{}\"", path.display());
        }
        None => {
            let stdout = io::stdout();
            let mut report = CsvReport::new(stdout.lock())?;
            emit(&mut report, &rows)?;
        }
    }
    if let Some(path) = &config.results_table {
        save_table(&rows, path)?;
    }
    Ok(())
}

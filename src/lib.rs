//! Temporal scores for drug/condition pairs.
//!
//! For every requested (drug, condition) pair we count how many people had the drug before the
//! condition, the condition before the drug, both, and a handful of background counts against
//! all requested drugs and conditions. These counts are turned into a single temporal score,
//! following the temporal score from page 4 of (Page et al., AAAI 2012).
//!
//! The pipeline is
//!
//! ```text
//!   era tables --fetch--> EraSet --index--> Timelines --+--> BackgroundAggregates
//!                                                      |              |
//!                                                      +--> count_pair (per pair, parallel)
//!                                                                     |
//!                                                                   score --> ReportRow
//! ```
pub mod config;
pub mod counting;
pub mod era;
pub mod report;
pub mod repo;
pub mod run;
pub mod score;
pub mod timeline;
mod util;
pub mod window;

pub use anyhow::{Context, Error};
use qu::ick_use::*;
use std::{
    fs,
    io::{self, BufRead},
    path::Path,
};

pub use crate::{
    config::Config,
    counting::{count_pair, BackgroundAggregates, PairCounts},
    era::{Era, EraSet},
    report::ReportRow,
    repo::{CsvEraTable, EraRepository},
    run::{CancelToken, Cancelled, Engine},
    score::{score, ScoreFunction, ScoreMethod},
    timeline::{EraReference, Timeline, Timelines},
    window::WindowPolicy,
};

pub type Result<T = (), E = anyhow::Error> = std::result::Result<T, E>;
pub type PersonId = u64;
/// A drug or condition concept identifier.
pub type ConceptId = u64;

/// Load a list of concept IDs - 1 per line.
///
/// Blank lines and lines starting with `#` are skipped.
pub fn load_ids(path: impl AsRef<Path>) -> Result<Vec<ConceptId>> {
    fn inner(path: &Path) -> Result<Vec<ConceptId>> {
        let reader = io::BufReader::new(fs::File::open(path)?);
        parse_ids(reader)
    }
    let path = path.as_ref();
    inner(path).with_context(|| format!("loading IDs from \"{}\"", path.display()))
}

/// Parse concept IDs - 1 per line.
pub fn parse_ids(input: impl BufRead) -> Result<Vec<ConceptId>> {
    let mut ids = vec![];
    for (idx, line) in input.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let id = line
            .parse::<ConceptId>()
            .with_context(|| format!("line {}: `{}` is not an integer ID", idx + 1, line))?;
        ids.push(id);
    }
    Ok(ids)
}

pub fn check_extension(path: &Path, ext: &str) -> Result<()> {
    ensure!(
        matches!(path.extension(), Some(p) if p == ext),
        "filename should end with `.{}`",
        ext
    );
    Ok(())
}

#[cfg(test)]
mod test {
    use super::{check_extension, parse_ids};
    use std::path::Path;

    #[test]
    fn ids() {
        let input = "# drugs\n773\n\n  797 \n# trailing\n";
        assert_eq!(parse_ids(input.as_bytes()).unwrap(), vec![773, 797]);
    }

    #[test]
    fn bad_id() {
        let err = parse_ids("773\naspirin\n".as_bytes()).unwrap_err();
        assert!(format!("{:#}", err).contains("line 2"));
    }

    #[test]
    fn extension() {
        assert!(check_extension(Path::new("out/results.bin"), "bin").is_ok());
        assert!(check_extension(Path::new("out/results.csv"), "bin").is_err());
    }
}

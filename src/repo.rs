//! Where eras come from.
use crate::{
    era::{Era, EraRaw, EraSet, SkippedRecord, CONCEPT_COLUMNS, PERSON_COLUMNS, START_COLUMNS},
    ConceptId,
};
use qu::ick_use::*;
use std::{
    collections::BTreeSet,
    fs, io,
    path::{Path, PathBuf},
};

/// A source of eras that can be asked for the eras of particular concepts.
pub trait EraRepository {
    /// All eras of the given concepts, for all people.
    ///
    /// Malformed records are skipped (and logged), not returned as errors. An error means the
    /// source itself could not be read.
    fn fetch_eras(&self, concept_ids: &BTreeSet<ConceptId>) -> Result<EraSet>;
}

/// Eras already in memory.
impl EraRepository for EraSet {
    fn fetch_eras(&self, concept_ids: &BTreeSet<ConceptId>) -> Result<EraSet> {
        Ok(self.filter_by_concepts(concept_ids))
    }
}

/// A CSV file of eras, with a header row.
///
/// See [`EraRaw`] for the recognised columns. The file is re-read on every fetch.
#[derive(Debug, Clone)]
pub struct CsvEraTable {
    path: PathBuf,
}

impl CsvEraTable {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CsvEraTable { path: path.into() }
    }
}

impl EraRepository for CsvEraTable {
    fn fetch_eras(&self, concept_ids: &BTreeSet<ConceptId>) -> Result<EraSet> {
        fn inner(path: &Path, concept_ids: &BTreeSet<ConceptId>) -> Result<EraSet> {
            let reader = io::BufReader::new(fs::File::open(path)?);
            let (eras, skipped) = read_eras(reader, concept_ids)?;
            for skip in &skipped {
                event!(Level::WARN, "skipping era in \"{}\": {}", path.display(), skip);
            }
            event!(
                Level::INFO,
                "loaded {} eras from \"{}\" ({} skipped)",
                eras.len(),
                path.display(),
                skipped.len()
            );
            Ok(eras)
        }
        inner(&self.path, concept_ids)
            .with_context(|| format!("loading eras from \"{}\"", self.path.display()))
    }
}

/// Read eras of the given concepts from CSV.
///
/// Rows for other concepts are ignored without being validated. Rows that can't be parsed or
/// validated are returned alongside the eras rather than failing the whole read. A header missing
/// the person, concept or start date column is an error.
pub fn read_eras(
    reader: impl io::Read,
    concept_ids: &BTreeSet<ConceptId>,
) -> Result<(EraSet, Vec<SkippedRecord>)> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = reader.headers()?.clone();
    let concept_col = find_column(&headers, &CONCEPT_COLUMNS)?;
    find_column(&headers, &PERSON_COLUMNS)?;
    find_column(&headers, &START_COLUMNS)?;

    let mut eras = vec![];
    let mut skipped = vec![];
    for (idx, row) in reader.records().enumerate() {
        let record = idx as u64 + 1;
        let row = match row {
            Ok(row) => row,
            Err(e) if is_data_error(&e) => {
                skipped.push(SkippedRecord {
                    record,
                    reason: e.into(),
                });
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        let concept = row.get(concept_col).and_then(|v| v.parse::<ConceptId>().ok());
        if matches!(concept, Some(id) if !concept_ids.contains(&id)) {
            continue;
        }
        let era = row
            .deserialize::<EraRaw>(Some(&headers))
            .map_err(Error::from)
            .and_then(Era::try_from);
        match era {
            Ok(era) => eras.push(era),
            Err(reason) => skipped.push(SkippedRecord { record, reason }),
        }
    }
    Ok((EraSet::new(eras), skipped))
}

/// Index of the first header matching one of `names`.
fn find_column(headers: &csv::StringRecord, names: &[&str]) -> Result<usize> {
    headers
        .iter()
        .position(|h| names.contains(&h))
        .with_context(|| format!("no `{}` column in header", names.join("` or `")))
}

/// Whether the error is about one record, rather than the file as a whole.
fn is_data_error(e: &csv::Error) -> bool {
    matches!(
        e.kind(),
        csv::ErrorKind::Deserialize { .. }
            | csv::ErrorKind::UnequalLengths { .. }
            | csv::ErrorKind::Utf8 { .. }
    )
}

//! Output of a run: one row per drug/condition pair.
use crate::{check_extension, counting::PairCounts, util, ConceptId};
use qu::ick_use::*;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::{self, Write},
    path::Path,
};

/// Column names, in output order.
pub const HEADER: [&str; 13] = [
    "drug",
    "cond",
    "ct_d_bef_c",
    "ct_c_bef_d",
    "ct_d_c",
    "ct_d_bef_anyc",
    "ct_d_anyc",
    "ct_anyd_bef_c",
    "ct_anyd_c",
    "ct_d",
    "ct_c",
    "ct_ppl",
    "temporal_score",
];

/// The counts and score of one pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub drug: ConceptId,
    pub cond: ConceptId,
    pub ct_d_bef_c: u64,
    pub ct_c_bef_d: u64,
    pub ct_d_c: u64,
    pub ct_d_bef_anyc: u64,
    pub ct_d_anyc: u64,
    pub ct_anyd_bef_c: u64,
    pub ct_anyd_c: u64,
    pub ct_d: u64,
    pub ct_c: u64,
    pub ct_ppl: u64,
    pub temporal_score: f64,
}

impl ReportRow {
    pub fn new(counts: &PairCounts, temporal_score: f64) -> Self {
        ReportRow {
            drug: counts.drug,
            cond: counts.cond,
            ct_d_bef_c: counts.ct_d_bef_c,
            ct_c_bef_d: counts.ct_c_bef_d,
            ct_d_c: counts.ct_d_c,
            ct_d_bef_anyc: counts.ct_d_bef_anyc,
            ct_d_anyc: counts.ct_d_anyc,
            ct_anyd_bef_c: counts.ct_anyd_bef_c,
            ct_anyd_c: counts.ct_anyd_c,
            ct_d: counts.ct_d,
            ct_c: counts.ct_c,
            ct_ppl: counts.ct_ppl,
            temporal_score,
        }
    }
}

/// Somewhere to put report rows.
pub trait RowSink {
    fn write_row(&mut self, row: &ReportRow) -> Result;

    /// Called once after the last row.
    fn finish(&mut self) -> Result {
        Ok(())
    }
}

impl RowSink for Vec<ReportRow> {
    fn write_row(&mut self, row: &ReportRow) -> Result {
        self.push(*row);
        Ok(())
    }
}

/// Writes rows as CSV, header first.
pub struct CsvReport<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> CsvReport<W> {
    pub fn new(out: W) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(out);
        writer.write_record(HEADER)?;
        Ok(CsvReport { writer })
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| format_err!("flushing report: {}", e.error()))
    }
}

impl CsvReport<io::BufWriter<fs::File>> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        fn inner(path: &Path) -> Result<CsvReport<io::BufWriter<fs::File>>> {
            CsvReport::new(io::BufWriter::new(fs::File::create(path)?))
        }
        let path = path.as_ref();
        inner(path).with_context(|| format!("creating report \"{}\"", path.display()))
    }
}

impl<W: Write> RowSink for CsvReport<W> {
    fn write_row(&mut self, row: &ReportRow) -> Result {
        self.writer.serialize(row)?;
        Ok(())
    }

    fn finish(&mut self) -> Result {
        self.writer.flush()?;
        Ok(())
    }
}

/// Write all rows to `sink`, then finish it.
pub fn emit<'a>(sink: &mut impl RowSink, rows: impl IntoIterator<Item = &'a ReportRow>) -> Result {
    for row in rows {
        sink.write_row(row)?;
    }
    sink.finish()
}

/// Save rows as a binary table, which can be loaded back with [`load_table`].
pub fn save_table(rows: &[ReportRow], path: impl AsRef<Path>) -> Result {
    fn inner(rows: &[ReportRow], path: &Path) -> Result {
        check_extension(path, "bin")?;
        if util::path_exists(path)? {
            event!(Level::WARN, "overwriting \"{}\"", path.display());
        }
        let mut out = io::BufWriter::new(fs::File::create(path)?);
        bincode::serialize_into(&mut out, rows)?;
        out.flush()?;
        Ok(())
    }
    let path = path.as_ref();
    inner(rows, path).with_context(|| format!("saving results to \"{}\"", path.display()))
}

pub fn load_table(path: impl AsRef<Path>) -> Result<Vec<ReportRow>> {
    fn inner(path: &Path) -> Result<Vec<ReportRow>> {
        check_extension(path, "bin")?;
        let input = io::BufReader::new(fs::File::open(path)?);
        bincode::deserialize_from(input).map_err(Into::into)
    }
    let path = path.as_ref();
    inner(path).with_context(|| format!("loading results from \"{}\"", path.display()))
}

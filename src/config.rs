//! Run parameters.
//!
//! Loaded from a TOML file. Every field has a default, so an empty file (or no file) is a valid
//! configuration. Unknown keys are ignored, which lets parameter files carry settings for other
//! tools.
use crate::{score::ScoreMethod, timeline::EraReference, window::WindowPolicy};
use qu::ick_use::*;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Earliest allowed gap (days) between the drug and the condition.
    #[serde(alias = "conditionWindowStart")]
    pub condition_window_start: i64,
    /// Latest allowed gap (days) between the drug and the condition.
    #[serde(alias = "conditionWindowEnd")]
    pub condition_window_end: i64,
    /// Days added to every drug reference date before comparing.
    #[serde(alias = "drugOccurrenceOffset")]
    pub drug_occurrence_offset: i64,
    pub pseudocount: f64,
    pub era_reference: EraReference,
    pub score_method: ScoreMethod,
    /// CSV file of drug eras.
    pub drug_eras: Option<PathBuf>,
    /// CSV file of condition eras.
    pub condition_eras: Option<PathBuf>,
    /// Where to write the CSV report. Standard output if missing.
    #[serde(alias = "reportFileName")]
    pub report: Option<PathBuf>,
    /// Where to save the binary results table, if anywhere.
    pub results_table: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let window = WindowPolicy::default();
        Config {
            condition_window_start: window.window_start_days(),
            condition_window_end: window.window_end_days(),
            drug_occurrence_offset: window.offset_days(),
            pseudocount: 1.,
            era_reference: EraReference::default(),
            score_method: ScoreMethod::default(),
            drug_eras: None,
            condition_eras: None,
            report: None,
            results_table: None,
        }
    }
}

impl Config {
    /// Load and validate parameters from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        fn inner(path: &Path) -> Result<Config> {
            let text = fs::read_to_string(path)?;
            Config::from_toml(&text)
        }
        let path = path.as_ref();
        inner(path).with_context(|| format!("loading parameters from \"{}\"", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the parameters make sense together.
    pub fn validate(&self) -> Result {
        ensure!(
            self.pseudocount.is_finite() && self.pseudocount > 0.,
            "pseudocount must be a positive number, found {}",
            self.pseudocount
        );
        self.window_policy()?;
        Ok(())
    }

    pub fn window_policy(&self) -> Result<WindowPolicy> {
        WindowPolicy::new(
            self.drug_occurrence_offset,
            self.condition_window_start,
            self.condition_window_end,
        )
        .context("invalid condition window")
    }
}

#[cfg(test)]
mod test {
    use super::Config;
    use crate::{score::ScoreMethod, timeline::EraReference, window::WindowPolicy};
    use std::path::PathBuf;

    #[test]
    fn defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.condition_window_start, -100_000);
        assert_eq!(config.condition_window_end, 100_000);
        assert_eq!(config.drug_occurrence_offset, 0);
        assert_eq!(config.pseudocount, 1.);
        assert_eq!(config.era_reference, EraReference::AllEras);
        assert_eq!(config.score_method, ScoreMethod::Ratio);
        assert_eq!(config.window_policy().unwrap(), WindowPolicy::default());
    }

    #[test]
    fn camel_case() {
        let config = Config::from_toml(
            r#"
            conditionWindowStart = 0
            conditionWindowEnd = 30
            drugOccurrenceOffset = 2
            pseudocount = 0.5
            reportFileName = "out.csv"
            era_reference = "first_occurrence"
            score_method = "log_odds"
            # not ours
            dbHost = "localhost"
            "#,
        )
        .unwrap();
        assert_eq!(config.condition_window_start, 0);
        assert_eq!(config.condition_window_end, 30);
        assert_eq!(config.drug_occurrence_offset, 2);
        assert_eq!(config.pseudocount, 0.5);
        assert_eq!(config.report, Some(PathBuf::from("out.csv")));
        assert_eq!(config.era_reference, EraReference::FirstOccurrence);
        assert_eq!(config.score_method, ScoreMethod::LogOdds);
        assert_eq!(config.window_policy().unwrap(), WindowPolicy::new(2, 0, 30).unwrap());
    }

    #[test]
    fn not_a_number() {
        assert!(Config::from_toml("condition_window_start = \"soon\"").is_err());
        assert!(Config::from_toml("pseudocount = \"one\"").is_err());
    }

    #[test]
    fn bad_pseudocount() {
        assert!(Config::from_toml("pseudocount = -1.0").is_err());
        assert!(Config::from_toml("pseudocount = 0.0").is_err());
        assert!(Config::from_toml("pseudocount = 0.001").is_ok());
    }

    #[test]
    fn window_backwards() {
        let err = Config::from_toml("condition_window_start = 10\ncondition_window_end = 5")
            .unwrap_err();
        assert!(format!("{:#}", err).contains("invalid condition window"));
    }
}

//! Command-line surface.
//!
//! Every flag mirrors an UPPER_SNAKE_CASE environment variable, and a
//! `.env` file (loaded before parsing) can supply any of them. Precedence
//! is explicit argument, then environment, then default. The two action
//! flags are tri-state: when neither was given at all, both actions run.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "mechdb", version, about = "Game-asset descriptor ingest and publishing")]
pub struct Cli {
    /// Run the ingest over the export tree.
    #[arg(long, env = "SHOULD_PARSE", num_args = 0..=1, default_missing_value = "true")]
    pub should_parse: Option<bool>,

    /// Push the output tables into the data archive.
    #[arg(long, env = "SHOULD_PUSH_DATA", num_args = 0..=1, default_missing_value = "true")]
    pub should_push_data: Option<bool>,

    /// Inner root name inside the export tree.
    #[arg(long, env = "GAME_NAME", default_value = "Root")]
    pub game_name: String,

    /// Root of the input descriptor tree.
    #[arg(long, env = "EXPORT_DIR")]
    pub export_dir: Option<PathBuf>,

    /// Destination directory for the output tables.
    #[arg(long, env = "OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Localization language loaded during the ingest.
    #[arg(long, env = "LANGUAGE", default_value = "en")]
    pub language: String,

    #[arg(long, env = "LOG_LEVEL", default_value = "INFO",
          value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Data version the publisher writes, `YYYY-MM-DD`.
    #[arg(long, env = "GAME_VERSION")]
    pub game_version: Option<String>,

    /// Checkout of the data archive the publisher commits into.
    #[arg(long, env = "DATA_REPO_DIR")]
    pub data_repo_dir: Option<PathBuf>,

    #[arg(long, env = "TARGET_BRANCH", default_value = "main")]
    pub target_branch: String,

    /// Copy the tables into a `<version>/` directory of the archive.
    #[arg(long, env = "PUSH_TO_ARCHIVE", num_args = 0..=1, default_missing_value = "true", default_value = "true")]
    pub push_to_archive: bool,

    /// Copy the tables into the `current/` alias of the archive.
    #[arg(long, env = "PUSH_TO_CURRENT", num_args = 0..=1, default_missing_value = "true", default_value = "true")]
    pub push_to_current: bool,

    /// Ask the archive remote to run its data workflow after the push.
    #[arg(long, env = "TRIGGER_DATA_WORKFLOW", num_args = 0..=1, default_missing_value = "true", default_value = "false")]
    pub trigger_data_workflow: bool,

    /// Write a `version_config.json` naming the pushed version.
    #[arg(long, env = "CREATE_VERSION_CONFIG", num_args = 0..=1, default_missing_value = "true", default_value = "true")]
    pub create_version_config: bool,

    /// Token used for the authenticated archive push.
    #[arg(long, env = "GH_DATA_REPO_PAT", hide_env_values = true)]
    pub gh_data_repo_pat: Option<String>,
}

impl Cli {
    /// `(parse, push)` after applying the both-default rule: setting
    /// either flag explicitly makes the other default to off.
    pub fn actions(&self) -> (bool, bool) {
        match (self.should_parse, self.should_push_data) {
            (None, None) => (true, true),
            (parse, push) => (parse.unwrap_or(false), push.unwrap_or(false)),
        }
    }

    /// Ingest options; the two directories are only required when the
    /// parse action actually runs.
    pub fn ingest_options(&self) -> Result<mechdb::Options> {
        let export_dir = self
            .export_dir
            .as_ref()
            .context("--export-dir (or EXPORT_DIR) is required when parsing")?;
        let output_dir = self
            .output_dir
            .as_ref()
            .context("--output-dir (or OUTPUT_DIR) is required when parsing")?;

        let mut options = mechdb::Options::new(export_dir, &self.game_name, output_dir);
        options.language = self.language.clone();
        Ok(options)
    }

    /// Filter directive for the given `--log-level`.
    pub fn log_filter(&self) -> String {
        let level = match self.log_level.as_str() {
            "DEBUG" => "debug",
            "WARNING" => "warn",
            // tracing has no level above error.
            "ERROR" | "CRITICAL" => "error",
            _ => "info",
        };
        format!("mechdb={level},mechdb_cli={level}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("mechdb").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn both_actions_default_on_when_neither_is_given() {
        assert_eq!(parse(&[]).actions(), (true, true));
    }

    #[test]
    fn explicit_action_turns_the_other_off() {
        assert_eq!(parse(&["--should-parse"]).actions(), (true, false));
        assert_eq!(parse(&["--should-push-data"]).actions(), (false, true));
        assert_eq!(
            parse(&["--should-parse", "false"]).actions(),
            (false, false)
        );
        assert_eq!(
            parse(&["--should-parse", "--should-push-data"]).actions(),
            (true, true)
        );
    }

    #[test]
    fn parsing_requires_the_directories() {
        let cli = parse(&["--should-parse"]);
        assert!(cli.ingest_options().is_err());

        let cli = parse(&["--should-parse", "--export-dir", "/in", "--output-dir", "/out"]);
        let options = cli.ingest_options().unwrap();
        assert_eq!(options.export_root, std::path::PathBuf::from("/in"));
        assert_eq!(options.game_name, "Root");
    }

    #[test]
    fn log_levels_map_onto_tracing() {
        assert!(parse(&["--log-level", "WARNING"]).log_filter().contains("warn"));
        assert!(parse(&["--log-level", "CRITICAL"]).log_filter().contains("error"));
    }
}

//! `.env` configuration file support.
//!
//! The file maps flag names in UPPER_SNAKE_CASE to values, one `KEY=VALUE`
//! per line, with `#` comments. Loading happens before argument parsing so
//! the precedence argument > environment > default falls out of clap's
//! `env` attributes: variables already present in the real environment are
//! never overwritten here.

use std::fs;
use std::path::Path;

/// Load `.env` from the working directory, if present.
pub fn load_dotenv() {
    apply_dotenv(Path::new(".env"));
}

fn apply_dotenv(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim().trim_matches('"');
        if !key.is_empty() && std::env::var_os(key).is_none() {
            std::env::set_var(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn env_wins_over_file_and_comments_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "# archive settings").unwrap();
        writeln!(file, "MECHDB_TEST_BRANCH=\"archive\"").unwrap();
        writeln!(file, "MECHDB_TEST_PRESET=file").unwrap();
        writeln!(file, "not a pair").unwrap();

        std::env::set_var("MECHDB_TEST_PRESET", "env");
        apply_dotenv(&path);

        assert_eq!(std::env::var("MECHDB_TEST_BRANCH").unwrap(), "archive");
        assert_eq!(std::env::var("MECHDB_TEST_PRESET").unwrap(), "env");

        std::env::remove_var("MECHDB_TEST_BRANCH");
        std::env::remove_var("MECHDB_TEST_PRESET");
    }
}

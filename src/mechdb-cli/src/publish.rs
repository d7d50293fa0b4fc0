//! Data-archive publisher.
//!
//! Copies the output tables into a git checkout of the data archive,
//! under a `<version>/` directory and/or the `current/` alias, optionally
//! writes a version config, then commits and pushes a branch by shelling
//! out to `git`. Authentication uses the provided token through an
//! ephemeral `http.extraHeader`; the token never lands in the tree.

use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::{bail, Context, Result};
use serde_json::json;
use tracing::info;
use walkdir::WalkDir;

use crate::cli::Cli;

pub fn run(cli: &Cli) -> Result<()> {
    let output_dir = cli
        .output_dir
        .as_ref()
        .context("--output-dir (or OUTPUT_DIR) is required when pushing")?;
    let repo_dir = cli
        .data_repo_dir
        .as_ref()
        .context("--data-repo-dir (or DATA_REPO_DIR) is required when pushing")?;
    let version = cli
        .game_version
        .as_ref()
        .context("--game-version (or GAME_VERSION) is required when pushing")?;

    if cli.push_to_archive {
        copy_tables(output_dir, &repo_dir.join(version))?;
    }
    if cli.push_to_current {
        copy_tables(output_dir, &repo_dir.join("current"))?;
    }
    if cli.create_version_config {
        let config = json!({"latest_version": version});
        let path = repo_dir.join("version_config.json");
        fs::write(&path, serde_json::to_string_pretty(&config)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    git(cli, repo_dir, &["checkout", "-B", &cli.target_branch])?;
    git(cli, repo_dir, &["add", "--all"])?;

    // Nothing staged means the archive already matches this version.
    let status = git_output(repo_dir, &["status", "--porcelain"])?;
    if status.trim().is_empty() {
        if !cli.trigger_data_workflow {
            info!(version = %version, "archive already up to date");
            return Ok(());
        }
        // The archive runs its workflow on push to the target branch;
        // with unchanged data an empty commit is the only way to push.
        let message = format!("Retrigger data workflow for {version}");
        git(cli, repo_dir, &["commit", "--allow-empty", "-m", &message])?;
    } else {
        let message = format!("Data update {version}");
        git(cli, repo_dir, &["commit", "-m", &message])?;
    }

    git(
        cli,
        repo_dir,
        &["push", "--set-upstream", "origin", &cli.target_branch],
    )?;

    info!(version = %version, branch = %cli.target_branch, "archive updated");
    Ok(())
}

/// Mirror the flat table directory; stale files in the target are removed
/// so deleted entity kinds disappear from the archive.
fn copy_tables(from: &Path, to: &Path) -> Result<()> {
    if to.exists() {
        fs::remove_dir_all(to)
            .with_context(|| format!("failed to clear {}", to.display()))?;
    }
    fs::create_dir_all(to).with_context(|| format!("failed to create {}", to.display()))?;

    for entry in WalkDir::new(from).min_depth(1).max_depth(1) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let target = to.join(entry.file_name());
        fs::copy(entry.path(), &target)
            .with_context(|| format!("failed to copy {}", entry.path().display()))?;
    }
    Ok(())
}

fn git(cli: &Cli, repo_dir: &Path, args: &[&str]) -> Result<()> {
    let mut command = Command::new("git");
    command.current_dir(repo_dir);
    if let Some(pat) = &cli.gh_data_repo_pat {
        command.args(["-c", &format!("http.extraHeader=Authorization: Bearer {pat}")]);
    }
    command.args(args);

    let status = command
        .status()
        .with_context(|| format!("failed to spawn git {}", args.join(" ")))?;
    if !status.success() {
        bail!("git {} exited with {status}", args.join(" "));
    }
    Ok(())
}

fn git_output(repo_dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .current_dir(repo_dir)
        .args(args)
        .output()
        .with_context(|| format!("failed to spawn git {}", args.join(" ")))?;
    if !output.status.success() {
        bail!("git {} exited with {}", args.join(" "), output.status);
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn raw_git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .current_dir(dir)
            .args(args)
            .status()
            .unwrap();
        assert!(status.success(), "git {args:?} failed");
    }

    fn commit_count(repo: &Path) -> usize {
        git_output(repo, &["rev-list", "--count", "HEAD"])
            .unwrap()
            .trim()
            .parse()
            .unwrap()
    }

    #[test]
    fn retrigger_pushes_an_empty_commit_when_data_is_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let origin = dir.path().join("origin.git");
        let repo = dir.path().join("archive");
        let out = dir.path().join("out");
        fs::create_dir_all(&origin).unwrap();
        fs::create_dir_all(&repo).unwrap();
        fs::create_dir_all(&out).unwrap();
        fs::write(out.join("Module.json"), "{}\n").unwrap();

        raw_git(&origin, &["init", "--bare", "--initial-branch=main"]);
        raw_git(&repo, &["init"]);
        raw_git(&repo, &["config", "user.email", "ci@example.invalid"]);
        raw_git(&repo, &["config", "user.name", "ci"]);
        raw_git(&repo, &["remote", "add", "origin", origin.to_str().unwrap()]);

        let base = [
            "mechdb",
            "--should-push-data",
            "--output-dir",
            out.to_str().unwrap(),
            "--data-repo-dir",
            repo.to_str().unwrap(),
            "--game-version",
            "2026-08-30",
        ];
        let cli = crate::cli::Cli::try_parse_from(base).unwrap();
        run(&cli).unwrap();
        assert_eq!(commit_count(&repo), 1);

        // Unchanged data without the flag stays a no-op.
        run(&cli).unwrap();
        assert_eq!(commit_count(&repo), 1);

        let cli = crate::cli::Cli::try_parse_from(
            base.iter()
                .copied()
                .chain(std::iter::once("--trigger-data-workflow")),
        )
        .unwrap();
        run(&cli).unwrap();
        assert_eq!(commit_count(&repo), 2);
        assert_eq!(commit_count(&origin), 2);
    }

    #[test]
    fn copy_tables_replaces_stale_content() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("out");
        let to = dir.path().join("archive/current");
        fs::create_dir_all(&from).unwrap();
        fs::create_dir_all(&to).unwrap();
        fs::write(from.join("Module.json"), "{}").unwrap();
        fs::write(to.join("Stale.json"), "{}").unwrap();

        copy_tables(&from, &to).unwrap();

        assert!(to.join("Module.json").exists());
        assert!(!to.join("Stale.json").exists());
    }
}

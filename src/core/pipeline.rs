//! The fixed five-stage backup pipeline applied to one pool per run:
//! import, optional decrypt, backup, set read-only, export. Every stage
//! aborts the run on failure and is never retried; state left behind by
//! completed stages (imported, decrypted) is not rolled back and is
//! reported to the operator instead.

use crate::config::PoolConfig;
use crate::core::executor::CommandExecutor;
use thiserror::Error;
use tracing::info;

pub const ZPOOL: &str = "zpool";
pub const ZFS: &str = "zfs";
pub const BACKUP_ENGINE: &str = "zfs-autobackup";

/// A successfully completed run. The engine output is kept so the
/// success notification can include it when verbosity is enabled.
#[derive(Debug)]
pub struct BackupRun {
    pub backup_output: String,
}

/// Where and how a run failed. Stages after the backup carry its captured
/// output along since the operator may still want to see it.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to import pool: {stderr}")]
    Import { stderr: String },

    #[error("failed to decrypt pool: {stderr}")]
    Decrypt { stderr: String },

    #[error("backup engine reported an error")]
    Backup { output: String },

    #[error("failed to set pool read-only: {stderr}")]
    ReadOnly {
        stderr: String,
        backup_output: String,
    },

    #[error("failed to export pool: {stderr}")]
    Export {
        stderr: String,
        backup_output: String,
    },
}

/// Run the whole pipeline for one pool descriptor. Each command blocks the
/// (single) worker until it exits; there are no per-stage timeouts.
pub async fn run(
    pool: &PoolConfig,
    executor: &dyn CommandExecutor,
) -> Result<BackupRun, PipelineError> {
    let name = &pool.pool_name;

    info!(pool = %name, "importing pool");
    let out = executor
        .run(ZPOOL, &[s("import"), name.clone(), s("-N")], None)
        .await;
    if !out.success() {
        return Err(PipelineError::Import { stderr: out.stderr });
    }

    if pool.has_passphrase() {
        info!(pool = %name, "loading encryption key");
        let passphrase = pool.passphrase.as_deref().unwrap_or_default();
        let out = executor
            .run(ZFS, &[s("load-key"), name.clone()], Some(passphrase))
            .await;
        if !out.success() {
            return Err(PipelineError::Decrypt { stderr: out.stderr });
        }
    }

    info!(
        pool = %name,
        "starting backup engine: {} {}",
        BACKUP_ENGINE,
        pool.backup_parameters.join(" ")
    );
    let out = executor.run(BACKUP_ENGINE, &pool.backup_parameters, None).await;
    if let Some(output) = classify_backup_output(&out.stdout, &out.stderr) {
        return Err(PipelineError::Backup { output });
    }
    let backup_output = out.stdout;
    info!(pool = %name, "backup engine finished:\n{backup_output}");

    info!(pool = %name, "setting pool read-only");
    let out = executor
        .run(ZFS, &[s("set"), s("readonly=on"), name.clone()], None)
        .await;
    if !out.success() {
        return Err(PipelineError::ReadOnly {
            stderr: out.stderr,
            backup_output,
        });
    }

    info!(pool = %name, "exporting pool");
    let out = executor.run(ZPOOL, &[s("export"), name.clone()], None).await;
    if !out.success() {
        return Err(PipelineError::Export {
            stderr: out.stderr,
            backup_output,
        });
    }

    Ok(BackupRun { backup_output })
}

/// The engine has no structured result contract; a run counts as failed
/// when its stdout mentions "error" (case-insensitive) or anything landed
/// on stderr. The exit code is intentionally not consulted.
/// Returns the text to report on failure.
fn classify_backup_output(stdout: &str, stderr: &str) -> Option<String> {
    if stdout_indicates_error(stdout) {
        Some(stdout.to_string())
    } else if !stderr.is_empty() {
        let mut output = String::new();
        if !stdout.is_empty() {
            output.push_str(stdout);
            output.push('\n');
        }
        output.push_str(stderr);
        Some(output)
    } else {
        None
    }
}

/// Case-insensitive scan for "error", except the "0 errors" success tally
/// the engine prints in its end-of-run summary.
fn stdout_indicates_error(stdout: &str) -> bool {
    let lower = stdout.to_lowercase();
    let bytes = lower.as_bytes();
    let mut from = 0;
    while let Some(pos) = lower[from..].find("error").map(|i| i + from) {
        let zero_tally = pos >= 2
            && &bytes[pos - 2..pos] == b"0 "
            && (pos == 2 || !bytes[pos - 3].is_ascii_digit());
        if !zero_tally {
            return true;
        }
        from = pos + "error".len();
    }
    false
}

fn s(arg: &str) -> String {
    arg.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_output_passes() {
        assert!(classify_backup_output("starting...\ndone, 0 problems", "").is_none());
    }

    #[test]
    fn zero_error_tally_is_not_a_failure() {
        assert!(classify_backup_output("starting...\ndone, 0 errors", "").is_none());
    }

    #[test]
    fn error_substring_fails_case_insensitively() {
        assert!(classify_backup_output("Error: dataset busy", "").is_some());
        assert!(classify_backup_output("3 ERRORS encountered", "").is_some());
        assert!(classify_backup_output("finished with 10 errors", "").is_some());
    }

    #[test]
    fn nonempty_stderr_fails_even_with_clean_stdout() {
        let output = classify_backup_output("all good", "warning: thin ice").unwrap();
        assert!(output.contains("all good"));
        assert!(output.contains("thin ice"));
    }
}

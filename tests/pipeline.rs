//! Stage-ordering and failure-policy tests for the backup pipeline,
//! driven through a scripted executor.

mod common;

use common::{FakeExecutor, output, pool};
use zbakd::core::pipeline::{self, PipelineError};

#[tokio::test]
async fn runs_all_stages_in_order_with_passphrase() {
    let executor = FakeExecutor::new();
    executor.respond("zfs-autobackup", output(0, "all datasets sent", ""));

    let pool = pool("backup1", Some("secret"), &["--dry-run"]);
    let run = pipeline::run(&pool, &executor).await.unwrap();
    assert_eq!(run.backup_output, "all datasets sent");

    assert_eq!(
        executor.command_lines(),
        vec![
            "zpool import backup1 -N",
            "zfs load-key backup1",
            "zfs-autobackup --dry-run",
            "zfs set readonly=on backup1",
            "zpool export backup1",
        ]
    );
}

#[tokio::test]
async fn passphrase_goes_to_stdin_not_argv() {
    let executor = FakeExecutor::new();
    let pool = pool("backup1", Some("secret"), &[]);
    pipeline::run(&pool, &executor).await.unwrap();

    let load_key = executor
        .invocations()
        .into_iter()
        .find(|i| i.args.first().map(String::as_str) == Some("load-key"))
        .expect("load-key was not invoked");
    assert_eq!(load_key.input.as_deref(), Some("secret"));
    assert!(!load_key.args.iter().any(|a| a.contains("secret")));
}

#[tokio::test]
async fn decrypt_skipped_without_passphrase() {
    let executor = FakeExecutor::new();
    let pool = pool("backup1", None, &[]);
    pipeline::run(&pool, &executor).await.unwrap();

    assert!(
        !executor
            .command_lines()
            .iter()
            .any(|line| line.contains("load-key"))
    );
}

#[tokio::test]
async fn decrypt_skipped_with_empty_passphrase() {
    let executor = FakeExecutor::new();
    let pool = pool("backup1", Some(""), &[]);
    pipeline::run(&pool, &executor).await.unwrap();

    assert!(
        !executor
            .command_lines()
            .iter()
            .any(|line| line.contains("load-key"))
    );
}

#[tokio::test]
async fn import_failure_stops_everything() {
    let executor = FakeExecutor::new();
    executor.respond(
        "zpool import",
        output(1, "", "cannot import 'pool': no such pool"),
    );

    let pool = pool("backup1", Some("secret"), &["tank"]);
    let err = pipeline::run(&pool, &executor).await.unwrap_err();

    match err {
        PipelineError::Import { stderr } => {
            assert!(stderr.contains("no such pool"));
        }
        other => panic!("expected import failure, got {other:?}"),
    }
    assert_eq!(executor.invocations().len(), 1);
}

#[tokio::test]
async fn decrypt_failure_stops_before_backup() {
    let executor = FakeExecutor::new();
    executor.respond("zfs load-key", output(1, "", "incorrect key"));

    let pool = pool("backup1", Some("wrong"), &["tank"]);
    let err = pipeline::run(&pool, &executor).await.unwrap_err();

    assert!(matches!(err, PipelineError::Decrypt { .. }));
    assert_eq!(executor.invocations().len(), 2);
}

#[tokio::test]
async fn error_in_backup_stdout_aborts_before_readonly_and_export() {
    let executor = FakeExecutor::new();
    executor.respond("zfs-autobackup", output(0, "Error: dataset busy", ""));

    let pool = pool("backup1", None, &["tank"]);
    let err = pipeline::run(&pool, &executor).await.unwrap_err();

    match err {
        PipelineError::Backup { output } => assert!(output.contains("dataset busy")),
        other => panic!("expected backup failure, got {other:?}"),
    }

    let lines = executor.command_lines();
    assert!(!lines.iter().any(|l| l.contains("readonly=on")));
    assert!(!lines.iter().any(|l| l.contains("export")));
}

#[tokio::test]
async fn nonempty_backup_stderr_aborts() {
    let executor = FakeExecutor::new();
    executor.respond("zfs-autobackup", output(0, "looks fine", "cannot hold snapshot"));

    let pool = pool("backup1", None, &["tank"]);
    let err = pipeline::run(&pool, &executor).await.unwrap_err();

    match err {
        PipelineError::Backup { output } => {
            assert!(output.contains("cannot hold snapshot"));
        }
        other => panic!("expected backup failure, got {other:?}"),
    }
}

#[tokio::test]
async fn backup_exit_code_alone_is_not_a_failure() {
    // The engine has no exit-code contract; only the output markers count.
    let executor = FakeExecutor::new();
    executor.respond("zfs-autobackup", output(255, "done, 0 errors", ""));

    let pool = pool("backup1", None, &["tank"]);
    assert!(pipeline::run(&pool, &executor).await.is_ok());
}

#[tokio::test]
async fn readonly_failure_aborts_before_export() {
    let executor = FakeExecutor::new();
    executor.respond("zfs-autobackup", output(0, "sent 3 snapshots", ""));
    executor.respond("zfs set readonly=on", output(1, "", "dataset is busy"));

    let pool = pool("backup1", None, &["tank"]);
    let err = pipeline::run(&pool, &executor).await.unwrap_err();

    match err {
        PipelineError::ReadOnly {
            stderr,
            backup_output,
        } => {
            assert!(stderr.contains("dataset is busy"));
            assert_eq!(backup_output, "sent 3 snapshots");
        }
        other => panic!("expected read-only failure, got {other:?}"),
    }
    assert!(
        !executor
            .command_lines()
            .iter()
            .any(|l| l.contains("export"))
    );
}

#[tokio::test]
async fn export_failure_is_reported() {
    let executor = FakeExecutor::new();
    executor.respond("zpool export", output(1, "", "pool is busy"));

    let pool = pool("backup1", None, &["tank"]);
    let err = pipeline::run(&pool, &executor).await.unwrap_err();
    assert!(matches!(err, PipelineError::Export { .. }));
}

use super::*;
use tempfile::TempDir;

#[test]
fn test_shell_flag_selection() {
    assert_eq!(ShellExecutor::with_shell("/bin/bash").flag, "-c");
    assert_eq!(ShellExecutor::with_shell("cmd.exe").flag, "/C");
    assert_eq!(ShellExecutor::with_shell(r"C:\Windows\System32\cmd").flag, "/C");
}

#[test]
fn test_spawn_failure_outcome() {
    let outcome = ExecutionOutcome::spawn_failure("No such file or directory");
    assert!(outcome.failed);
    assert!(outcome.exit_code.is_none());
    assert!(outcome.error.unwrap().contains("No such file"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_execute_success_captures_stdout() {
    let executor = ShellExecutor::new();
    let outcome = executor.execute("echo hello", &ExecOptions::new()).await;
    assert!(!outcome.failed);
    assert_eq!(outcome.stdout.trim(), "hello");
    assert_eq!(outcome.exit_code, Some(0));
    assert!(outcome.error.is_none());
}

#[cfg(unix)]
#[tokio::test]
async fn test_execute_non_zero_exit() {
    let executor = ShellExecutor::new();
    let outcome = executor
        .execute("echo oops >&2; exit 3", &ExecOptions::new())
        .await;
    assert!(outcome.failed);
    assert_eq!(outcome.exit_code, Some(3));
    assert_eq!(outcome.stderr.trim(), "oops");
    assert!(outcome.error.unwrap().contains("exit code 3"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_execute_in_work_directory() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(temp_dir.path().join("marker.txt"), "content").unwrap();

    let executor = ShellExecutor::new();
    let options = ExecOptions::new().work_directory(temp_dir.path());
    let outcome = executor.execute("ls", &options).await;
    assert!(!outcome.failed);
    assert!(outcome.stdout.contains("marker.txt"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_execute_missing_work_directory_fails() {
    let executor = ShellExecutor::new();
    let options = ExecOptions::new().work_directory("/nonexistent/dir/12345");
    let outcome = executor.execute("echo hi", &options).await;
    assert!(outcome.failed);
    assert!(outcome.error.is_some());
}

#[tokio::test]
async fn test_execute_missing_shell_fails() {
    let executor = ShellExecutor::with_shell("nonexistent_shell_12345");
    let outcome = executor.execute("echo hi", &ExecOptions::new()).await;
    assert!(outcome.failed);
    assert!(outcome.exit_code.is_none());
}

#[cfg(unix)]
#[tokio::test]
async fn test_execute_unknown_command_is_recorded() {
    let executor = ShellExecutor::new();
    let outcome = executor
        .execute("nonexistent_command_12345", &ExecOptions::new())
        .await;
    assert!(outcome.failed);
    assert_eq!(outcome.exit_code, Some(127));
}

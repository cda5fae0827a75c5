use super::*;
use std::time::Instant;

fn sh(script: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", script]);
    cmd
}

/// Zombies awaiting reaping by init count as stopped.
fn is_running(pid: i32) -> bool {
    match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        Ok(stat) => stat
            .rsplit_once(')')
            .and_then(|(_, rest)| rest.split_whitespace().next())
            .is_some_and(|state| state != "Z" && state != "X"),
        Err(_) => false,
    }
}

#[tokio::test]
async fn test_spawn_tool_returns_valid_child() {
    let mut cmd = Command::new("echo");
    cmd.arg("test");

    let mut child = spawn_tool(cmd).await.expect("Failed to spawn tool");
    assert!(child.id().expect("Child process has no PID") > 0);

    let result = capture(&mut child).await.expect("Failed to wait for child");
    assert!(result.success());
    assert_eq!(result.output, "test\n");
}

#[tokio::test]
async fn test_stderr_and_exit_code_captured() {
    let result = run_with_timeout(
        sh("echo out_line; echo err_line >&2; exit 3"),
        Duration::from_secs(10),
        None,
    )
    .await
    .unwrap();

    assert_eq!(result.exit_code, 3);
    assert!(!result.success());
    assert!(result.output.contains("out_line"));
    assert!(result.stderr_output.contains("err_line"));
}

#[tokio::test]
async fn test_timeout_kills_process_group() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("grandchild.pid");
    let script = format!("sleep 30 & echo $! > {}; wait", pid_file.display());

    let started = Instant::now();
    let err = run_with_timeout(sh(&script), Duration::from_millis(300), None)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("timed out"), "got: {err}");
    assert!(started.elapsed() < Duration::from_secs(10));

    tokio::time::sleep(Duration::from_millis(200)).await;
    let grandchild: i32 = std::fs::read_to_string(&pid_file)
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    assert!(!is_running(grandchild), "grandchild {grandchild} survived the timeout");
}

#[tokio::test]
async fn test_registry_tracks_and_releases_pid() {
    let registry = ProcessRegistry::new();
    let result = run_with_timeout(sh("echo done"), Duration::from_secs(10), Some(&registry))
        .await
        .unwrap();
    assert!(result.success());
    assert_eq!(registry.live_count(), 0);
    assert_eq!(registry.terminate_all(), 0);
}

#[tokio::test]
async fn test_terminate_all_stops_live_run() {
    let registry = ProcessRegistry::new();
    let task = {
        let registry = registry.clone();
        tokio::spawn(async move {
            run_with_timeout(sh("sleep 30"), Duration::from_secs(60), Some(&registry)).await
        })
    };

    let deadline = Instant::now() + Duration::from_secs(10);
    while registry.live_count() == 0 {
        assert!(Instant::now() < deadline, "process never registered");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(registry.terminate_all(), 1);

    let err = task.await.unwrap().unwrap_err();
    assert!(err.downcast_ref::<Terminated>().is_some(), "got: {err}");
    assert_eq!(registry.live_count(), 0);
}

#[tokio::test]
async fn test_spawn_failure_is_error() {
    let cmd = Command::new("/nonexistent/crew-tool-binary");
    let err = run_with_timeout(cmd, Duration::from_secs(1), None)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Failed to spawn"));
}

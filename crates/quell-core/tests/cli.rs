//! CLI tests for the quell binary.
//!
//! Every invocation points `--config` and `--state-file` at a temp dir so the
//! user's real configuration is never read or written.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

fn quell(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("quell").expect("quell binary should exist");
    cmd.env_remove("QUELL_CONFIG_DIR")
        .env_remove("QUELL_LOG")
        .arg("--config")
        .arg(dir)
        .arg("--state-file")
        .arg(dir.join("state.json"));
    cmd
}

fn json_stdout(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

// ============================================================================
// Argument handling
// ============================================================================

mod args {
    use super::*;

    #[test]
    fn version_prints_schema() {
        let dir = TempDir::new().unwrap();
        quell(dir.path())
            .arg("version")
            .assert()
            .success()
            .stdout(predicate::str::contains("quell "))
            .stdout(predicate::str::contains("Schema version"));
    }

    #[test]
    fn version_json_envelope() {
        let dir = TempDir::new().unwrap();
        let output = quell(dir.path())
            .args(["-f", "json", "version"])
            .output()
            .unwrap();
        assert!(output.status.success());
        let v = json_stdout(&output);
        assert_eq!(v["command"], "version");
        assert!(v["schema_version"].is_string());
        assert!(v["version"].is_string());
    }

    #[test]
    fn unknown_command_fails() {
        let dir = TempDir::new().unwrap();
        quell(dir.path())
            .arg("nonexistent-command")
            .assert()
            .failure()
            .stderr(predicate::str::contains("error"));
    }

    #[test]
    fn invalid_sort_value_fails() {
        let dir = TempDir::new().unwrap();
        quell(dir.path())
            .args(["list", "--sort", "name"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("error"));
    }

    #[test]
    fn kill_requires_a_target() {
        let dir = TempDir::new().unwrap();
        quell(dir.path()).arg("kill").assert().failure();
    }

    #[test]
    fn kill_pids_and_name_conflict() {
        let dir = TempDir::new().unwrap();
        quell(dir.path())
            .args(["kill", "123", "--name", "sh"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("cannot be used with"));
    }

    #[test]
    fn tree_and_flat_conflict() {
        let dir = TempDir::new().unwrap();
        quell(dir.path())
            .args(["list", "--tree", "--flat"])
            .assert()
            .failure();
    }
}

// ============================================================================
// Configuration errors
// ============================================================================

mod config {
    use super::*;

    #[test]
    fn malformed_config_exits_11() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.json"), "{ not json").unwrap();
        quell(dir.path())
            .arg("list")
            .assert()
            .code(11)
            .stderr(predicate::str::contains("config.json"));
    }

    #[test]
    fn out_of_range_interval_exits_11() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("config.json"),
            r#"{"poll_interval_ms": 1}"#,
        )
        .unwrap();
        quell(dir.path()).arg("paused").assert().code(11);
    }

    #[test]
    fn json_errors_are_structured() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.json"), "42").unwrap();
        let output = quell(dir.path())
            .args(["-f", "json", "list"])
            .output()
            .unwrap();
        assert_eq!(output.status.code(), Some(11));
        let err: serde_json::Value =
            serde_json::from_slice(&output.stderr).expect("stderr is JSON");
        assert_eq!(err["code"], 10);
    }
}

// ============================================================================
// Live process table (Linux only)
// ============================================================================

#[cfg(target_os = "linux")]
mod live {
    use super::*;
    use std::process::{Child, Command as StdCommand};
    use std::time::{Duration, Instant};

    struct Sleeper(Child);

    impl Sleeper {
        fn spawn() -> Self {
            Self::spawn_as("sleep")
        }

        /// Run `sleep` under another program name.
        fn spawn_as(program: impl AsRef<std::ffi::OsStr>) -> Self {
            Sleeper(StdCommand::new(program).arg("30").spawn().unwrap())
        }

        fn pid(&self) -> u32 {
            self.0.id()
        }

        fn state(&self) -> Option<char> {
            let stat = std::fs::read_to_string(format!("/proc/{}/stat", self.pid())).ok()?;
            let rest = &stat[stat.rfind(')')? + 1..];
            rest.trim_start().chars().next()
        }

        fn wait_state(&self, want: impl Fn(Option<char>) -> bool) -> bool {
            let start = Instant::now();
            while start.elapsed() < Duration::from_secs(5) {
                if want(self.state()) {
                    return true;
                }
                std::thread::sleep(Duration::from_millis(20));
            }
            false
        }
    }

    impl Drop for Sleeper {
        fn drop(&mut self) {
            let _ = self.0.kill();
            let _ = self.0.wait();
        }
    }

    #[test]
    fn list_json_includes_self() {
        let dir = TempDir::new().unwrap();
        let output = quell(dir.path())
            .args(["-f", "json", "list", "--sort", "pid"])
            .output()
            .unwrap();
        assert!(output.status.success());
        let v = json_stdout(&output);
        assert_eq!(v["command"], "list");
        assert_eq!(v["sort"], "pid");
        let rows = v["processes"].as_array().unwrap();
        assert_eq!(rows.len() as u64, v["count"].as_u64().unwrap());
        let me = u64::from(std::process::id());
        assert!(rows.iter().any(|r| r["pid"].as_u64() == Some(me)));

        let pids: Vec<u64> = rows.iter().filter_map(|r| r["pid"].as_u64()).collect();
        assert!(pids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn list_tree_adds_depth() {
        let dir = TempDir::new().unwrap();
        let output = quell(dir.path())
            .args(["-f", "json", "list", "--tree"])
            .output()
            .unwrap();
        assert!(output.status.success());
        let v = json_stdout(&output);
        assert_eq!(v["tree"], true);
        let rows = v["processes"].as_array().unwrap();
        assert!(rows.iter().all(|r| r["depth"].is_u64()));
        assert_eq!(rows[0]["depth"], 0);
    }

    #[test]
    fn sort_choice_is_persisted() {
        let dir = TempDir::new().unwrap();
        quell(dir.path())
            .args(["list", "--sort", "memory"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Memory"));

        let state = std::fs::read_to_string(dir.path().join("state.json")).unwrap();
        let state: serde_json::Value = serde_json::from_str(&state).unwrap();
        assert_eq!(state["sort"], "memory");

        let output = quell(dir.path()).args(["-f", "json", "list"]).output().unwrap();
        assert_eq!(json_stdout(&output)["sort"], "memory");
    }

    #[test]
    fn kill_missing_pid_exits_13() {
        let dir = TempDir::new().unwrap();
        quell(dir.path())
            .args(["kill", "4194321"])
            .assert()
            .code(13)
            .stderr(predicate::str::contains("4194321"));
    }

    #[test]
    fn port_filter_without_listener_exits_1() {
        let dir = TempDir::new().unwrap();
        // Port 1 (tcpmux) is essentially never bound on a test host.
        quell(dir.path()).args(["list", "--port", "1"]).assert().code(1);
    }

    #[test]
    fn suspend_resume_kill_across_invocations() {
        let dir = TempDir::new().unwrap();
        let sleeper = Sleeper::spawn();
        let pid = sleeper.pid().to_string();

        quell(dir.path()).args(["suspend", &pid]).assert().success();
        assert!(sleeper.wait_state(|s| s == Some('T')));

        let output = quell(dir.path()).args(["-f", "json", "paused"]).output().unwrap();
        let v = json_stdout(&output);
        assert_eq!(v["count"], 1);
        assert_eq!(v["paused"][0]["pid"].as_u64(), Some(u64::from(sleeper.pid())));

        quell(dir.path()).args(["resume", &pid]).assert().success();
        assert!(sleeper.wait_state(|s| s != Some('T')));

        let output = quell(dir.path()).args(["-f", "json", "paused"]).output().unwrap();
        assert_eq!(json_stdout(&output)["count"], 0);

        quell(dir.path()).args(["kill", &pid]).assert().success();
        assert!(sleeper.wait_state(|s| s.is_none() || s == Some('Z')));
    }

    #[test]
    fn kill_several_pids_reports_partial_failure() {
        let dir = TempDir::new().unwrap();
        let sleeper = Sleeper::spawn();
        let pid = sleeper.pid().to_string();

        let output = quell(dir.path())
            .args(["-f", "json", "kill", &pid, "4194321"])
            .output()
            .unwrap();
        assert_eq!(output.status.code(), Some(3));
        let v = json_stdout(&output);
        assert_eq!(v["count"], 1);
        assert_eq!(v["killed"][0].as_u64(), Some(u64::from(sleeper.pid())));
        assert_eq!(v["failed"][0]["pid"], 4194321);
        assert!(sleeper.wait_state(|s| s.is_none() || s == Some('Z')));
    }

    #[test]
    fn kill_by_name_ignores_case() {
        let sleep = ["/usr/bin/sleep", "/bin/sleep"]
            .into_iter()
            .map(Path::new)
            .find(|p| p.exists())
            .expect("sleep binary");
        let dir = TempDir::new().unwrap();
        let name = format!("qzsl{}", std::process::id() % 100_000);
        let link = dir.path().join(&name);
        std::os::unix::fs::symlink(sleep, &link).unwrap();

        let first = Sleeper::spawn_as(&link);
        let second = Sleeper::spawn_as(&link);
        let execed = |s: &Sleeper| {
            let start = Instant::now();
            while start.elapsed() < Duration::from_secs(5) {
                let comm = std::fs::read_to_string(format!("/proc/{}/comm", s.pid()));
                if comm.is_ok_and(|c| c.trim() == name) {
                    return true;
                }
                std::thread::sleep(Duration::from_millis(20));
            }
            false
        };
        assert!(execed(&first) && execed(&second));

        let output = quell(dir.path())
            .args(["-f", "json", "kill", "--name", &name.to_uppercase()])
            .output()
            .unwrap();
        assert!(output.status.success());
        assert_eq!(json_stdout(&output)["count"], 2);
        assert!(first.wait_state(|s| s.is_none() || s == Some('Z')));
        assert!(second.wait_state(|s| s.is_none() || s == Some('Z')));
    }

    #[test]
    fn kill_by_name_without_match_exits_1() {
        let dir = TempDir::new().unwrap();
        quell(dir.path())
            .args(["kill", "--name", "no-such-process-qz"])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("no processes found matching"));
    }

    #[test]
    fn watch_stops_after_count() {
        let dir = TempDir::new().unwrap();
        let output = quell(dir.path())
            .args(["-f", "json", "watch", "--interval-ms", "100", "-n", "2"])
            .timeout(Duration::from_secs(30))
            .output()
            .unwrap();
        assert!(output.status.success());
        let lines: Vec<serde_json::Value> = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["tick"], 1);
        assert!(lines[1]["count"].as_u64().unwrap() > 0);
    }
}

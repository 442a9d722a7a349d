//! ---
//! esu_section: "03-operator-cli"
//! esu_subsection: "integration-tests"
//! esu_type: "source"
//! esu_scope: "code"
//! esu_description: "Command line behaviour of esu-trials."
//! esu_version: "v0.1.0"
//! esu_owner: "tbd"
//! ---
use std::fs;
use std::path::Path;

use assert_cmd::Command;

fn esu_trials(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("esu-trials").unwrap();
    cmd.current_dir(dir)
        .env_remove("ESU_TRIALS_CONFIG")
        .env_remove("ESU_TRIALS_LOG");
    cmd
}

fn stdout_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn missing_iteration_count_prints_usage() {
    let dir = tempfile::tempdir().unwrap();
    let output = esu_trials(dir.path()).output().unwrap();

    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("Usage"));
    assert!(!dir.path().join("output").exists(), "nothing may run on a usage error");
}

#[test]
fn non_integer_process_count_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let output = esu_trials(dir.path()).args(["2", "many"]).output().unwrap();

    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("invalid value"));
    assert!(!dir.path().join("output").exists());
}

#[test]
fn version_flag_needs_no_iterations() {
    let dir = tempfile::tempdir().unwrap();
    let output = esu_trials(dir.path()).arg("-V").output().unwrap();

    assert!(output.status.success());
    assert!(stdout_of(&output).starts_with("esu-trials v"));
}

#[test]
fn missing_config_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let output = esu_trials(dir.path())
        .args(["1", "--config", "absent.toml"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("absent.toml does not exist"));
}

#[cfg(unix)]
#[test]
fn closed_stdout_is_a_clean_fatal_error() {
    use std::process::{Command as StdCommand, Stdio};

    let dir = tempfile::tempdir().unwrap();
    let mut child = StdCommand::new(assert_cmd::cargo::cargo_bin("esu-trials"))
        .args(["3", "2"])
        .current_dir(dir.path())
        .env_remove("ESU_TRIALS_CONFIG")
        .env_remove("ESU_TRIALS_LOG")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    // Reader goes away before the first line is mirrored.
    drop(child.stdout.take());

    let output = child.wait_with_output().unwrap();
    assert!(!output.status.success());
    let stderr = stderr_of(&output);
    assert!(stderr.contains("failed to write run log"), "stderr: {stderr}");
    assert!(!stderr.contains("panicked"), "stderr: {stderr}");
}

#[cfg(unix)]
mod with_fake_engine {
    use super::*;

    const ENGINE: &str = r#"root="$1"; shift
for arg in "$@"; do
  case "$arg" in Launch.LogPrepend=*) tag="${arg#Launch.LogPrepend=}" ;; esac
done
process="${tag##*_}"
if [ $((process % 2)) -eq 0 ]; then result=WIN; else result=LOSS; fi
mkdir -p "$root"
printf 'PLAYER NAME | RESULT\nESU AI | %s\n' "$result" > "$root/${tag}_end_game_fitness.log"
echo "game over for $tag"
"#;

    fn write_config(dir: &Path, program: &str) -> std::path::PathBuf {
        let engine = dir.join("engine.sh");
        fs::write(&engine, ENGINE).unwrap();
        let logs = dir.join("Logs");
        let config = format!(
            r#"
[launch]
program = '{program}'
leading_args = ['{engine}', '{logs}']
working_dir = '{dir}'

[artifacts]
root = '{logs}'

[scheduler]
max_parallel = 2
"#,
            engine = engine.display(),
            logs = logs.display(),
            dir = dir.display(),
        );
        let path = dir.join("harness.toml");
        fs::write(&path, config).unwrap();
        path
    }

    #[test]
    fn run_reports_exact_failure_count() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path(), "sh");

        let output = esu_trials(dir.path())
            .arg("2")
            .arg("3")
            .arg("--config")
            .arg(&config)
            .output()
            .unwrap();

        assert!(output.status.success(), "stderr: {}", stderr_of(&output));
        let stdout = stdout_of(&output);
        assert!(stdout.contains("2 failures out of 6 runs."), "stdout: {stdout}");
        assert!(stdout.contains("Total elapsed:"));

        let entries: Vec<String> = fs::read_dir(dir.path().join("output"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        let run_logs: Vec<_> = entries.iter().filter(|n| n.ends_with("_output.log")).collect();
        assert_eq!(run_logs.len(), 1);
        assert_eq!(entries.iter().filter(|n| n.ends_with("_stdout.log")).count(), 6);
        assert_eq!(entries.iter().filter(|n| n.ends_with("_stderr.log")).count(), 6);
        assert_eq!(entries.iter().filter(|n| n.ends_with("_summary.json")).count(), 1);

        // Every line that reached the console also reached the run log.
        let logged = fs::read_to_string(dir.path().join("output").join(run_logs[0])).unwrap();
        assert_eq!(logged, stdout);
    }

    #[test]
    fn engine_beside_the_harness_directory_launches() {
        let dir = tempfile::tempdir().unwrap();
        let harness_dir = dir.path().join("harness");
        fs::create_dir(&harness_dir).unwrap();
        std::os::unix::fs::symlink("/bin/sh", dir.path().join("engine")).unwrap();
        let config = write_config(dir.path(), "./engine");
        let relative = fs::read_to_string(&config)
            .unwrap()
            .replace(&format!("working_dir = '{}'", dir.path().display()), "working_dir = '..'");
        fs::write(&config, relative).unwrap();

        let output = esu_trials(&harness_dir)
            .args(["1", "2", "--config"])
            .arg(&config)
            .output()
            .unwrap();

        assert!(output.status.success(), "stderr: {}", stderr_of(&output));
        assert!(stdout_of(&output).contains("1 failures out of 2 runs."));
    }

    #[test]
    fn launch_failure_aborts_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_config(dir.path(), "./no-such-engine");

        let output = esu_trials(dir.path())
            .args(["1", "2", "--config"])
            .arg(&config)
            .output()
            .unwrap();

        assert!(!output.status.success());
        let stderr = stderr_of(&output);
        assert!(stderr.contains("failed to launch trial"), "stderr: {stderr}");
        assert!(!stdout_of(&output).contains("failures out of"));
    }
}

use std::path::Path;
use std::process::Command;

use super::AdapterError;

/// Lines of stderr kept in the error when a command fails.
const STDERR_TAIL_LINES: usize = 20;

/// Run `argv` to completion in `cwd` with extra environment variables.
///
/// Stdout is forwarded to the log at debug level; a non-zero exit becomes
/// `CommandFailed` carrying the tail of stderr.
pub fn run_command(argv: &[String], envs: &[(&str, String)], cwd: &Path) -> Result<(), AdapterError> {
    let (program, args) = argv.split_first().ok_or(AdapterError::NoCommand)?;
    let command_line = argv.join(" ");
    tracing::info!("Running `{}`", command_line);

    let output = Command::new(program)
        .args(args)
        .envs(envs.iter().map(|(k, v)| (*k, v.as_str())))
        .current_dir(cwd)
        .output()
        .map_err(|e| AdapterError::io(Path::new(program), e))?;

    for line in String::from_utf8_lossy(&output.stdout).lines() {
        tracing::debug!("[{}] {}", program, line);
    }

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let lines: Vec<&str> = stderr.lines().collect();
        let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n");
        return Err(AdapterError::CommandFailed {
            command: command_line,
            status: output.status.to_string(),
            stderr: tail,
        });
    }
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[test]
    fn passes_environment_and_cwd() {
        let dir = TempDir::new().unwrap();
        run_command(
            &sh("printf '%s' \"$CHURNOPS_TEST_VALUE\" > out.txt"),
            &[("CHURNOPS_TEST_VALUE", "hello".to_string())],
            dir.path(),
        )
        .unwrap();
        assert_eq!(std::fs::read_to_string(dir.path().join("out.txt")).unwrap(), "hello");
    }

    #[test]
    fn non_zero_exit_reports_stderr() {
        let dir = TempDir::new().unwrap();
        let err = run_command(&sh("echo 'training blew up' >&2; exit 3"), &[], dir.path()).unwrap_err();
        match err {
            AdapterError::CommandFailed { command, stderr, .. } => {
                assert_eq!(command, "sh -c echo 'training blew up' >&2; exit 3");
                assert_eq!(stderr, "training blew up");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn empty_command_is_rejected() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(run_command(&[], &[], dir.path()), Err(AdapterError::NoCommand)));
    }
}

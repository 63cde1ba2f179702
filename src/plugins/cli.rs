//! Command-line plugin steps

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::config::StepConfig;
use crate::credentials::CredentialStore;
use crate::hash::digest_all;
use crate::plugins::placeholders::{self, PlaceholderContext};
use crate::plugins::{StepContext, StepOutcome, StepRunner};
use crate::storage;

/// Runs a step as a local process.
///
/// When the command line references `${filePath}` the working bytes are
/// staged as a temp file first; the staged copy lives until any
/// replacement it produced has been read back.
pub struct CliRunner;

#[async_trait]
impl StepRunner for CliRunner {
    async fn run(
        &self,
        id: &str,
        step: &StepConfig,
        creds: Option<&CredentialStore>,
        ctx: &StepContext<'_>,
    ) -> StepOutcome {
        let staging = if placeholders::wants_file_path(&step.endpoint) {
            match storage::stage_temp_copy(ctx.bytes, ctx.extension) {
                Ok(pair) => Some(pair),
                Err(err) => {
                    return StepOutcome::failure(format!("could not stage file for step: {}", err))
                }
            }
        } else {
            None
        };

        let hashes =
            placeholders::wants_named_checksums(&step.endpoint).then(|| digest_all(ctx.bytes));
        let pctx = PlaceholderContext {
            file_path: staging.as_ref().map(|(_, path)| path.as_path()),
            bytes: ctx.bytes,
            hashes: hashes.as_ref(),
            creds,
        };
        let command_line = match placeholders::substitute(&step.endpoint, &pctx) {
            Ok(line) => line,
            Err(err) => return StepOutcome::failure(err),
        };

        let mut parts = command_line.split_whitespace();
        let Some(program) = parts.next() else {
            return StepOutcome::failure("empty command line after substitution");
        };
        let mut command = Command::new(program);
        command
            .args(parts)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(step = id, program, "running cli step");

        let child = match command.spawn() {
            Ok(child) => child,
            Err(err) => return StepOutcome::failure(format!("Process failed: {}", err)),
        };
        let output = match tokio::time::timeout(step.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => return StepOutcome::failure(format!("Process failed: {}", err)),
            Err(_) => {
                return StepOutcome::failure(format!("Process timeout: {}", command_line))
            }
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        let combined = combined.trim().to_string();

        if !output.status.success() {
            return StepOutcome::failure(format!("Process failed: {}", combined));
        }

        let prefix = placeholders::expected_prefix(&step.response);
        if combined.contains(prefix) {
            let extracted = placeholders::extract(&step.response, &combined);
            let outcome = StepOutcome::success(combined, extracted);
            match staging {
                Some((dir, _)) => outcome.keep_staging(dir),
                None => outcome,
            }
        } else {
            StepOutcome::failure(format!(
                "expected: \"{}\", received: {}",
                prefix, combined
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::config::{FailurePolicy, StepAction};
    use crate::hash::{digest_hex, HashAlgorithm};

    fn cli_step(endpoint: &str, response: &str, timeout: Duration) -> StepConfig {
        StepConfig {
            action: StepAction::Cli {},
            run_before: true,
            run_after: false,
            creds_path: None,
            timeout,
            on_timeout_or_fail: FailurePolicy::Fail,
            endpoint: endpoint.to_string(),
            response: response.to_string(),
        }
    }

    fn ctx<'a>(bytes: &'a [u8]) -> StepContext<'a> {
        StepContext {
            bytes,
            extension: "pdf",
            clean_file_name: "a.pdf",
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn echo_step_succeeds_and_extracts() {
        let step = cli_step(
            "echo Success: ${fileChecksum}",
            "Success: ${scan.fileChecksum}",
            Duration::from_secs(5),
        );
        let outcome = CliRunner.run("av.scan", &step, None, &ctx(b"abc")).await;
        assert!(outcome.success, "unexpected failure: {}", outcome.message);
        assert_eq!(
            outcome.extracted["scan.fileChecksum"],
            digest_hex(HashAlgorithm::Sha256, b"abc")
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unexpected_output_is_a_failure() {
        let step = cli_step("echo nope", "Success: ${scan.verdict}", Duration::from_secs(5));
        let outcome = CliRunner.run("av.scan", &step, None, &ctx(b"abc")).await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("expected: \"Success: \""));
        assert!(outcome.message.contains("nope"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_steps_time_out() {
        let step = cli_step("sleep 5", "done", Duration::from_millis(100));
        let outcome = CliRunner.run("av.scan", &step, None, &ctx(b"abc")).await;
        assert!(!outcome.success);
        assert!(outcome.message.starts_with("Process timeout:"));
    }

    #[tokio::test]
    async fn missing_programs_fail_cleanly() {
        let step = cli_step(
            "definitely_not_a_real_program_zz --flag",
            "done",
            Duration::from_secs(1),
        );
        let outcome = CliRunner.run("av.scan", &step, None, &ctx(b"abc")).await;
        assert!(!outcome.success);
        assert!(outcome.message.starts_with("Process failed:"));
    }
}

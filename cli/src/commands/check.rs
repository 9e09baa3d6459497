use std::io::{BufRead, Write};

use qualcode_core::api::{CliError, CommitDecision, DedupGate, DeduplicationCheckResult};

use super::cli::CheckCodesArgs;

pub async fn check_codes(gate: &DedupGate, args: CheckCodesArgs) -> Result<i32, CliError> {
    let threshold = args.threshold.unwrap_or_else(|| gate.default_threshold());
    let mode = args.decision;

    let outcome = gate
        .guard(&args.codes, threshold, |check| match mode.fixed() {
            Some(decision) => decision,
            None => {
                let stdin = std::io::stdin();
                let mut stderr = std::io::stderr();
                prompt_blocking(check, &mut stdin.lock(), &mut stderr)
            }
        })
        .await?;

    if outcome.is_aborted() {
        return Err(CliError::Aborted);
    }
    let out = serde_json::to_string_pretty(&outcome.to_commit)
        .map_err(|e| CliError::Command(e.to_string()))?;
    println!("{out}");
    Ok(0)
}

/// Runs [`prompt_decision`] without stalling the async worker thread.
/// Requires the multi-thread runtime.
pub fn prompt_blocking<R, W>(
    check: &DeduplicationCheckResult,
    input: &mut R,
    out: &mut W,
) -> CommitDecision
where
    R: BufRead,
    W: Write,
{
    tokio::task::block_in_place(|| prompt_decision(check, input, out))
}

/// Lists the similar pairs and reads one of `a` (all), `n` (new only) or
/// `c` (cancel). Anything unreadable counts as cancel.
pub fn prompt_decision<R, W>(
    check: &DeduplicationCheckResult,
    input: &mut R,
    out: &mut W,
) -> CommitDecision
where
    R: BufRead,
    W: Write,
{
    let _ = writeln!(out, "similar codes already exist:");
    for item in check.flagged() {
        for m in &item.similar {
            let _ = writeln!(
                out,
                "  {} ~ {} ({:.0}%)",
                item.candidate,
                m.existing,
                m.similarity * 100.0
            );
        }
    }

    loop {
        let _ = write!(out, "commit [a]ll, [n]ew only, or [c]ancel? ");
        let _ = out.flush();

        let mut line = String::new();
        match input.read_line(&mut line) {
            Ok(0) | Err(_) => return CommitDecision::Abort,
            Ok(_) => {}
        }
        match line.trim().to_ascii_lowercase().as_str() {
            "a" | "all" => return CommitDecision::CommitAll,
            "n" | "new" => return CommitDecision::CommitNonDuplicatesOnly,
            "c" | "cancel" | "abort" => return CommitDecision::Abort,
            _ => continue,
        }
    }
}

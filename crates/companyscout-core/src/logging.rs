use anyhow::{Context, Result};
use chrono::{Datelike, Utc};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs::{OpenOptions, create_dir_all};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::model::{Job, RunState};

static REDACTION_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        (
            "api_key",
            Regex::new(r"(?i)(api[_-]?key\s*[:=]\s*)([A-Za-z0-9\-_.+/]+)")
                .expect("invalid api_key regex"),
        ),
        (
            "bearer",
            Regex::new(r"(?i)(bearer\s+)([A-Za-z0-9\-_.+=/]+)").expect("invalid bearer regex"),
        ),
        (
            "sk_token",
            Regex::new(r"(sk-[A-Za-z0-9\-_]{16,})").expect("invalid sk_token regex"),
        ),
    ]
});

#[derive(Serialize)]
struct JobLogRecord<'a> {
    timestamp: String,
    job_id: &'a str,
    company_name: String,
    mode: &'static str,
    status: &'static str,
    duration_seconds: Option<f64>,
    providers: Vec<ProviderLogEntry>,
    error: Option<String>,
    redactions: Vec<&'static str>,
}

#[derive(Serialize)]
struct ProviderLogEntry {
    provider: String,
    status: RunState,
    total_score: Option<u32>,
    error: Option<String>,
}

fn sanitize_text(input: &str, redactions: &mut BTreeSet<&'static str>) -> String {
    let mut output = input.to_string();
    for (name, regex) in REDACTION_PATTERNS.iter() {
        let mut matched = false;
        output = regex
            .replace_all(&output, |caps: &Captures| {
                matched = true;
                if caps.len() > 2 {
                    format!("{}[REDACTED]", &caps[1])
                } else {
                    "[REDACTED]".to_string()
                }
            })
            .to_string();
        if matched {
            redactions.insert(*name);
        }
    }
    output
}

/// Strip credentials from text bound for logs or job error fields.
pub fn redact_secrets(input: &str) -> String {
    sanitize_text(input, &mut BTreeSet::new())
}

fn append_json_line<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)
            .with_context(|| format!("failed to create log directory {}", parent.display()))?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let line = serde_json::to_string(value)?;
    writeln!(writer, "{}", line)
        .with_context(|| format!("failed to append log entry to {}", path.display()))?;
    writer.flush()?;
    Ok(())
}

/// Append a redacted summary of a finished job to `<base_dir>/YYYY/MM/jobs.jsonl`.
pub fn log_job_completion(base_dir: &Path, job: &Job) -> Result<PathBuf> {
    let timestamp = Utc::now();
    let mut redactions = BTreeSet::new();

    let providers: Vec<ProviderLogEntry> = job
        .providers
        .iter()
        .map(|name| {
            let slot = job.per_provider_status.get(name);
            ProviderLogEntry {
                provider: name.clone(),
                status: slot.map(|slot| slot.status).unwrap_or(RunState::Pending),
                total_score: job
                    .per_provider_result
                    .get(name)
                    .map(|entity| entity.score_breakdown.total_score),
                error: slot
                    .and_then(|slot| slot.error.as_deref())
                    .map(|err| sanitize_text(err, &mut redactions)),
            }
        })
        .collect();

    let record = JobLogRecord {
        timestamp: timestamp.to_rfc3339(),
        job_id: &job.id,
        company_name: sanitize_text(&job.company_name, &mut redactions),
        mode: job.mode.as_str(),
        status: job.status.as_str(),
        duration_seconds: job.duration_seconds(),
        providers,
        error: job
            .error
            .as_deref()
            .map(|err| sanitize_text(err, &mut redactions)),
        redactions: redactions.iter().copied().collect(),
    };

    let path = base_dir
        .join(format!("{:04}", timestamp.year()))
        .join(format!("{:02}", timestamp.month()))
        .join("jobs.jsonl");
    append_json_line(&path, &record)?;

    if !record.redactions.is_empty() {
        warn!(
            job_id = %job.id,
            fields = ?record.redactions,
            "redacted potential secrets from job log"
        );
    }

    Ok(path)
}

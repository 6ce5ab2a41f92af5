//! Concurrent fan-out across the family validators.
//!
//! One task per family on the tokio runtime, validation itself on the
//! blocking pool, bounded by a semaphore of `max_workers` permits. Families
//! are queued in priority order; the semaphore is FIFO, so high-priority
//! work grabs permits first. A failing task is recorded and never sinks its
//! siblings.
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::Local;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::Config;
use crate::error::AppResult;
use crate::family::{Family, Priority};
use crate::report;
use crate::validate::{self, FamilyReport};

#[derive(Debug, Serialize)]
pub struct TaskOutcome {
    pub family: Family,
    pub priority: Priority,
    pub elapsed_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub report: Option<FamilyReport>,
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        self.report.is_some()
    }

    fn failed(family: Family, elapsed_seconds: f64, error: String) -> TaskOutcome {
        TaskOutcome {
            family,
            priority: family.priority(),
            elapsed_seconds,
            report_path: None,
            error: Some(error),
            report: None,
        }
    }
}

#[derive(Debug)]
pub struct OrchestratorReport {
    pub outcomes: Vec<TaskOutcome>,
    pub total_elapsed_seconds: f64,
    pub comprehensive_report: PathBuf,
    pub json_summary: PathBuf,
}

impl OrchestratorReport {
    pub fn reports(&self) -> impl Iterator<Item = &FamilyReport> {
        self.outcomes.iter().filter_map(|o| o.report.as_ref())
    }

    pub fn total_workflows(&self) -> usize {
        self.reports().map(|r| r.total_workflows()).sum()
    }
    pub fn total_models(&self) -> usize {
        self.reports().map(|r| r.total_models()).sum()
    }
    pub fn found_models(&self) -> usize {
        self.reports().map(|r| r.found_models()).sum()
    }
    pub fn missing_models(&self) -> usize {
        self.reports().map(|r| r.missing_models()).sum()
    }
    pub fn successful_tasks(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }
}

/// Validate one family and write its Markdown report.
fn run_family_task(family: Family, config: &Config) -> AppResult<(FamilyReport, PathBuf)> {
    let family_report = validate::validate_family(family, config)?;
    let path = config
        .reports_dir
        .join(format!("{}_validation_report.md", family.name().replace('-', "_")));
    report::write_report(&path, &report::family_markdown(&family_report))?;
    Ok((family_report, path))
}

/// Run every family validator and write the combined reports.
pub async fn run(config: &Config) -> AppResult<OrchestratorReport> {
    let started = Instant::now();
    tracing::info!(
        workers = config.max_workers,
        tasks = Family::ALL.len(),
        "starting validation orchestration"
    );

    let mut families = Family::ALL.to_vec();
    families.sort_by_key(|f| f.priority());

    let semaphore = Arc::new(Semaphore::new(config.max_workers));
    let mut tasks = JoinSet::new();

    for family in families {
        let semaphore = semaphore.clone();
        let config = config.clone();
        tasks.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return TaskOutcome::failed(family, 0.0, "worker pool closed".into()),
            };
            let task_started = Instant::now();
            tracing::info!(family = family.name(), "starting validation task");

            let joined =
                tokio::task::spawn_blocking(move || run_family_task(family, &config)).await;
            let elapsed = task_started.elapsed().as_secs_f64();

            match joined {
                Ok(Ok((family_report, path))) => {
                    tracing::info!(
                        family = family.name(),
                        elapsed_seconds = elapsed,
                        missing = family_report.missing_models(),
                        "validation task finished"
                    );
                    TaskOutcome {
                        family,
                        priority: family.priority(),
                        elapsed_seconds: elapsed,
                        report_path: Some(path),
                        error: None,
                        report: Some(family_report),
                    }
                }
                Ok(Err(e)) => {
                    tracing::error!(family = family.name(), error = %e, "validation task failed");
                    TaskOutcome::failed(family, elapsed, e.to_string())
                }
                Err(join_error) => {
                    tracing::error!(family = family.name(), error = %join_error, "validation task panicked");
                    TaskOutcome::failed(family, elapsed, format!("task panicked: {join_error}"))
                }
            }
        });
    }

    let mut outcomes = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => tracing::error!(error = %e, "orchestrator task lost"),
        }
    }
    outcomes.sort_by_key(|o| (o.priority, o.family.name()));

    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let comprehensive_report = config
        .reports_dir
        .join(format!("comprehensive_validation_report_{stamp}.md"));
    let json_summary = config.reports_dir.join(format!("validation_summary_{stamp}.json"));

    let outcome = OrchestratorReport {
        outcomes,
        total_elapsed_seconds: started.elapsed().as_secs_f64(),
        comprehensive_report: comprehensive_report.clone(),
        json_summary: json_summary.clone(),
    };

    report::write_report(&comprehensive_report, &report::comprehensive_markdown(&outcome))?;
    report::write_report(&json_summary, &report::orchestrator_json(&outcome)?)?;

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn write_file(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[tokio::test]
    async fn runs_every_family_and_writes_reports() {
        let install = tempfile::tempdir().unwrap();
        let models = tempfile::tempdir().unwrap();

        write_file(
            &install.path().join("workflows/ltx_demo.json"),
            r#"{"1": {"class_type": "CheckpointLoaderSimple",
                      "inputs": {"ckpt_name": "ltx-video-2b.safetensors"}}}"#,
        );
        write_file(&models.path().join("checkpoints/ltx-video-2b.safetensors"), "");

        let config = Config {
            comfyui_path: install.path().to_path_buf(),
            model_roots: vec![models.path().to_path_buf()],
            reports_dir: install.path().join("validation_reports"),
            comfyui_url: "http://localhost:8188".to_string(),
            max_workers: 2,
        };

        let run = run(&config).await.unwrap();
        assert_eq!(run.outcomes.len(), Family::ALL.len());
        assert_eq!(run.successful_tasks(), Family::ALL.len());
        assert_eq!(run.total_models(), 1);
        assert_eq!(run.missing_models(), 0);

        assert!(run.comprehensive_report.is_file());
        assert!(run.json_summary.is_file());
        assert!(config.reports_dir.join("ltx_validation_report.md").is_file());
    }

    #[tokio::test]
    async fn high_priority_families_sort_first() {
        let install = tempfile::tempdir().unwrap();
        let config = Config {
            comfyui_path: install.path().to_path_buf(),
            model_roots: vec![],
            reports_dir: install.path().join("reports"),
            comfyui_url: "http://localhost:8188".to_string(),
            max_workers: 1,
        };
        let run = run(&config).await.unwrap();
        assert_eq!(run.outcomes.first().unwrap().priority, Priority::High);
        assert_eq!(run.outcomes.last().unwrap().family, Family::Generic);
    }
}

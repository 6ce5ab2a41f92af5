//! Markdown and JSON report generation.
//!
//! The Markdown layout follows the per-family validation reports: summary
//! block, missing-models catalog grouped by category, then per-workflow
//! details sorted worst-first. The orchestrator gets a comprehensive
//! variant on top with task timing and a performance section.
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use chrono::Local;
use serde::Serialize;
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::orchestrate::OrchestratorReport;
use crate::validate::{FamilyReport, WorkflowReport};

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

fn rate_line(found: usize, total: usize) -> String {
    if total > 0 {
        format!("{:.1}%", found as f64 / total as f64 * 100.0)
    } else {
        "N/A".to_string()
    }
}

/// Missing model names grouped by category slug, deduped and sorted.
fn missing_by_category<'a>(
    workflows: impl Iterator<Item = &'a WorkflowReport>,
) -> BTreeMap<&'a str, Vec<&'a str>> {
    let mut catalog: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for workflow in workflows {
        for missing in workflow.missing_references() {
            catalog
                .entry(missing.reference.category.slug())
                .or_default()
                .push(missing.reference.name.as_str());
        }
    }
    for names in catalog.values_mut() {
        names.sort_unstable();
        names.dedup();
    }
    catalog
}

pub fn family_markdown(report: &FamilyReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {} Model Validation Report", report.family.display_name());
    let _ = writeln!(out, "Generated: {}", timestamp());
    out.push('\n');

    let total = report.total_models();
    let found = report.found_models();
    let missing = report.missing_models();

    out.push_str("## Summary\n");
    let _ = writeln!(out, "- **Total Workflows**: {}", report.total_workflows());
    let _ = writeln!(out, "- **Total Models**: {}", total);
    let _ = writeln!(out, "- **Found Models**: {}", found);
    let _ = writeln!(out, "- **Missing Models**: {}", missing);
    let _ = writeln!(out, "- **Success Rate**: {}", rate_line(found, total));
    out.push('\n');

    if missing > 0 {
        out.push_str("## Missing Models Catalog\n\n");
        for (category, names) in missing_by_category(report.workflows.iter()) {
            let _ = writeln!(out, "### {} models\n", category);
            for name in names {
                let _ = writeln!(out, "- {}", name);
            }
            out.push('\n');
        }
    }

    out.push_str("## Workflow Details\n\n");
    let mut ordered: Vec<&WorkflowReport> = report.workflows.iter().collect();
    ordered.sort_by(|a, b| b.missing_models.cmp(&a.missing_models));

    for workflow in ordered {
        let status = if let Some(error) = &workflow.error {
            format!("PARSE ERROR: {}", error)
        } else if workflow.missing_models == 0 {
            "COMPLETE".to_string()
        } else {
            format!("{} MISSING", workflow.missing_models)
        };
        let _ = writeln!(out, "### {} ({})", workflow.workflow_name, status);
        let _ = writeln!(out, "**File**: `{}`", workflow.workflow_file.display());
        let _ = writeln!(
            out,
            "**Models**: {}/{} found",
            workflow.found_models, workflow.total_models
        );
        out.push('\n');

        if workflow.missing_models > 0 {
            out.push_str("**Missing Models**:\n");
            for missing in workflow.missing_references() {
                let _ = writeln!(
                    out,
                    "- `{}` ({})",
                    missing.reference.name, missing.reference.category
                );
            }
            out.push('\n');
        }
    }

    out
}

pub fn comprehensive_markdown(run: &OrchestratorReport) -> String {
    let mut out = String::new();
    out.push_str("# Video Workflow Model Validation - Comprehensive Report\n");
    let _ = writeln!(out, "Generated: {}", timestamp());
    let _ = writeln!(out, "Total Execution Time: {:.1} seconds", run.total_elapsed_seconds);
    out.push('\n');

    let successful = run.outcomes.iter().filter(|o| o.is_success()).count();
    let total_workflows: usize = run.reports().map(|r| r.total_workflows()).sum();
    let total_models: usize = run.reports().map(|r| r.total_models()).sum();
    let total_found: usize = run.reports().map(|r| r.found_models()).sum();
    let total_missing: usize = run.reports().map(|r| r.missing_models()).sum();

    out.push_str("## Overall Summary\n\n");
    let _ = writeln!(out, "- **Tasks Executed**: {}/{} successful", successful, run.outcomes.len());
    let _ = writeln!(out, "- **Total Workflows Analyzed**: {}", total_workflows);
    let _ = writeln!(out, "- **Total Models Required**: {}", total_models);
    let _ = writeln!(out, "- **Models Found**: {}", total_found);
    let _ = writeln!(out, "- **Models Missing**: {}", total_missing);
    let _ = writeln!(out, "- **Overall Success Rate**: {}", rate_line(total_found, total_models));
    out.push('\n');

    out.push_str("## Task Execution Summary\n\n");
    for outcome in &run.outcomes {
        let _ = writeln!(out, "### {}", outcome.family.display_name());
        let _ = writeln!(
            out,
            "- **Status**: {}",
            if outcome.is_success() { "Success" } else { "Failed" }
        );
        let _ = writeln!(out, "- **Execution Time**: {:.1}s", outcome.elapsed_seconds);
        if let Some(report) = &outcome.report {
            let _ = writeln!(out, "- **Workflows**: {}", report.total_workflows());
            let _ = writeln!(
                out,
                "- **Models**: {}/{} ({})",
                report.found_models(),
                report.total_models(),
                rate_line(report.found_models(), report.total_models())
            );
            let _ = writeln!(out, "- **Missing Models**: {}", report.missing_models());
        }
        if let Some(path) = &outcome.report_path {
            let _ = writeln!(out, "- **Report**: `{}`", path.display());
        }
        if let Some(error) = &outcome.error {
            let _ = writeln!(out, "- **Error**: {}", error);
        }
        out.push('\n');
    }

    if total_missing > 0 {
        out.push_str("## Missing Models Catalog\n\n");
        for outcome in &run.outcomes {
            let Some(report) = &outcome.report else { continue };
            if report.missing_models() == 0 {
                continue;
            }
            let _ = writeln!(out, "### {}\n", outcome.family.display_name());
            for (category, names) in missing_by_category(report.workflows.iter()) {
                for name in names {
                    let _ = writeln!(out, "- `{}` ({})", name, category);
                }
            }
            out.push('\n');
        }
    }

    let fastest = run
        .outcomes
        .iter()
        .min_by(|a, b| a.elapsed_seconds.total_cmp(&b.elapsed_seconds));
    let slowest = run
        .outcomes
        .iter()
        .max_by(|a, b| a.elapsed_seconds.total_cmp(&b.elapsed_seconds));
    if let (Some(fastest), Some(slowest)) = (fastest, slowest) {
        out.push_str("## Performance Analysis\n\n");
        let serial: f64 = run.outcomes.iter().map(|o| o.elapsed_seconds).sum();
        let average = serial / run.outcomes.len() as f64;

        let _ = writeln!(
            out,
            "- **Fastest Task**: {} ({:.1}s)",
            fastest.family.display_name(),
            fastest.elapsed_seconds
        );
        let _ = writeln!(
            out,
            "- **Slowest Task**: {} ({:.1}s)",
            slowest.family.display_name(),
            slowest.elapsed_seconds
        );
        let _ = writeln!(out, "- **Average Task Time**: {:.1}s", average);
        if serial > 0.0 {
            let _ = writeln!(
                out,
                "- **Parallel Efficiency**: {:.1}%",
                run.total_elapsed_seconds / serial * 100.0
            );
        }
        out.push('\n');
    }

    let failed = run.outcomes.len() - successful;
    if total_missing > 0 || failed > 0 {
        out.push_str("## Recommendations\n\n");
        if total_missing > 0 {
            let _ = writeln!(out, "- {} models need to be downloaded; see the per-family reports for exact names.", total_missing);
        }
        if failed > 0 {
            let _ = writeln!(out, "- {} tasks failed to execute; review the errors above.", failed);
        }
    }

    out
}

#[derive(Serialize)]
struct FamilySummary<'a> {
    timestamp: String,
    family: &'static str,
    total_workflows: usize,
    total_models: usize,
    found_models: usize,
    missing_models: usize,
    success_rate: Option<f64>,
    workflows: &'a [WorkflowReport],
}

/// JSON mirror of the family report.
pub fn family_json(report: &FamilyReport) -> AppResult<String> {
    let summary = FamilySummary {
        timestamp: Local::now().to_rfc3339(),
        family: report.family.name(),
        total_workflows: report.total_workflows(),
        total_models: report.total_models(),
        found_models: report.found_models(),
        missing_models: report.missing_models(),
        success_rate: report.success_rate(),
        workflows: &report.workflows,
    };
    Ok(serde_json::to_string_pretty(&summary)?)
}

/// JSON mirror of a full orchestrator run.
pub fn orchestrator_json(run: &OrchestratorReport) -> AppResult<String> {
    let total_models: usize = run.reports().map(|r| r.total_models()).sum();
    let found_models: usize = run.reports().map(|r| r.found_models()).sum();
    let value = json!({
        "timestamp": Local::now().to_rfc3339(),
        "total_execution_seconds": run.total_elapsed_seconds,
        "successful_tasks": run.outcomes.iter().filter(|o| o.is_success()).count(),
        "failed_tasks": run.outcomes.iter().filter(|o| !o.is_success()).count(),
        "total_workflows": run.reports().map(|r| r.total_workflows()).sum::<usize>(),
        "total_models": total_models,
        "found_models": found_models,
        "missing_models": run.reports().map(|r| r.missing_models()).sum::<usize>(),
        "overall_success_rate": (total_models > 0)
            .then(|| found_models as f64 / total_models as f64 * 100.0),
        "tasks": &run.outcomes,
    });
    Ok(serde_json::to_string_pretty(&value)?)
}

/// Write a report file, creating parent directories as needed.
pub fn write_report(path: &Path, contents: &str) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| AppError::io(parent, e))?;
    }
    fs::write(path, contents).map_err(|e| AppError::io(path, e))?;
    tracing::info!(report = %path.display(), "report written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::family::Family;
    use crate::models::extract::{Confidence, ModelCategory, ModelReference, RefSource};
    use crate::validate::ResolvedReference;
    use std::path::PathBuf;

    fn sample_report() -> FamilyReport {
        let missing = ResolvedReference {
            reference: ModelReference {
                name: "absent.safetensors".to_string(),
                category: ModelCategory::Lora,
                node_id: "2".to_string(),
                node_type: "LoraLoader".to_string(),
                source: RefSource::InputField("lora_name".to_string()),
                strength: Some(0.5),
                confidence: Confidence::High,
            },
            exists: false,
            resolved_path: None,
        };
        let found = ResolvedReference {
            reference: ModelReference {
                name: "present.safetensors".to_string(),
                category: ModelCategory::Checkpoint,
                node_id: "1".to_string(),
                node_type: "CheckpointLoaderSimple".to_string(),
                source: RefSource::InputField("ckpt_name".to_string()),
                strength: None,
                confidence: Confidence::High,
            },
            exists: true,
            resolved_path: Some(PathBuf::from("/models/checkpoints/present.safetensors")),
        };
        FamilyReport {
            family: Family::Ltx,
            workflows: vec![WorkflowReport {
                workflow_file: PathBuf::from("/wf/ltx_basic.json"),
                workflow_name: "ltx_basic".to_string(),
                total_nodes: 2,
                total_models: 2,
                found_models: 1,
                missing_models: 1,
                references: vec![found, missing],
                unknown_node_types: Vec::new(),
                error: None,
            }],
            elapsed_seconds: 0.2,
        }
    }

    #[test]
    fn family_markdown_carries_summary_and_catalog() {
        let md = family_markdown(&sample_report());
        assert!(md.starts_with("# LTX Video Workflows Model Validation Report"));
        assert!(md.contains("- **Total Models**: 2"));
        assert!(md.contains("- **Success Rate**: 50.0%"));
        assert!(md.contains("### lora models"));
        assert!(md.contains("- absent.safetensors"));
        assert!(md.contains("### ltx_basic (1 MISSING)"));
        assert!(md.contains("- `absent.safetensors` (lora)"));
    }

    #[test]
    fn empty_report_has_na_success_rate() {
        let report = FamilyReport {
            family: Family::Generic,
            workflows: Vec::new(),
            elapsed_seconds: 0.0,
        };
        let md = family_markdown(&report);
        assert!(md.contains("- **Success Rate**: N/A"));
        assert!(!md.contains("Missing Models Catalog"));
    }

    #[test]
    fn family_json_round_trips() {
        let out = family_json(&sample_report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["family"], "ltx");
        assert_eq!(value["missing_models"], 1);
        assert_eq!(value["workflows"][0]["references"][1]["exists"], false);
        assert_eq!(value["workflows"][0]["references"][1]["category"], "lora");
    }
}

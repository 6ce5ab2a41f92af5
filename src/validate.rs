//! Per-workflow and per-family validation.
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;

use crate::config::Config;
use crate::error::AppResult;
use crate::family::{self, Family};
use crate::models::extract::{self, ModelReference};
use crate::models::ModelLocator;
use crate::workflow::{discover, Workflow};

/// One extracted reference plus the outcome of the filesystem probe.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedReference {
    #[serde(flatten)]
    pub reference: ModelReference,
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_path: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct WorkflowReport {
    pub workflow_file: PathBuf,
    pub workflow_name: String,
    pub total_nodes: usize,
    pub total_models: usize,
    pub found_models: usize,
    pub missing_models: usize,
    pub references: Vec<ResolvedReference>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unknown_node_types: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkflowReport {
    /// A workflow that could not be parsed still shows up in the report,
    /// with its error and zeroed counts.
    pub fn errored(path: &Path, message: String) -> WorkflowReport {
        WorkflowReport {
            workflow_file: path.to_path_buf(),
            workflow_name: file_stem(path),
            total_nodes: 0,
            total_models: 0,
            found_models: 0,
            missing_models: 0,
            references: Vec::new(),
            unknown_node_types: Vec::new(),
            error: Some(message),
        }
    }

    pub fn missing_references(&self) -> impl Iterator<Item = &ResolvedReference> {
        self.references.iter().filter(|r| !r.exists)
    }
}

#[derive(Debug, Serialize)]
pub struct FamilyReport {
    pub family: Family,
    pub workflows: Vec<WorkflowReport>,
    pub elapsed_seconds: f64,
}

impl FamilyReport {
    pub fn total_workflows(&self) -> usize {
        self.workflows.len()
    }
    pub fn total_models(&self) -> usize {
        self.workflows.iter().map(|w| w.total_models).sum()
    }
    pub fn found_models(&self) -> usize {
        self.workflows.iter().map(|w| w.found_models).sum()
    }
    pub fn missing_models(&self) -> usize {
        self.workflows.iter().map(|w| w.missing_models).sum()
    }
    pub fn success_rate(&self) -> Option<f64> {
        let total = self.total_models();
        (total > 0).then(|| self.found_models() as f64 / total as f64 * 100.0)
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default()
}

/// Validate one already-parsed workflow.
pub fn validate_parsed(
    path: &Path,
    workflow: &Workflow,
    family: Family,
    locator: &ModelLocator,
) -> WorkflowReport {
    let extraction = extract::extract(workflow, family);

    let mut found = 0usize;
    let references: Vec<ResolvedReference> = extraction
        .references
        .into_iter()
        .map(|reference| {
            let resolved_path = locator.resolve(&reference, family);
            let exists = resolved_path.is_some();
            if exists {
                found += 1;
            }
            ResolvedReference { reference, exists, resolved_path }
        })
        .collect();

    let total = references.len();
    WorkflowReport {
        workflow_file: path.to_path_buf(),
        workflow_name: workflow.title().map(str::to_string).unwrap_or_else(|| file_stem(path)),
        total_nodes: workflow.nodes.len(),
        total_models: total,
        found_models: found,
        missing_models: total - found,
        references,
        unknown_node_types: extraction.unknown_node_types,
        error: None,
    }
}

/// Load and validate one workflow file; parse failures become errored
/// reports rather than aborting the run.
pub fn validate_workflow(path: &Path, family: Family, locator: &ModelLocator) -> WorkflowReport {
    match Workflow::load(path) {
        Ok(workflow) => validate_parsed(path, &workflow, family, locator),
        Err(e) => {
            tracing::warn!(workflow = %path.display(), error = %e, "failed to parse workflow");
            WorkflowReport::errored(path, e.to_string())
        }
    }
}

/// Discover and validate every workflow of one family.
pub fn validate_family(family: Family, config: &Config) -> AppResult<FamilyReport> {
    let started = Instant::now();
    let locator = ModelLocator::new(config.model_roots.clone());
    let files = discover::discover(&config.comfyui_path, family)?;

    tracing::info!(
        family = family.name(),
        count = files.len(),
        "discovered workflows to validate"
    );

    let mut workflows = Vec::new();
    for file in files {
        tracing::debug!(workflow = %file.display(), "validating");
        let report = match Workflow::load(&file) {
            Ok(workflow) => {
                // The generic sweep only reports on workflows its video
                // classifier accepts; everything else belongs elsewhere.
                if family == Family::Generic && !family::is_video_workflow(&workflow) {
                    tracing::debug!(workflow = %file.display(), "not a video workflow, skipping");
                    continue;
                }
                validate_parsed(&file, &workflow, family, &locator)
            }
            Err(e) => {
                tracing::warn!(workflow = %file.display(), error = %e, "failed to parse workflow");
                WorkflowReport::errored(&file, e.to_string())
            }
        };

        if report.missing_models > 0 {
            tracing::info!(
                workflow = %file.display(),
                missing = report.missing_models,
                total = report.total_models,
                "models missing"
            );
        } else {
            tracing::info!(
                workflow = %file.display(),
                total = report.total_models,
                "all models found"
            );
        }
        workflows.push(report);
    }

    Ok(FamilyReport {
        family,
        workflows,
        elapsed_seconds: started.elapsed().as_secs_f64(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_file(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn validates_workflow_against_model_root() {
        let install = tempfile::tempdir().unwrap();
        let models = tempfile::tempdir().unwrap();

        write_file(
            &install.path().join("workflows/ltx_basic.json"),
            r#"{
                "1": {"class_type": "CheckpointLoaderSimple",
                      "inputs": {"ckpt_name": "present.safetensors"}},
                "2": {"class_type": "VAELoader",
                      "inputs": {"vae_name": "absent.safetensors"}}
            }"#,
        );
        write_file(&models.path().join("checkpoints/present.safetensors"), "");

        let locator = ModelLocator::new(vec![models.path().to_path_buf()]);
        let report = validate_workflow(
            &install.path().join("workflows/ltx_basic.json"),
            Family::Ltx,
            &locator,
        );

        assert_eq!(report.total_models, 2);
        assert_eq!(report.found_models, 1);
        assert_eq!(report.missing_models, 1);
        let missing: Vec<_> = report.missing_references().collect();
        assert_eq!(missing[0].reference.name, "absent.safetensors");
    }

    #[test]
    fn parse_failures_become_errored_reports() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{not json at all").unwrap();

        let locator = ModelLocator::new(vec![]);
        let report = validate_workflow(&path, Family::Generic, &locator);
        assert!(report.error.is_some());
        assert_eq!(report.total_models, 0);
    }

    #[test]
    fn family_run_discovers_and_aggregates() {
        let install = tempfile::tempdir().unwrap();
        let models = tempfile::tempdir().unwrap();
        write_file(
            &install.path().join("ltx_one.json"),
            r#"{"1": {"class_type": "CheckpointLoaderSimple",
                      "inputs": {"ckpt_name": "a.safetensors"}}}"#,
        );
        write_file(
            &install.path().join("ltx_two.json"),
            r#"{"1": {"class_type": "CheckpointLoaderSimple",
                      "inputs": {"ckpt_name": "b.safetensors"}}}"#,
        );
        write_file(&models.path().join("checkpoints/a.safetensors"), "");

        let config = Config {
            comfyui_path: install.path().to_path_buf(),
            model_roots: vec![models.path().to_path_buf()],
            reports_dir: install.path().join("reports"),
            comfyui_url: "http://localhost:8188".to_string(),
            max_workers: 2,
        };

        let report = validate_family(Family::Ltx, &config).unwrap();
        assert_eq!(report.total_workflows(), 2);
        assert_eq!(report.total_models(), 2);
        assert_eq!(report.found_models(), 1);
        assert_eq!(report.success_rate(), Some(50.0));
    }
}

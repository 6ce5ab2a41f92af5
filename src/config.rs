//! Env-driven configuration for the audit tools.
//!
//! Values are read from the process environment; `dotenv` is loaded on demand
//! by the binary. Defaults point at a conventional local install so the tool
//! is usable without any setup.
use std::env;
use std::path::PathBuf;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the ComfyUI installation (workflows and custom_nodes live here).
    pub comfyui_path: PathBuf,
    /// Base directories probed for model files, in precedence order.
    pub model_roots: Vec<PathBuf>,
    /// Where Markdown/JSON reports are written.
    pub reports_dir: PathBuf,
    /// Base URL of a running ComfyUI instance, for the online cross-checks.
    pub comfyui_url: String,
    /// Concurrency cap for the orchestrator fan-out.
    pub max_workers: usize,
}

impl Config {
    pub fn dotenv_load() {
        dotenv::dotenv().ok();
    }

    pub fn new() -> AppResult<Self> {
        let comfyui_path =
            PathBuf::from(env::var("COMFYUI_PATH").unwrap_or_else(|_| "./ComfyUI".to_string()));

        // MODEL_ROOTS is a comma-separated list; the install's own models/
        // directory is always probed first.
        let mut model_roots = vec![comfyui_path.join("models")];
        if let Ok(raw) = env::var("MODEL_ROOTS") {
            for part in raw.split(',') {
                let part = part.trim();
                if !part.is_empty() {
                    model_roots.push(PathBuf::from(part));
                }
            }
        }

        let reports_dir = PathBuf::from(
            env::var("REPORTS_DIR").unwrap_or_else(|_| "./validation_reports".to_string()),
        );

        let max_workers = match env::var("MAX_WORKERS") {
            Ok(v) => v
                .parse::<usize>()
                .map_err(|_| AppError::Config(format!("invalid MAX_WORKERS '{}'", v)))?,
            Err(_) => 4,
        };
        if max_workers == 0 {
            return Err(AppError::Config("MAX_WORKERS must be at least 1".to_string()));
        }

        Ok(Config {
            comfyui_path,
            model_roots,
            reports_dir,
            comfyui_url: env::var("COMFYUI_URL")
                .unwrap_or_else(|_| "http://localhost:8188".to_string()),
            max_workers,
        })
    }

    pub fn custom_nodes_dir(&self) -> PathBuf {
        self.comfyui_path.join("custom_nodes")
    }
}

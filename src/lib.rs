//! ComfyUI model audit toolkit
//!
//! Modules:
//! - `workflow`: Loading/normalizing workflow JSON and discovering files.
//! - `family`: Custom-node family profiles (LTX, Wan2, VideoHelperSuite,
//!   KJNodes, generic) with their heuristic tables.
//! - `models`: Model-reference extraction and filesystem resolution.
//! - `validate`: Per-workflow and per-family validation runs.
//! - `report`: Markdown and JSON report generation.
//! - `orchestrate`: Bounded concurrent fan-out across all families.
//! - `nodes`: Custom node pack scanning.
//! - `comfyui`: Thin client for a running ComfyUI instance.
//! - `config`: Env-driven configuration loader.
//! - `error`: Common error type and alias.
//!
//! Re-exports are provided for common types: `Config`, `ComfyUIClient`,
//! `Family`, `ModelLocator`, and `Workflow`.
pub mod comfyui;
pub mod config;
pub mod error;
pub mod family;
pub mod models;
pub mod nodes;
pub mod orchestrate;
pub mod report;
pub mod validate;
pub mod workflow;

pub use comfyui::client::ComfyUIClient;
pub use config::Config;
pub use error::{AppError, AppResult};
pub use family::Family;
pub use models::ModelLocator;
pub use workflow::Workflow;

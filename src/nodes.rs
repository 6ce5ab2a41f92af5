//! Custom node pack scanning.
//!
//! Walks `custom_nodes/` and summarizes each installed pack: size, file
//! counts, and the markers that matter when repairing an install (a
//! requirements file, an install script, a git checkout).
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::json;
use walkdir::WalkDir;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize)]
pub struct NodePack {
    pub name: String,
    pub path: PathBuf,
    pub file_count: usize,
    pub python_files: usize,
    pub size_bytes: u64,
    pub has_requirements: bool,
    pub has_install_script: bool,
    pub has_git: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Local>>,
}

impl NodePack {
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }
}

fn scan_pack(dir: &Path) -> AppResult<NodePack> {
    let mut pack = NodePack {
        name: dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        path: dir.to_path_buf(),
        file_count: 0,
        python_files: 0,
        size_bytes: 0,
        has_requirements: false,
        has_install_script: false,
        has_git: dir.join(".git").is_dir(),
        last_modified: None,
    };

    pack.last_modified = dir
        .metadata()
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Local>::from);

    for entry in WalkDir::new(dir).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        pack.file_count += 1;
        if let Ok(meta) = entry.metadata() {
            pack.size_bytes += meta.len();
        }
        match entry.file_name().to_str() {
            Some("requirements.txt") => pack.has_requirements = true,
            Some(name) => {
                if name == "install.py" {
                    pack.has_install_script = true;
                }
                if name.ends_with(".py") {
                    pack.python_files += 1;
                }
            }
            None => {}
        }
    }

    Ok(pack)
}

/// Scan every pack under `custom_nodes/`, sorted by name. Dot-directories
/// are skipped.
pub fn scan(custom_nodes_dir: &Path) -> AppResult<Vec<NodePack>> {
    if !custom_nodes_dir.is_dir() {
        return Err(AppError::Config(format!(
            "custom nodes directory not found: {}",
            custom_nodes_dir.display()
        )));
    }

    let mut packs = Vec::new();
    let entries = std::fs::read_dir(custom_nodes_dir)
        .map_err(|e| AppError::io(custom_nodes_dir, e))?;
    for entry in entries.filter_map(Result::ok) {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else { continue };
        if !path.is_dir() || name.starts_with('.') {
            continue;
        }
        tracing::debug!(pack = name, "scanning custom node pack");
        packs.push(scan_pack(&path)?);
    }

    packs.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(packs)
}

/// JSON export matching the shape the monitoring scripts consume.
pub fn export_json(custom_nodes_dir: &Path, packs: &[NodePack]) -> AppResult<String> {
    let total_size_mb: f64 = packs.iter().map(NodePack::size_mb).sum();
    let value = json!({
        "timestamp": Local::now().to_rfc3339(),
        "custom_nodes_path": custom_nodes_dir,
        "nodes": packs,
        "summary": {
            "total_nodes": packs.len(),
            "total_size_mb": total_size_mb,
            "git_nodes": packs.iter().filter(|p| p.has_git).count(),
            "nodes_with_requirements": packs.iter().filter(|p| p.has_requirements).count(),
        },
    });
    Ok(serde_json::to_string_pretty(&value)?)
}

/// Human summary printed by `wfaudit scan-nodes`.
pub fn render_summary(packs: &[NodePack]) -> String {
    use std::fmt::Write as _;

    let mut out = String::new();
    let total_size_mb: f64 = packs.iter().map(NodePack::size_mb).sum();
    let _ = writeln!(out, "Custom node packs: {}", packs.len());
    let _ = writeln!(out, "Total size: {:.1} MB", total_size_mb);
    let _ = writeln!(
        out,
        "Git checkouts: {}",
        packs.iter().filter(|p| p.has_git).count()
    );
    let _ = writeln!(
        out,
        "With requirements: {}",
        packs.iter().filter(|p| p.has_requirements).count()
    );
    out.push('\n');
    for pack in packs {
        let _ = writeln!(
            out,
            "{}  {:.1} MB, {} files ({} python){}{}",
            pack.name,
            pack.size_mb(),
            pack.file_count,
            pack.python_files,
            if pack.has_requirements { ", requirements" } else { "" },
            if pack.has_install_script { ", install script" } else { "" },
        );
    }
    out
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
    fn scans_packs_with_markers() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("ComfyUI-KJNodes/nodes.py"), "print()");
        write_file(&dir.path().join("ComfyUI-KJNodes/requirements.txt"), "torch");
        fs::create_dir_all(dir.path().join("ComfyUI-KJNodes/.git")).unwrap();
        write_file(&dir.path().join("rgthree-comfy/__init__.py"), "");
        write_file(&dir.path().join(".disabled/old.py"), "");

        let packs = scan(dir.path()).unwrap();
        assert_eq!(packs.len(), 2);

        let kj = &packs[0];
        assert_eq!(kj.name, "ComfyUI-KJNodes");
        assert!(kj.has_requirements);
        assert!(kj.has_git);
        assert_eq!(kj.python_files, 1);
        // requirements.txt counts as a file but not a python file
        assert_eq!(kj.file_count, 2);

        assert_eq!(packs[1].name, "rgthree-comfy");
        assert!(!packs[1].has_requirements);
    }

    #[test]
    fn missing_directory_is_an_error() {
        assert!(scan(Path::new("/definitely/not/here")).is_err());
    }

    #[test]
    fn json_export_carries_totals() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("pack-a/a.py"), "");
        let packs = scan(dir.path()).unwrap();
        let out = export_json(dir.path(), &packs).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["summary"]["total_nodes"], 1);
        assert_eq!(value["nodes"][0]["name"], "pack-a");
    }
}

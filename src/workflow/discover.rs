//! Workflow file discovery across a ComfyUI install.
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::error::{AppError, AppResult};
use crate::family::{claimed_by_named_family, Family};

fn glob_set(patterns: &[&str]) -> AppResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| AppError::Config(format!("bad glob '{}': {}", pattern, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| AppError::Config(format!("glob set: {}", e)))
}

/// Find a family's workflow files under the install root, sorted and deduped.
pub fn discover(comfyui_root: &Path, family: Family) -> AppResult<Vec<PathBuf>> {
    let set = glob_set(family.discovery_globs())?;

    let mut found: Vec<PathBuf> = Vec::new();
    let walker = WalkDir::new(comfyui_root).into_iter().filter_entry(|entry| {
        // Dot-directories (.git and friends) are never workflow sources.
        // Depth 0 is the root itself, which may legitimately be hidden.
        entry.depth() == 0
            || !entry
                .file_name()
                .to_str()
                .map(|n| n.starts_with('.') && n.len() > 1)
                .unwrap_or(false)
    });

    for entry in walker.filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry.path().strip_prefix(comfyui_root).unwrap_or(entry.path());
        if !set.is_match(rel) {
            continue;
        }
        // The generic sweep leaves files the named families already claim.
        if family == Family::Generic {
            let name = entry.file_name().to_string_lossy();
            if claimed_by_named_family(&name) {
                continue;
            }
        }
        found.push(entry.path().to_path_buf());
    }

    found.sort();
    found.dedup();
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"{}").unwrap();
    }

    #[test]
    fn finds_family_workflows_recursively() {
        let root = tempfile::tempdir().unwrap();
        touch(&root.path().join("workflows/ltx_image_to_video.json"));
        touch(&root.path().join("user/default/LTX_base.json"));
        touch(&root.path().join("workflows/wan2_t2v.json"));

        let found = discover(root.path(), Family::Ltx).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["LTX_base.json", "ltx_image_to_video.json"]);
    }

    #[test]
    fn generic_sweep_excludes_claimed_files() {
        let root = tempfile::tempdir().unwrap();
        touch(&root.path().join("workflows/upscale_pipeline.json"));
        touch(&root.path().join("workflows/ltx_base.json"));
        touch(&root.path().join("workflows/video_combine_demo.json"));

        let found = discover(root.path(), Family::Generic).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].ends_with("workflows/upscale_pipeline.json"));
    }

    #[test]
    fn skips_dot_directories() {
        let root = tempfile::tempdir().unwrap();
        touch(&root.path().join(".git/objects/ltx_cached.json"));
        touch(&root.path().join("ltx_real.json"));

        let found = discover(root.path(), Family::Ltx).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].ends_with("ltx_real.json"));
    }
}

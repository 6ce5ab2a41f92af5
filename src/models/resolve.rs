//! Filesystem resolution of model references.
//!
//! For each reference an ordered candidate list is built: the family's
//! preferred directories, the category's canonical directories (current and
//! legacy spellings), then the generic `<root>/<slug>/`, `<root>/<slug>s/`,
//! `<root>/` fallbacks — across every configured root in order. Exact paths
//! are probed first, extensionless candidates get an extension pass, and a
//! bounded recursive sweep of the big three directories is the last resort.
//! First hit wins; the order is deterministic.
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::family::Family;
use crate::models::extract::{ModelCategory, ModelReference};
use crate::models::MODEL_EXTENSIONS;

/// Directories probed for categories the extractor could not pin down.
const CANONICAL_DIRS: &[&str] = &[
    "checkpoints",
    "loras",
    "vae",
    "clip",
    "controlnet",
    "upscale_models",
    "unet",
    "diffusion_models",
    "motion_modules",
];

/// Depth cap for the last-resort recursive sweep.
const DEEP_SEARCH_DEPTH: usize = 4;

fn category_dirs(category: ModelCategory) -> &'static [&'static str] {
    match category {
        ModelCategory::Checkpoint => {
            &["checkpoints", "Stable-diffusion", "diffusion_models", "base_model"]
        }
        ModelCategory::Lora => &["loras", "Lora"],
        ModelCategory::Vae => &["vae", "VAE"],
        ModelCategory::Clip => &["clip"],
        ModelCategory::TextEncoder => &["text_encoders", "clip"],
        ModelCategory::ControlNet => &["controlnet", "ControlNet"],
        ModelCategory::Unet => &["unet", "diffusion_models"],
        ModelCategory::DiffusionModel => &["diffusion_models", "checkpoints", "unet"],
        ModelCategory::Transformer => &["transformers", "diffusion_models"],
        ModelCategory::Upscale => &["upscale_models", "ESRGAN", "SwinIR", "Real-ESRGAN"],
        ModelCategory::StyleModel => &["style_models"],
        ModelCategory::MotionModule => {
            &["motion_modules", "animatediff_models", "Motion_Module"]
        }
        ModelCategory::IpAdapter => &["ipadapter"],
        ModelCategory::Interpolation => &["interpolation", "frame_interpolation"],
        ModelCategory::Gligen => &["gligen"],
        ModelCategory::Hypernetwork => &["hypernetworks"],
        ModelCategory::Other(_) | ModelCategory::Unknown => CANONICAL_DIRS,
    }
}

#[derive(Debug, Clone)]
pub struct ModelLocator {
    roots: Vec<PathBuf>,
}

impl ModelLocator {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        ModelLocator { roots }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Resolve a reference to the first existing path, or None.
    pub fn resolve(&self, reference: &ModelReference, family: Family) -> Option<PathBuf> {
        let candidates = self.candidate_paths(reference, family);

        // Exact matches first, then extension variants; mirroring the order
        // keeps "foo" and "foo.safetensors" resolving to the same file.
        if let Some(hit) = candidates.iter().find(|p| p.exists()) {
            tracing::trace!(model = %reference.name, path = %hit.display(), "resolved exact");
            return Some(hit.clone());
        }

        for candidate in &candidates {
            if candidate.extension().is_some() {
                continue;
            }
            for ext in MODEL_EXTENSIONS {
                let with_ext = candidate.with_extension(&ext[1..]);
                if with_ext.exists() {
                    tracing::trace!(
                        model = %reference.name,
                        path = %with_ext.display(),
                        "resolved with extension"
                    );
                    return Some(with_ext);
                }
            }
        }

        self.deep_search(&reference.name)
    }

    /// The full deterministic probe list for a reference, in order.
    pub fn candidate_paths(&self, reference: &ModelReference, family: Family) -> Vec<PathBuf> {
        let name = Path::new(&reference.name);
        let slug = reference.category.slug();

        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        let mut push = |path: PathBuf| {
            if seen.insert(path.clone()) {
                candidates.push(path);
            }
        };

        for root in &self.roots {
            for dir in family.preferred_subdirs(reference.category) {
                push(root.join(dir).join(name));
            }
            for dir in category_dirs(reference.category) {
                push(root.join(dir).join(name));
            }
            push(root.join(slug).join(name));
            push(root.join(format!("{slug}s")).join(name));
            push(root.join(name));
        }

        candidates
    }

    /// Bounded recursive sweep of the directories that hold the bulk of any
    /// install, for files stored under unexpected nesting.
    fn deep_search(&self, name: &str) -> Option<PathBuf> {
        let needle = Path::new(name);
        for root in &self.roots {
            for dir in ["checkpoints", "loras", "vae"] {
                let base = root.join(dir);
                if !base.is_dir() {
                    continue;
                }
                for entry in WalkDir::new(&base)
                    .max_depth(DEEP_SEARCH_DEPTH)
                    .into_iter()
                    .filter_map(Result::ok)
                {
                    if entry.file_type().is_file() && entry.path().ends_with(needle) {
                        tracing::trace!(
                            model = name,
                            path = %entry.path().display(),
                            "resolved via deep search"
                        );
                        return Some(entry.path().to_path_buf());
                    }
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::extract::{Confidence, RefSource};
    use std::fs;

    fn reference(name: &str, category: ModelCategory) -> ModelReference {
        ModelReference {
            name: name.to_string(),
            category,
            node_id: "1".to_string(),
            node_type: "TestLoader".to_string(),
            source: RefSource::InputField("model_name".to_string()),
            strength: None,
            confidence: Confidence::High,
        }
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn finds_exact_match_in_category_dir() {
        let root = tempfile::tempdir().unwrap();
        let target = root.path().join("checkpoints/sd15.safetensors");
        touch(&target);

        let locator = ModelLocator::new(vec![root.path().to_path_buf()]);
        let hit = locator.resolve(
            &reference("sd15.safetensors", ModelCategory::Checkpoint),
            Family::Generic,
        );
        assert_eq!(hit, Some(target));
    }

    #[test]
    fn extension_pass_finds_extensionless_references() {
        let root = tempfile::tempdir().unwrap();
        let target = root.path().join("loras/detail_tweaker.safetensors");
        touch(&target);

        let locator = ModelLocator::new(vec![root.path().to_path_buf()]);
        let hit = locator.resolve(&reference("detail_tweaker", ModelCategory::Lora), Family::Ltx);
        assert_eq!(hit, Some(target));
    }

    #[test]
    fn family_preferred_dirs_win_over_canonical_ones() {
        let root = tempfile::tempdir().unwrap();
        let preferred = root.path().join("wan2/vae/wan_vae.safetensors");
        let canonical = root.path().join("vae/wan_vae.safetensors");
        touch(&preferred);
        touch(&canonical);

        let locator = ModelLocator::new(vec![root.path().to_path_buf()]);
        let hit = locator.resolve(&reference("wan_vae.safetensors", ModelCategory::Vae), Family::Wan2);
        assert_eq!(hit, Some(preferred));
    }

    #[test]
    fn earlier_roots_take_precedence() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let in_first = first.path().join("vae/shared.safetensors");
        let in_second = second.path().join("vae/shared.safetensors");
        touch(&in_first);
        touch(&in_second);

        let locator =
            ModelLocator::new(vec![first.path().to_path_buf(), second.path().to_path_buf()]);
        let hit = locator.resolve(&reference("shared.safetensors", ModelCategory::Vae), Family::Generic);
        assert_eq!(hit, Some(in_first));
    }

    #[test]
    fn unknown_category_probes_all_canonical_dirs() {
        let root = tempfile::tempdir().unwrap();
        let target = root.path().join("controlnet/mystery.pth");
        touch(&target);

        let locator = ModelLocator::new(vec![root.path().to_path_buf()]);
        let hit = locator.resolve(&reference("mystery.pth", ModelCategory::Unknown), Family::Generic);
        assert_eq!(hit, Some(target));
    }

    #[test]
    fn deep_search_finds_nested_files() {
        let root = tempfile::tempdir().unwrap();
        let target = root.path().join("checkpoints/sdxl/refiner/sd_xl_refiner.safetensors");
        touch(&target);

        let locator = ModelLocator::new(vec![root.path().to_path_buf()]);
        let hit = locator.resolve(
            &reference("sd_xl_refiner.safetensors", ModelCategory::Vae),
            Family::Generic,
        );
        assert_eq!(hit, Some(target));
    }

    #[test]
    fn missing_models_resolve_to_none() {
        let root = tempfile::tempdir().unwrap();
        let locator = ModelLocator::new(vec![root.path().to_path_buf()]);
        assert_eq!(
            locator.resolve(&reference("nope.safetensors", ModelCategory::Checkpoint), Family::Generic),
            None
        );
    }

    #[test]
    fn candidate_order_is_deterministic() {
        let locator = ModelLocator::new(vec![PathBuf::from("/a"), PathBuf::from("/b")]);
        let candidates = locator
            .candidate_paths(&reference("m.safetensors", ModelCategory::Lora), Family::Generic);
        assert_eq!(candidates[0], PathBuf::from("/a/loras/m.safetensors"));
        assert_eq!(candidates[1], PathBuf::from("/a/Lora/m.safetensors"));
        assert!(candidates.iter().position(|p| p.starts_with("/b")).unwrap() > 2);
    }
}

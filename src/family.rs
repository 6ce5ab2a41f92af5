//! Custom-node family profiles.
//!
//! Each family used to get its own validator script; the differences were a
//! discovery glob list, a node-type → model-field table, and a handful of
//! preferred probe directories. Those three tables are what a profile is.
use serde::Serialize;

use crate::models::extract::ModelCategory;
use crate::workflow::Workflow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    Ltx,
    Wan2,
    VideoHelper,
    KjNodes,
    Generic,
}

/// Orchestrator scheduling hint; higher priorities are queued first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// One "this input field names a model" rule.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub field: &'static str,
    pub category: ModelCategory,
    pub strength_field: Option<&'static str>,
}

const fn rule(field: &'static str, category: ModelCategory) -> FieldRule {
    FieldRule { field, category, strength_field: None }
}

const fn rule_with_strength(
    field: &'static str,
    category: ModelCategory,
    strength_field: &'static str,
) -> FieldRule {
    FieldRule { field, category, strength_field: Some(strength_field) }
}

impl Family {
    pub const ALL: [Family; 5] =
        [Family::Ltx, Family::Wan2, Family::VideoHelper, Family::KjNodes, Family::Generic];

    pub fn name(&self) -> &'static str {
        match self {
            Family::Ltx => "ltx",
            Family::Wan2 => "wan2",
            Family::VideoHelper => "video-helper",
            Family::KjNodes => "kj-nodes",
            Family::Generic => "generic",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Family::Ltx => "LTX Video Workflows",
            Family::Wan2 => "Wan2 Video Workflows",
            Family::VideoHelper => "VideoHelperSuite Workflows",
            Family::KjNodes => "KJNodes Workflows",
            Family::Generic => "Generic Video Workflows",
        }
    }

    pub fn from_name(name: &str) -> Option<Family> {
        Family::ALL.iter().copied().find(|f| f.name() == name)
    }

    pub fn priority(&self) -> Priority {
        match self {
            Family::Ltx | Family::Wan2 => Priority::High,
            Family::VideoHelper | Family::KjNodes => Priority::Medium,
            Family::Generic => Priority::Low,
        }
    }

    /// Whether extraction also scans the vague field names (`model`, `path`,
    /// ...) and tracks unknown node types. Only the generic sweep does.
    pub fn deep_scan(&self) -> bool {
        matches!(self, Family::Generic)
    }

    /// Glob patterns used to find this family's workflow files, relative to
    /// the ComfyUI root.
    pub fn discovery_globs(&self) -> &'static [&'static str] {
        match self {
            Family::Ltx => &[
                "**/ltx_*.json",
                "**/LTX_*.json",
                "**/ltx-video*.json",
                "**/LTX_Video*.json",
            ],
            Family::Wan2 => &[
                "**/wan2_*.json",
                "**/Wan2_*.json",
                "**/wan-video*.json",
                "**/Wan_Video*.json",
                "**/wan2.1_*.json",
                "**/Wan2.1_*.json",
            ],
            Family::VideoHelper => &[
                "**/video_*.json",
                "**/Video_*.json",
                "**/vh_*.json",
                "**/VH_*.json",
                "**/videohelper*.json",
                "**/VideoHelper*.json",
                "custom_nodes/ComfyUI-VideoHelperSuite/**/workflows/*.json",
                "custom_nodes/comfyui-videohelpersuite/tests/*.json",
                "custom_nodes/comfyui-videohelpersuite/video_formats/*.json",
            ],
            Family::KjNodes => &[
                "**/kj_*.json",
                "**/KJ_*.json",
                "**/kjnodes_*.json",
                "**/KJNodes_*.json",
                "**/morph_*.json",
                "**/Morph_*.json",
                "**/animation_*.json",
                "**/Animation_*.json",
                "custom_nodes/ComfyUI-KJNodes/**/workflows/*.json",
                "custom_nodes/comfyui-kjnodes/example_workflows/*.json",
            ],
            Family::Generic => &[
                "workflows/**/*.json",
                "custom_nodes/*/workflows/*.json",
                "custom_nodes/*/example_workflows/*.json",
                "*.json",
            ],
        }
    }

    /// Field rules for one node type: family-specific substring rules first,
    /// then the general loader table shared by every family.
    pub fn rules_for(&self, class_type: &str) -> Vec<FieldRule> {
        let mut rules = Vec::new();
        match self {
            Family::Ltx => ltx_rules(class_type, &mut rules),
            Family::Wan2 => wan2_rules(class_type, &mut rules),
            Family::VideoHelper => video_helper_rules(class_type, &mut rules),
            Family::KjNodes => kj_rules(class_type, &mut rules),
            Family::Generic => {}
        }
        rules.extend(general_loader_rules(class_type));
        rules
    }

    /// Family-preferred probe directories for a category, tried before the
    /// canonical category directories.
    pub fn preferred_subdirs(&self, category: ModelCategory) -> &'static [&'static str] {
        match self {
            Family::Wan2 => match category {
                ModelCategory::Transformer => {
                    &["wan2/transformers", "wan2.1/transformers", "wan2/video_models"]
                }
                ModelCategory::Vae => &["wan2/vae", "wan2.1/vae"],
                ModelCategory::Clip | ModelCategory::TextEncoder => {
                    &["wan2/clip", "wan2.1/clip"]
                }
                ModelCategory::ControlNet => &["wan2/controlnet", "wan2.1/controlnet"],
                ModelCategory::Lora => &["wan2/loras", "wan2.1/loras"],
                ModelCategory::DiffusionModel => {
                    &["wan2/video_models", "wan2.1/video_models", "diffusion_models"]
                }
                ModelCategory::Other("camera_control") => {
                    &["wan2/camera_control", "wan2.1/camera_control"]
                }
                ModelCategory::Other("fun_control") => {
                    &["wan2/fun_control", "wan2.1/fun_control"]
                }
                _ => &[],
            },
            Family::VideoHelper => match category {
                ModelCategory::Interpolation => {
                    &["video_models/interpolation", "frame_interpolation", "RIFE", "FILM"]
                }
                ModelCategory::Upscale => &["video_models/enhancement", "video_upscale"],
                ModelCategory::MotionModule => &["animatediff_models", "motion_modules"],
                ModelCategory::Other("video_codec") => {
                    &["video_models/codecs", "video_codecs"]
                }
                _ => &[],
            },
            Family::KjNodes => match category {
                ModelCategory::MotionModule => {
                    &["animatediff_models", "motion_modules", "animation_models", "Motion_Module"]
                }
                ModelCategory::Other("animation") => {
                    &["animation_models", "animatediff_models", "motion_modules"]
                }
                ModelCategory::Other("morph") => {
                    &["morph_models", "face_models", "shape_models"]
                }
                ModelCategory::Other("face") => {
                    &["face_models", "face_analysis", "landmark_models"]
                }
                ModelCategory::Other("audio") => {
                    &["audio_models", "beat_detection", "rhythm_analysis"]
                }
                _ => &[],
            },
            Family::Ltx | Family::Generic => &[],
        }
    }
}

fn ltx_rules(class_type: &str, rules: &mut Vec<FieldRule>) {
    let lower = class_type.to_ascii_lowercase();
    if !lower.contains("ltx") {
        return;
    }
    if lower.contains("loader") {
        rules.push(rule("model_name", ModelCategory::Checkpoint));
        rules.push(rule("vae_name", ModelCategory::Vae));
        rules.push(rule("clip_name", ModelCategory::Clip));
    }
    if lower.contains("lora") {
        rules.push(rule_with_strength("lora_name", ModelCategory::Lora, "strength_model"));
    }
    if lower.contains("control") {
        rules.push(rule("control_net_name", ModelCategory::ControlNet));
        rules.push(rule("model_name", ModelCategory::ControlNet));
    }
}

fn wan2_rules(class_type: &str, rules: &mut Vec<FieldRule>) {
    let lower = class_type.to_ascii_lowercase();
    if lower.contains("wan2") || lower.contains("wanvideo") {
        if lower.contains("loader") {
            rules.push(rule("model_name", ModelCategory::Transformer));
            rules.push(rule("vae_name", ModelCategory::Vae));
            rules.push(rule("text_encoder_name", ModelCategory::TextEncoder));
        }
        if lower.contains("lora") {
            rules.push(rule_with_strength("lora_name", ModelCategory::Lora, "strength"));
            rules.push(rule_with_strength("model_name", ModelCategory::Lora, "strength"));
        }
        if lower.contains("control") {
            rules.push(rule("control_net_name", ModelCategory::ControlNet));
            rules.push(rule("model_name", ModelCategory::ControlNet));
        }
        if lower.contains("t2v") || lower.contains("texttovideo") {
            rules.push(rule("model_name", ModelCategory::DiffusionModel));
            rules.push(rule("transformer_name", ModelCategory::Transformer));
        }
        if lower.contains("i2v") || lower.contains("imagetovideo") {
            rules.push(rule("model_name", ModelCategory::DiffusionModel));
            rules.push(rule("transformer_name", ModelCategory::Transformer));
        }
    }
    if lower.contains("camera") && lower.contains("control") {
        rules.push(rule("camera_model_name", ModelCategory::Other("camera_control")));
        rules.push(rule("model_name", ModelCategory::Other("camera_control")));
    }
    if lower.contains("funcontrol") {
        rules.push(rule("control_model_name", ModelCategory::Other("fun_control")));
        rules.push(rule("model_name", ModelCategory::Other("fun_control")));
    }
}

fn is_video_helper_node(class_type: &str) -> bool {
    class_type.starts_with("VHS_")
        || class_type.starts_with("vhs_")
        || class_type.to_ascii_lowercase().contains("video")
}

fn video_helper_rules(class_type: &str, rules: &mut Vec<FieldRule>) {
    if !is_video_helper_node(class_type) {
        return;
    }
    if class_type.contains("LoadVideo") || class_type.contains("VideoLoad") {
        rules.push(rule("interpolation_model", ModelCategory::Interpolation));
        rules.push(rule("frame_interpolation", ModelCategory::Interpolation));
    }
    if class_type.contains("VideoEnhance") || class_type.contains("VideoUpscale") {
        rules.push(rule("enhancement_model", ModelCategory::Upscale));
        rules.push(rule("upscale_model", ModelCategory::Upscale));
        rules.push(rule("super_resolution_model", ModelCategory::Upscale));
    }
    if class_type.contains("VideoFormat") || class_type.contains("VideoConvert") {
        rules.push(rule("encoder_model", ModelCategory::Other("video_codec")));
        rules.push(rule("decoder_model", ModelCategory::Other("video_codec")));
    }
    if class_type.contains("VideoInfo") || class_type.contains("VideoAnalyze") {
        rules.push(rule("analysis_model", ModelCategory::Other("video_analysis")));
    }
}

fn is_kj_specialized_node(class_type: &str) -> bool {
    const MARKERS: &[&str] = &[
        "KJ_", "Animate", "Animation", "Keyframe", "Motion", "Interpolate", "Blend",
        "Transition", "Morph", "FaceMorph", "ShapeMorph", "AudioReactive", "Rhythm", "Beat",
        "Sync",
    ];
    MARKERS.iter().any(|m| class_type.contains(m))
}

fn kj_rules(class_type: &str, rules: &mut Vec<FieldRule>) {
    if !is_kj_specialized_node(class_type) {
        return;
    }
    if class_type.contains("Animate") || class_type.contains("Animation") {
        rules.push(rule("motion_model", ModelCategory::Other("animation")));
        rules.push(rule("animation_model", ModelCategory::Other("animation")));
        rules.push(rule("keyframe_model", ModelCategory::Other("animation")));
    }
    if class_type.contains("Morph") || class_type.contains("Blend") {
        rules.push(rule("morph_model", ModelCategory::Other("morph")));
        rules.push(rule("blend_model", ModelCategory::Other("morph")));
        rules.push(rule("shape_model", ModelCategory::Other("morph")));
    }
    if class_type.contains("Face") || class_type.contains("Feature") {
        rules.push(rule("face_model", ModelCategory::Other("face")));
        rules.push(rule("feature_model", ModelCategory::Other("face")));
        rules.push(rule("landmark_model", ModelCategory::Other("face")));
    }
    if class_type.contains("Audio") || class_type.contains("Beat") || class_type.contains("Rhythm")
    {
        rules.push(rule("audio_model", ModelCategory::Other("audio")));
        rules.push(rule("beat_detector", ModelCategory::Other("audio")));
        rules.push(rule("rhythm_model", ModelCategory::Other("audio")));
    }
}

/// Loader nodes every family understands.
fn general_loader_rules(class_type: &str) -> Vec<FieldRule> {
    match class_type {
        "CheckpointLoaderSimple" | "CheckpointLoader" => {
            vec![rule("ckpt_name", ModelCategory::Checkpoint)]
        }
        "VAELoader" => vec![rule("vae_name", ModelCategory::Vae)],
        "LoraLoader" | "LoraLoaderModelOnly" => {
            vec![rule_with_strength("lora_name", ModelCategory::Lora, "strength_model")]
        }
        "ControlNetLoader" => vec![rule("control_net_name", ModelCategory::ControlNet)],
        "UpscaleModelLoader" => vec![rule("model_name", ModelCategory::Upscale)],
        "StyleModelLoader" => vec![rule("model_name", ModelCategory::StyleModel)],
        "GLIGENLoader" => vec![rule("model_name", ModelCategory::Gligen)],
        "HypernetworkLoader" => vec![rule("model_name", ModelCategory::Hypernetwork)],
        "UNETLoader" => vec![rule("unet_name", ModelCategory::Unet)],
        "DiffusionLoader" => vec![rule("model_name", ModelCategory::DiffusionModel)],
        "AnimateDiffLoader" | "MotionModuleLoader" => {
            vec![rule("model_name", ModelCategory::MotionModule)]
        }
        "IPAdapterModelLoader" => vec![rule("model_name", ModelCategory::IpAdapter)],
        "RIFEModelLoader" | "FILMModelLoader" | "IFNetModelLoader" => {
            vec![rule("model_name", ModelCategory::Interpolation)]
        }
        "RealESRGANLoader" | "ESRGANLoader" | "SwinIRLoader" => {
            vec![rule("model_name", ModelCategory::Upscale)]
        }
        "FaceAnalysisLoader" | "FaceMorphLoader" | "ShapePredictorLoader" => {
            vec![rule("model_name", ModelCategory::Other("face"))]
        }
        "AudioModelLoader" | "BeatDetectorLoader" | "RhythmAnalyzerLoader" => {
            vec![rule("model_name", ModelCategory::Other("audio"))]
        }
        _ => Vec::new(),
    }
}

/// Filename prefixes the named families claim; generic discovery skips them.
const NAMED_FAMILY_PREFIXES: &[&str] = &[
    "ltx_", "ltx-video", "wan2", "wan-video", "wan_video", "video_", "vh_", "videohelper",
    "kj_", "kjnodes_", "morph_", "animation_",
];

pub fn claimed_by_named_family(file_name: &str) -> bool {
    let lower = file_name.to_ascii_lowercase();
    NAMED_FAMILY_PREFIXES.iter().any(|p| lower.contains(p))
}

const VIDEO_NODE_MARKERS: &[&str] = &[
    "video", "animation", "motion", "temporal", "sequence", "frame", "interpolate", "upscale",
    "enhance", "morph", "blend", "transition", "stablevideo", "svd", "zeroscope", "modelscope",
];

/// Video classifier for uncategorized workflows: a workflow counts as video
/// when at least two independent indicators fire.
pub fn video_indicators(workflow: &Workflow) -> Vec<String> {
    let mut indicators = Vec::new();

    for node in workflow.nodes.values() {
        let lower = node.class_type.to_ascii_lowercase();
        if VIDEO_NODE_MARKERS.iter().any(|m| lower.contains(m)) {
            indicators.push(format!("Node: {}", node.class_type));
        }
    }

    if let Some(title) = workflow.title() {
        let lower = title.to_ascii_lowercase();
        if VIDEO_NODE_MARKERS.iter().any(|m| lower.contains(m)) {
            indicators.push(format!("Title: {title}"));
        }
    }

    // Dimensions above 1024 in either axis usually mean video frames.
    let oversized = workflow.nodes.values().any(|node| {
        ["width", "height"].iter().any(|key| {
            node.inputs
                .get(*key)
                .and_then(|v| v.as_f64())
                .map(|v| v > 1024.0)
                .unwrap_or(false)
        })
    });
    if oversized {
        indicators.push("Video resolution settings detected".to_string());
    }

    indicators
}

pub fn is_video_workflow(workflow: &Workflow) -> bool {
    video_indicators(workflow).len() >= 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ltx_loader_rules_match_case_insensitively() {
        let rules = Family::Ltx.rules_for("LTXVideoLoader");
        let fields: Vec<&str> = rules.iter().map(|r| r.field).collect();
        assert_eq!(fields, vec!["model_name", "vae_name", "clip_name"]);
    }

    #[test]
    fn wan2_t2v_nodes_map_to_diffusion_models() {
        let rules = Family::Wan2.rules_for("Wan2_T2V_Sampler");
        assert!(rules
            .iter()
            .any(|r| r.field == "model_name" && r.category == ModelCategory::DiffusionModel));
    }

    #[test]
    fn general_loaders_apply_to_every_family() {
        for family in Family::ALL {
            let rules = family.rules_for("UpscaleModelLoader");
            assert!(
                rules.iter().any(|r| r.category == ModelCategory::Upscale),
                "{} missing upscale rule",
                family.name()
            );
        }
    }

    #[test]
    fn kj_audio_nodes_get_audio_rules() {
        let rules = Family::KjNodes.rules_for("KJ_AudioReactiveScheduler");
        assert!(rules.iter().any(|r| r.field == "beat_detector"));
    }

    #[test]
    fn generic_discovery_skips_named_family_files() {
        assert!(claimed_by_named_family("ltx_image_to_video.json"));
        assert!(claimed_by_named_family("Wan2.1_VACE.json"));
        assert!(!claimed_by_named_family("upscale_pipeline.json"));
    }

    #[test]
    fn video_classifier_needs_two_indicators() {
        let single = Workflow::from_value(&json!({
            "1": {"class_type": "VideoCombine", "inputs": {}}
        }))
        .unwrap();
        assert!(!is_video_workflow(&single));

        let double = Workflow::from_value(&json!({
            "1": {"class_type": "VideoCombine", "inputs": {}},
            "2": {"class_type": "EmptyLatentImage", "inputs": {"width": 1280, "height": 720}}
        }))
        .unwrap();
        assert!(is_video_workflow(&double));
    }
}

//! Model-reference extraction from normalized workflows.
//!
//! Node inputs are matched against the active family's field rules, then
//! against a generic set of well-known loader fields, and finally the UI
//! format's positional `widgets_values` are scanned for strings that carry a
//! model file extension. Extraction is purely syntactic; it never touches
//! the filesystem.
use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::family::Family;
use crate::models::is_model_filename;
use crate::workflow::{Node, Workflow};

/// Guessed kind of a referenced model, used to pick probe directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelCategory {
    Checkpoint,
    Lora,
    Vae,
    Clip,
    TextEncoder,
    ControlNet,
    Unet,
    DiffusionModel,
    Transformer,
    Upscale,
    StyleModel,
    MotionModule,
    IpAdapter,
    Interpolation,
    Gligen,
    Hypernetwork,
    /// Family-specific kinds with no canonical directory of their own.
    Other(&'static str),
    /// Matched only a generic field name; category could not be guessed.
    Unknown,
}

impl ModelCategory {
    pub fn slug(&self) -> &'static str {
        match self {
            ModelCategory::Checkpoint => "checkpoint",
            ModelCategory::Lora => "lora",
            ModelCategory::Vae => "vae",
            ModelCategory::Clip => "clip",
            ModelCategory::TextEncoder => "text_encoder",
            ModelCategory::ControlNet => "controlnet",
            ModelCategory::Unet => "unet",
            ModelCategory::DiffusionModel => "diffusion_model",
            ModelCategory::Transformer => "transformer",
            ModelCategory::Upscale => "upscale",
            ModelCategory::StyleModel => "style_model",
            ModelCategory::MotionModule => "motion_module",
            ModelCategory::IpAdapter => "ip_adapter",
            ModelCategory::Interpolation => "interpolation",
            ModelCategory::Gligen => "gligen",
            ModelCategory::Hypernetwork => "hypernetwork",
            ModelCategory::Other(name) => name,
            ModelCategory::Unknown => "unknown",
        }
    }
}

impl Serialize for ModelCategory {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.slug())
    }
}

impl std::fmt::Display for ModelCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}

/// How sure the extractor is that the value names a model file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// Where in the node the reference came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefSource {
    InputField(String),
    WidgetValue(usize),
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelReference {
    pub name: String,
    pub category: ModelCategory,
    pub node_id: String,
    pub node_type: String,
    pub source: RefSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strength: Option<f64>,
    pub confidence: Confidence,
}

/// Everything extraction learned about one workflow.
#[derive(Debug, Default)]
pub struct Extraction {
    pub references: Vec<ModelReference>,
    /// Node types not on the known-non-model list; reported so new loader
    /// nodes surface instead of silently extracting nothing.
    pub unknown_node_types: Vec<String>,
}

/// Well-known loader fields that are a model name wherever they appear.
const HIGH_CONFIDENCE_FIELDS: &[(&str, ModelCategory)] = &[
    ("ckpt_name", ModelCategory::Checkpoint),
    ("model_name", ModelCategory::DiffusionModel),
    ("vae_name", ModelCategory::Vae),
    ("lora_name", ModelCategory::Lora),
    ("control_net_name", ModelCategory::ControlNet),
    ("unet_name", ModelCategory::Unet),
    ("text_encoder_name", ModelCategory::TextEncoder),
    ("transformer_name", ModelCategory::Transformer),
    ("upscale_model_name", ModelCategory::Upscale),
    ("style_model_name", ModelCategory::StyleModel),
];

// Vague field names only the generic deep scan looks at.
const MEDIUM_CONFIDENCE_FIELDS: &[&str] = &["model", "name", "filename", "path"];
const LOW_CONFIDENCE_FIELDS: &[&str] = &["file", "file_name", "weight", "weights"];

/// Node types known to never reference a model file directly.
const KNOWN_NON_MODEL_NODES: &[&str] = &[
    "CLIPTextEncode",
    "CLIPSetLastLayer",
    "ConditioningAverage",
    "ConditioningCombine",
    "ConditioningConcat",
    "ConditioningSetArea",
    "ConditioningSetAreaPercentage",
    "ConditioningSetMask",
    "ControlNetApply",
    "ControlNetApplyAdvanced",
    "SaveImage",
    "PreviewImage",
    "LoadImage",
    "ImageScale",
    "ImageUpscale",
    "ImageCrop",
    "ImagePad",
    "ImageBlend",
    "ImageComposite",
    "LatentUpscale",
    "LatentScale",
    "VAEEncode",
    "VAEDecode",
    "EmptyLatentImage",
    "KSampler",
    "KSamplerAdvanced",
    "RandomNoise",
    "AddNoise",
    "CLIPVisionEncode",
    "StyleModelApply",
    "IPAdapterApply",
    "ModelMerge",
    "ModelMergeSimple",
];

pub fn extract(workflow: &Workflow, family: Family) -> Extraction {
    let mut out = Extraction::default();

    for (node_id, node) in &workflow.nodes {
        let mut matched_fields: HashSet<&str> = HashSet::new();

        for rule in family.rules_for(&node.class_type) {
            if !matched_fields.insert(rule.field) {
                continue;
            }
            if let Some(reference) =
                reference_from_field(node_id, node, rule.field, rule.category, Confidence::High)
            {
                let mut reference = reference;
                reference.strength = rule
                    .strength_field
                    .and_then(|f| node.inputs.get(f))
                    .and_then(Value::as_f64);
                out.references.push(reference);
            }
        }

        for &(field, category) in HIGH_CONFIDENCE_FIELDS {
            if !matched_fields.insert(field) {
                continue;
            }
            if let Some(reference) =
                reference_from_field(node_id, node, field, category, Confidence::High)
            {
                out.references.push(reference);
            }
        }

        // Vague fields drown named families in false positives, so only the
        // generic sweep looks at them.
        if family.deep_scan() {
            for (fields, confidence) in [
                (MEDIUM_CONFIDENCE_FIELDS, Confidence::Medium),
                (LOW_CONFIDENCE_FIELDS, Confidence::Low),
            ] {
                for &field in fields {
                    if !matched_fields.insert(field) {
                        continue;
                    }
                    if let Some(reference) = reference_from_field(
                        node_id,
                        node,
                        field,
                        ModelCategory::Unknown,
                        confidence,
                    ) {
                        out.references.push(reference);
                    }
                }
            }

            if !node.class_type.is_empty()
                && !KNOWN_NON_MODEL_NODES.contains(&node.class_type.as_str())
                && !out.unknown_node_types.contains(&node.class_type)
            {
                out.unknown_node_types.push(node.class_type.clone());
            }
        }

        // UI exports keep the chosen filenames in positional widget slots.
        for (index, value) in node.widgets_values.iter().enumerate() {
            let Some(text) = value.as_str() else { continue };
            if !is_model_filename(text) || is_obvious_non_model(text) {
                continue;
            }
            out.references.push(ModelReference {
                name: text.to_string(),
                category: guess_widget_category(&node.class_type, text),
                node_id: node_id.clone(),
                node_type: node.class_type.clone(),
                source: RefSource::WidgetValue(index),
                strength: None,
                confidence: Confidence::Medium,
            });
        }
    }

    out
}

fn reference_from_field(
    node_id: &str,
    node: &Node,
    field: &str,
    category: ModelCategory,
    confidence: Confidence,
) -> Option<ModelReference> {
    let value = node.inputs.get(field)?;
    let name = value_as_name(value)?;
    if name.is_empty() || name == "none" || name == "None" {
        return None;
    }
    if is_obvious_non_model(&name) {
        return None;
    }
    Some(ModelReference {
        name,
        category,
        node_id: node_id.to_string(),
        node_type: node.class_type.clone(),
        source: RefSource::InputField(field.to_string()),
        strength: None,
        confidence,
    })
}

/// A string input is a name; a `[node_id, slot]` link array is a connection.
/// Only string-first arrays are treated as names.
fn value_as_name(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => match items.first() {
            Some(Value::String(s)) => Some(s.clone()),
            _ => None,
        },
        _ => None,
    }
}

/// Category guess for widget-sourced filenames, from node type first and the
/// filename itself second.
fn guess_widget_category(node_type: &str, filename: &str) -> ModelCategory {
    let node = node_type.to_ascii_lowercase();
    let file = filename.to_ascii_lowercase();

    if node.contains("lora") || file.contains("lora") {
        ModelCategory::Lora
    } else if node.contains("vae") {
        ModelCategory::Vae
    } else if node.contains("controlnet") {
        ModelCategory::ControlNet
    } else if node.contains("upscale") || file.contains("esrgan") {
        ModelCategory::Upscale
    } else if node.contains("clip") {
        ModelCategory::Clip
    } else if node.contains("unet") {
        ModelCategory::Unet
    } else if node.contains("checkpoint") || file.contains("ltx") || file.contains("wan") {
        ModelCategory::Checkpoint
    } else {
        ModelCategory::Unknown
    }
}

/// Values that look like settings rather than filenames: bare numbers, UUIDs,
/// booleans, color codes, resolutions.
pub fn is_obvious_non_model(value: &str) -> bool {
    static FILTERS: OnceLock<Vec<Regex>> = OnceLock::new();
    let filters = FILTERS.get_or_init(|| {
        [
            r"^\d+$",
            r"^[a-fA-F0-9-]{36}$",
            r"^[a-zA-Z]$",
            r"^(?i)(true|false|on|off|yes|no)$",
            r"^[0-9.]+$",
            r"^#[0-9a-fA-F]+$",
            r"^\d+x\d+$",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("static filter pattern"))
        .collect()
    });
    let value = value.trim();
    filters.iter().any(|re| re.is_match(value))
}

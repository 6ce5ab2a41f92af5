//! Loading and normalization of ComfyUI workflow files.
//!
//! The same graph shows up on disk in a few shapes: the API ("prompt")
//! format keyed by node id, the UI export with a top-level `nodes` array and
//! `widgets_values`, and either of those wrapped under a `"prompt"` key.
//! Everything downstream works on the normalized [`Workflow`], so the shape
//! sniffing lives here and nowhere else.
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphFormat {
    /// Object keyed by node id, each value carrying `class_type`/`inputs`.
    Api,
    /// UI export: top-level `nodes` array with `id`, `type`, `widgets_values`.
    Ui,
    /// Either of the above nested under a top-level `"prompt"` key.
    Wrapped,
}

/// One step of the execution graph, shape-normalized.
#[derive(Debug, Clone, Default)]
pub struct Node {
    pub class_type: String,
    /// Named inputs. For UI-format nodes each entry is the raw input record
    /// keyed by its `name`, since the UI export keeps values elsewhere.
    pub inputs: Map<String, Value>,
    /// Positional widget values (UI format only; empty otherwise).
    pub widgets_values: Vec<Value>,
}

#[derive(Debug, Clone)]
pub struct Workflow {
    pub nodes: BTreeMap<String, Node>,
    pub format: GraphFormat,
    title: Option<String>,
}

impl Workflow {
    /// Read and normalize a workflow file.
    ///
    /// Strict JSON is tried first; `json5` is the fallback because a few
    /// custom nodes serialize NaN, which `serde_json` rejects.
    pub fn load(path: &Path) -> AppResult<Workflow> {
        let data = fs::read_to_string(path).map_err(|e| AppError::io(path, e))?;
        let value: Value = match serde_json::from_str(&data) {
            Ok(v) => v,
            Err(first) => json5::from_str(&data).map_err(|_| AppError::Workflow {
                path: path.to_path_buf(),
                message: first.to_string(),
            })?,
        };
        Workflow::from_value(&value).map_err(|e| match e {
            AppError::Workflow { message, .. } => AppError::Workflow {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })
    }

    /// Normalize an already-parsed JSON document into a graph.
    pub fn from_value(value: &Value) -> AppResult<Workflow> {
        // Unwrap {"prompt": ...} envelopes produced by /prompt payload dumps.
        if let Some(inner) = value.get("prompt").filter(|v| !v.is_null()) {
            let mut wf = Workflow::from_value(inner)?;
            wf.format = GraphFormat::Wrapped;
            if wf.title.is_none() {
                wf.title = extract_title(value);
            }
            return Ok(wf);
        }

        let title = extract_title(value);

        if let Some(nodes) = value.get("nodes") {
            return match nodes {
                Value::Object(map) => Ok(Workflow {
                    nodes: nodes_from_map(map),
                    format: GraphFormat::Api,
                    title,
                }),
                Value::Array(list) => Ok(Workflow {
                    nodes: nodes_from_list(list),
                    format: GraphFormat::Ui,
                    title,
                }),
                _ => Err(shape_error("'nodes' is neither an object nor an array")),
            };
        }

        // Bare API graph: top-level object whose values carry class_type.
        if let Some(map) = value.as_object() {
            if is_probably_graph(map) {
                return Ok(Workflow {
                    nodes: nodes_from_map(map),
                    format: GraphFormat::Api,
                    title,
                });
            }
            // Last resort: some exports bury the node list under an
            // arbitrary key. Accept the first array of id-bearing records.
            for v in map.values() {
                if let Value::Array(list) = v {
                    if list
                        .first()
                        .and_then(|n| n.as_object())
                        .map(|n| n.contains_key("id"))
                        .unwrap_or(false)
                    {
                        return Ok(Workflow {
                            nodes: nodes_from_list(list),
                            format: GraphFormat::Ui,
                            title,
                        });
                    }
                }
            }
            return Err(shape_error("no recognizable node list"));
        }

        // A top-level array is an API-format node list with implicit ids.
        if let Some(list) = value.as_array() {
            let mut nodes = BTreeMap::new();
            for (i, entry) in list.iter().enumerate() {
                if let Some(obj) = entry.as_object() {
                    nodes.insert(i.to_string(), node_from_record(obj));
                }
            }
            return Ok(Workflow { nodes, format: GraphFormat::Api, title });
        }

        Err(shape_error("document is not an object or array"))
    }

    /// Title from `extra.workflow.title`, when the export kept it.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn shape_error(message: &str) -> AppError {
    AppError::Workflow { path: Default::default(), message: message.to_string() }
}

fn extract_title(value: &Value) -> Option<String> {
    value
        .get("extra")
        .and_then(|v| v.get("workflow"))
        .and_then(|v| v.get("title"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

fn is_probably_graph(map: &Map<String, Value>) -> bool {
    map.values().any(|v| {
        v.as_object()
            .and_then(|n| n.get("class_type"))
            .and_then(|ct| ct.as_str())
            .is_some()
    })
}

fn nodes_from_map(map: &Map<String, Value>) -> BTreeMap<String, Node> {
    let mut nodes = BTreeMap::new();
    for (id, entry) in map {
        if let Some(record) = entry.as_object() {
            nodes.insert(id.clone(), node_from_record(record));
        }
    }
    nodes
}

fn nodes_from_list(list: &[Value]) -> BTreeMap<String, Node> {
    let mut nodes = BTreeMap::new();
    for entry in list {
        let Some(record) = entry.as_object() else { continue };
        // UI records without an id can't be addressed by links; skip them.
        let Some(id) = record.get("id").map(id_to_string) else { continue };
        nodes.insert(id, node_from_record(record));
    }
    nodes
}

fn id_to_string(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn node_from_record(record: &Map<String, Value>) -> Node {
    let class_type = record
        .get("class_type")
        .or_else(|| record.get("type"))
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    let mut inputs = Map::new();
    match record.get("inputs") {
        Some(Value::Object(map)) => inputs = map.clone(),
        // UI export: inputs is an array of records; key them by name so
        // field lookups still work.
        Some(Value::Array(list)) => {
            for entry in list {
                if let Some(obj) = entry.as_object() {
                    if let Some(name) = obj.get("name").and_then(|v| v.as_str()) {
                        inputs.insert(name.to_string(), entry.clone());
                    }
                }
            }
        }
        _ => {}
    }

    let widgets_values = record
        .get("widgets_values")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();

    Node { class_type, inputs, widgets_values }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_api_format() {
        let doc = json!({
            "3": {"class_type": "KSampler", "inputs": {"seed": 5, "model": ["4", 0]}},
            "4": {"class_type": "CheckpointLoaderSimple", "inputs": {"ckpt_name": "sd_xl_base_1.0.safetensors"}}
        });
        let wf = Workflow::from_value(&doc).unwrap();
        assert_eq!(wf.format, GraphFormat::Api);
        assert_eq!(wf.nodes.len(), 2);
        assert_eq!(wf.nodes["4"].class_type, "CheckpointLoaderSimple");
        assert_eq!(
            wf.nodes["4"].inputs["ckpt_name"],
            json!("sd_xl_base_1.0.safetensors")
        );
    }

    #[test]
    fn normalizes_ui_format() {
        let doc = json!({
            "nodes": [
                {"id": 1, "type": "VHS_VideoCombine", "widgets_values": ["h264", 24]},
                {"id": 2, "type": "LoadImage", "inputs": [{"name": "image", "link": 7}]},
                {"no_id": true}
            ],
            "extra": {"workflow": {"title": "My Video"}}
        });
        let wf = Workflow::from_value(&doc).unwrap();
        assert_eq!(wf.format, GraphFormat::Ui);
        assert_eq!(wf.nodes.len(), 2);
        assert_eq!(wf.title(), Some("My Video"));
        assert_eq!(wf.nodes["1"].widgets_values.len(), 2);
        assert!(wf.nodes["2"].inputs.contains_key("image"));
    }

    #[test]
    fn unwraps_prompt_envelope() {
        let doc = json!({
            "prompt": {
                "1": {"class_type": "VAELoader", "inputs": {"vae_name": "sdxl_vae.safetensors"}}
            }
        });
        let wf = Workflow::from_value(&doc).unwrap();
        assert_eq!(wf.format, GraphFormat::Wrapped);
        assert_eq!(wf.nodes["1"].class_type, "VAELoader");
    }

    #[test]
    fn accepts_nodes_object_variant() {
        let doc = json!({
            "nodes": {
                "7": {"class_type": "LoraLoader", "inputs": {"lora_name": "detail.safetensors"}}
            }
        });
        let wf = Workflow::from_value(&doc).unwrap();
        assert_eq!(wf.format, GraphFormat::Api);
        assert_eq!(wf.nodes["7"].class_type, "LoraLoader");
    }

    #[test]
    fn rejects_unrecognizable_shapes() {
        assert!(Workflow::from_value(&json!({"settings": {"theme": "dark"}})).is_err());
        assert!(Workflow::from_value(&json!(42)).is_err());
    }

    #[test]
    fn empty_graph_is_valid() {
        let wf = Workflow::from_value(&json!({"nodes": []})).unwrap();
        assert!(wf.is_empty());
    }
}

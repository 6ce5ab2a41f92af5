//! Thin HTTP client for a locally running ComfyUI instance.
//!
//! - `get_model_categories` lists `/models`.
//! - `get_models_in_category` lists `/models/<category>`.
//! - `get_installed_custom_nodes` queries the Manager's `/customnode/installed`.
//! - `ping` checks `/system_stats` for connectivity.
//!
//! Everything here is a cross-check for the offline audit; the tool works
//! without a running instance.
use reqwest::Client;
use serde_json::Value;

use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct ComfyUIClient {
    client: Client,
    base_url: String,
}

impl ComfyUIClient {
    pub fn new(base_url: String) -> Self {
        let base = base_url.trim_end_matches('/').to_string();
        ComfyUIClient { client: Client::new(), base_url: base }
    }

    async fn get_json(&self, path: &str) -> AppResult<Value> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(url = %url, "querying comfyui");
        let response = self.client.get(&url).send().await.map_err(AppError::HttpClient)?;

        if response.status().is_success() {
            response.json().await.map_err(AppError::HttpClient)
        } else {
            Err(AppError::ComfyUI(format!(
                "request to {} failed: {}",
                url,
                response.status()
            )))
        }
    }

    /// Connectivity check against `/system_stats`.
    pub async fn ping(&self) -> AppResult<()> {
        self.get_json("/system_stats").await.map(|_| ())
    }

    /// List model categories available from the `/models` endpoint.
    pub async fn get_model_categories(&self) -> AppResult<Value> {
        self.get_json("/models").await
    }

    /// List models within a category from `/models/<category>`.
    pub async fn get_models_in_category(&self, category: &str) -> AppResult<Value> {
        // Basic validation: allow alphanumeric, underscore, and hyphen only
        if !category.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            return Err(AppError::ComfyUI("Invalid model category".to_string()));
        }
        self.get_json(&format!("/models/{}", category)).await
    }

    /// Installed custom node packs, as reported by ComfyUI-Manager.
    pub async fn get_installed_custom_nodes(&self) -> AppResult<Value> {
        self.get_json("/customnode/installed").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let client = ComfyUIClient::new("http://localhost:8188/".to_string());
        assert_eq!(client.base_url, "http://localhost:8188");
    }

    #[tokio::test]
    async fn category_names_are_validated() {
        let client = ComfyUIClient::new("http://localhost:8188".to_string());
        let err = client.get_models_in_category("../etc").await.unwrap_err();
        assert!(matches!(err, AppError::ComfyUI(_)));
    }
}

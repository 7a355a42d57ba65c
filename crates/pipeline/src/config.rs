use std::path::PathBuf;

use styler_core::manifest::{
    WeightsLayout, DEFAULT_CUSTOM_NODES_PATH, DEFAULT_MANIFEST_PATH, DEFAULT_MODELS_PATH,
    DEFAULT_WEIGHTS_BASE_URL,
};

pub const DEFAULT_COMFYUI_URL: &str = "http://127.0.0.1:8188";
pub const DEFAULT_INPUT_DIR: &str = "/tmp/inputs";
pub const DEFAULT_OUTPUT_DIR: &str = "/tmp/outputs";
pub const DEFAULT_TEMP_DIR: &str = "ComfyUI/temp";
pub const DEFAULT_BASE_TEMPLATE: &str = "workflows/style-transfer-api.json";
pub const DEFAULT_STRUCTURE_TEMPLATE: &str = "workflows/style-transfer-with-structure-api.json";

/// Pipeline configuration loaded from environment variables.
///
/// All fields have defaults matching the stock ComfyUI layout.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// ComfyUI HTTP base URL.
    pub comfyui_url: String,
    /// ComfyUI WebSocket base URL.
    pub comfyui_ws_url: String,
    /// Where staged input images are written; ComfyUI reads from here.
    pub input_dir: PathBuf,
    /// Where ComfyUI writes its outputs.
    pub output_dir: PathBuf,
    /// ComfyUI's scratch directory, wiped between predictions.
    pub temp_dir: PathBuf,
    pub base_template: PathBuf,
    pub structure_template: PathBuf,
    pub manifest_path: PathBuf,
    pub weights: WeightsLayout,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            comfyui_url: DEFAULT_COMFYUI_URL.to_string(),
            comfyui_ws_url: ws_url_for(DEFAULT_COMFYUI_URL),
            input_dir: DEFAULT_INPUT_DIR.into(),
            output_dir: DEFAULT_OUTPUT_DIR.into(),
            temp_dir: DEFAULT_TEMP_DIR.into(),
            base_template: DEFAULT_BASE_TEMPLATE.into(),
            structure_template: DEFAULT_STRUCTURE_TEMPLATE.into(),
            manifest_path: DEFAULT_MANIFEST_PATH.into(),
            weights: WeightsLayout::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default                                      |
    /// |------------------------------|----------------------------------------------|
    /// | `COMFYUI_URL`                | `http://127.0.0.1:8188`                      |
    /// | `COMFYUI_WS_URL`             | `COMFYUI_URL` with a `ws` scheme             |
    /// | `INPUT_DIR`                  | `/tmp/inputs`                                |
    /// | `OUTPUT_DIR`                 | `/tmp/outputs`                               |
    /// | `COMFYUI_TEMP_DIR`           | `ComfyUI/temp`                               |
    /// | `BASE_WORKFLOW_PATH`         | `workflows/style-transfer-api.json`          |
    /// | `STRUCTURE_WORKFLOW_PATH`    | `workflows/style-transfer-with-structure-api.json` |
    /// | `WEIGHTS_MANIFEST_PATH`      | `weights.json`                               |
    /// | `WEIGHTS_BASE_URL`           | Replicate weights CDN                        |
    /// | `COMFYUI_MODELS_PATH`        | `ComfyUI/models`                             |
    /// | `COMFYUI_CUSTOM_NODES_PATH`  | `ComfyUI/custom_nodes`                       |
    pub fn from_env() -> Self {
        let comfyui_url = env_or("COMFYUI_URL", DEFAULT_COMFYUI_URL);
        let comfyui_ws_url =
            std::env::var("COMFYUI_WS_URL").unwrap_or_else(|_| ws_url_for(&comfyui_url));

        Self {
            comfyui_ws_url,
            comfyui_url,
            input_dir: env_or("INPUT_DIR", DEFAULT_INPUT_DIR).into(),
            output_dir: env_or("OUTPUT_DIR", DEFAULT_OUTPUT_DIR).into(),
            temp_dir: env_or("COMFYUI_TEMP_DIR", DEFAULT_TEMP_DIR).into(),
            base_template: env_or("BASE_WORKFLOW_PATH", DEFAULT_BASE_TEMPLATE).into(),
            structure_template: env_or("STRUCTURE_WORKFLOW_PATH", DEFAULT_STRUCTURE_TEMPLATE)
                .into(),
            manifest_path: env_or("WEIGHTS_MANIFEST_PATH", DEFAULT_MANIFEST_PATH).into(),
            weights: WeightsLayout {
                base_url: env_or("WEIGHTS_BASE_URL", DEFAULT_WEIGHTS_BASE_URL),
                models_path: env_or("COMFYUI_MODELS_PATH", DEFAULT_MODELS_PATH),
                custom_nodes_path: env_or("COMFYUI_CUSTOM_NODES_PATH", DEFAULT_CUSTOM_NODES_PATH),
            },
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

/// Swap an `http(s)://` scheme for `ws(s)://`.
pub fn ws_url_for(http_url: &str) -> String {
    if let Some(rest) = http_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = http_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        http_url.to_string()
    }
}

use std::path::PathBuf;

use crate::constants;

/// Runtime settings for the provider clients and the web server.
///
/// `Settings::default()` reads the env-backed constants; tests build their
/// own with struct update syntax to point at mock servers.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base URL of the OpenAI-compatible API, without a trailing slash.
    pub api_base: String,
    pub chat_model: String,
    pub prompt_model: String,
    pub image_model: String,
    pub image_size: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub search_endpoint: String,
    pub search_api_key: String,
    pub credential_file: PathBuf,
    pub templates_dir: PathBuf,
    pub static_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base: constants::OPENAI_API_BASE.clone(),
            chat_model: constants::CHAT_MODEL.clone(),
            prompt_model: constants::PROMPT_MODEL.clone(),
            image_model: constants::IMAGE_MODEL.clone(),
            image_size: constants::IMAGE_SIZE.clone(),
            max_tokens: constants::MAX_TOKENS,
            temperature: constants::TEMPERATURE,
            search_endpoint: constants::SERPAPI_URL.clone(),
            search_api_key: constants::SERPAPI_KEY.clone(),
            credential_file: PathBuf::from(constants::CREDENTIAL_FILE.as_str()),
            templates_dir: PathBuf::from(constants::TEMPLATES_DIR.as_str()),
            static_dir: PathBuf::from(constants::STATIC_DIR.as_str()),
        }
    }
}

impl Settings {
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_credential_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.credential_file = path.into();
        self
    }
}

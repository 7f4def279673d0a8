// Defaults for provider endpoints, models, and local paths, overridable from
// the environment (or a .env file loaded by main).

use std::env;

lazy_static::lazy_static! {
    pub static ref OPENAI_API_BASE: String = env::var("OPENAI_API_BASE")
        .ok()
        .map(|value| value.trim().trim_end_matches('/').to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| "https://api.openai.com/v1".to_string());
    pub static ref CHAT_MODEL: String = env::var("CHATBOT_CHAT_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
    // Used for the Korean-to-English image prompt rewrite.
    pub static ref PROMPT_MODEL: String = env::var("CHATBOT_PROMPT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
    pub static ref IMAGE_MODEL: String = env::var("CHATBOT_IMAGE_MODEL").unwrap_or_else(|_| "dall-e-3".to_string());
    pub static ref IMAGE_SIZE: String = env::var("CHATBOT_IMAGE_SIZE").unwrap_or_else(|_| "1024x1024".to_string());
    pub static ref SERPAPI_URL: String = env::var("SERPAPI_URL").unwrap_or_else(|_| "https://serpapi.com/search.json".to_string());
    pub static ref SERPAPI_KEY: String = env::var("SERPAPI_KEY").unwrap_or_else(|_| "demo-key".to_string());
    pub static ref CREDENTIAL_FILE: String = env::var("CHATBOT_CREDENTIAL_FILE").unwrap_or_else(|_| ".chatbot-ui/credential.json".to_string());
    pub static ref TEMPLATES_DIR: String = env::var("CHATBOT_TEMPLATES_DIR").unwrap_or_else(|_| "templates".to_string());
    pub static ref STATIC_DIR: String = env::var("CHATBOT_STATIC_DIR").unwrap_or_else(|_| "static".to_string());
}

pub const MAX_TOKENS: u32 = 2000;
pub const TEMPERATURE: f32 = 0.7;
pub const PROMPT_MAX_TOKENS: u32 = 200;

/// Key under which the API key is stored in the credential file.
pub const CREDENTIAL_KEY: &str = "openai_api_key";

pub const WELCOME_TURN_ID: &str = "welcome";
pub const WELCOME_MESSAGE: &str =
    "안녕하세요! API 키로 인증되었습니다. GPT-4o 모델을 사용하여 도와드리겠습니다. 무엇을 도와드릴까요?";

pub const CHAT_FAILURE_MESSAGE: &str =
    "죄송합니다. 현재 API 연결에 문제가 있습니다. API 키를 확인해주세요.";
pub const SEARCH_FAILURE_MESSAGE: &str =
    "죄송합니다. 현재 검색 기능에 문제가 있습니다. API 키를 확인해주세요.";
pub const EMPTY_REPLY_MESSAGE: &str = "죄송합니다. 응답을 생성할 수 없습니다.";
pub const NO_RESPONSE_MESSAGE: &str = "응답을 생성할 수 없습니다.";
pub const UNPROCESSED_SEARCH_MESSAGE: &str = "검색 결과를 처리할 수 없습니다.";
pub const INVALID_KEY_MESSAGE: &str = "유효하지 않은 API 키입니다. 다시 확인해주세요.";

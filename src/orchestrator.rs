//! Turns a user message into an assistant reply.
//!
//! Two paths exist. The normal chat path offers both tools and answers search
//! requests with a placeholder; search mode offers only `web_search`, runs the
//! real search, and asks the model for a cited answer in a second round-trip.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info, instrument, warn};

use crate::config::Settings;
use crate::constants::{
    CHAT_FAILURE_MESSAGE, NO_RESPONSE_MESSAGE, SEARCH_FAILURE_MESSAGE, UNPROCESSED_SEARCH_MESSAGE,
};
use crate::conversation::{outgoing_history, ChatTurn, Reply, ToolOutcome};
use crate::credential::Credential;
use crate::error::ChatError;
use crate::image::{context_lines, ImageGenerator, IMAGE_TOOL};
use crate::provider::{CompletionRequest, ProviderClient, ToolDefinition, WireMessage};
use crate::search::WebSearch;

pub const WEB_SEARCH_TOOL: &str = "web_search";

const CHAT_SYSTEM_PROMPT: &str = "당신은 도움이 되고 친근한 AI 어시스턴트입니다.

**중요한 규칙:**
1. 사용자가 최신 정보나 실시간 데이터가 필요한 질문을 하면 반드시 web_search 함수를 사용하세요.
2. 사용자가 \"그려줘\", \"그려\", \"그림\", \"이미지 생성\", \"만들어줘\", \"그려봐\" 등 이미지 생성과 관련된 요청을 하면 반드시 image_generation 함수를 사용하세요.
3. 이미지 생성 시에는 대화의 전체 맥락을 conversation_context에 포함하세요.
4. 함수 호출 후 결과를 사용자에게 친근하게 설명해주세요.";

const SEARCH_SYSTEM_PROMPT: &str = "당신은 도움이 되고 친근한 AI 어시스턴트입니다. 사용자가 최신 정보나 실시간 데이터가 필요한 질문을 하면 web_search 함수를 사용해서 웹 검색을 수행하세요.

⚠️ 중요: 검색 결과를 사용할 때 반드시 다음 형식을 지켜주세요:

1. 각 정보 뒤에 반드시 [출처: 사이트명](URL) 형식으로 출처 표기
2. 답변 시작에 \"최신 검색 결과에 따르면\" 또는 \"웹 검색 결과\" 명시
3. 답변 마지막에 반드시 \"📍 검색 시간: [현재시간]\" 추가

예시 형식:
\"최신 검색 결과에 따르면, 신풍역 근처 맛집은 다음과 같습니다:

1. 스타벅스 신풍역점 - 커피 전문점 [출처: 네이버 지도](https://map.naver.com/...)
2. 순흥골 신풍역 - 한식 전문점 [출처: 다음 지도](https://map.daum.net/...)

📍 검색 시간: 2025-01-29 01:27\"

이 형식을 절대 지켜주세요. 출처 표기 없이는 절대 답변하지 마세요.";

/// Words that mark a request as wanting a picture, matched case-insensitively.
const IMAGE_KEYWORDS: &[&str] = &[
    "그려줘", "그려", "그림", "이미지", "만들어줘", "그려봐", "draw", "create", "generate", "image",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    #[default]
    Normal,
    Search,
}

impl ChatMode {
    pub fn from_search_flag(search: bool) -> Self {
        if search {
            ChatMode::Search
        } else {
            ChatMode::Normal
        }
    }

    pub fn failure_message(self) -> &'static str {
        match self {
            ChatMode::Normal => CHAT_FAILURE_MESSAGE,
            ChatMode::Search => SEARCH_FAILURE_MESSAGE,
        }
    }
}

pub fn wants_image(text: &str) -> bool {
    let lowered = text.to_lowercase();
    IMAGE_KEYWORDS.iter().any(|keyword| lowered.contains(keyword))
}

/// Stand-in summary for a `web_search` call made outside search mode.
pub fn placeholder_search_summary(query: &str) -> String {
    format!(
        "🔍 **검색 결과: {}**\n\n일반 대화 모드에서는 실시간 웹 검색 기능이 제한됩니다. 실제 검색 결과를 보려면 검색 모드를 켜고 다시 질문해주세요.",
        query
    )
}

fn web_search_tool(description: &'static str, query_description: &'static str) -> ToolDefinition {
    ToolDefinition::function(
        WEB_SEARCH_TOOL,
        description,
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": query_description }
            },
            "required": ["query"]
        }),
    )
}

fn image_generation_tool() -> ToolDefinition {
    ToolDefinition::function(
        IMAGE_TOOL,
        "Generate an image based on a text prompt with conversation context",
        json!({
            "type": "object",
            "properties": {
                "prompt": { "type": "string", "description": "The image generation prompt" },
                "conversation_context": {
                    "type": "string",
                    "description": "The conversation context to consider"
                }
            },
            "required": ["prompt", "conversation_context"]
        }),
    )
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
}

#[derive(Debug, Deserialize)]
struct ImageArgs {
    prompt: String,
    #[serde(default)]
    conversation_context: String,
}

fn with_system_prompt(prompt: &str, conversation: Vec<WireMessage>) -> Vec<WireMessage> {
    let mut messages = Vec::with_capacity(conversation.len() + 1);
    messages.push(WireMessage::system(prompt));
    messages.extend(conversation);
    messages
}

#[derive(Debug, Clone)]
pub struct Orchestrator {
    provider: ProviderClient,
    search: WebSearch,
    images: ImageGenerator,
    chat_model: String,
    max_tokens: u32,
    temperature: f32,
}

impl Orchestrator {
    pub fn new(settings: &Settings) -> Self {
        let provider = ProviderClient::new(settings.api_base.clone());
        Self {
            search: WebSearch::new(settings.search_endpoint.clone(), settings.search_api_key.clone()),
            images: ImageGenerator::new(provider.clone(), settings),
            provider,
            chat_model: settings.chat_model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
        }
    }

    pub fn provider(&self) -> &ProviderClient {
        &self.provider
    }

    pub fn images(&self) -> &ImageGenerator {
        &self.images
    }

    fn completion(&self, messages: Vec<WireMessage>) -> CompletionRequest {
        CompletionRequest::new(&self.chat_model, messages, self.max_tokens, self.temperature)
    }

    /// Produces the assistant reply for `text`, given the turns so far.
    ///
    /// Never fails: any error along the way becomes the mode's generic error
    /// message with nothing else attached.
    #[instrument(skip(self, history, text, credential), fields(turns = history.len()))]
    pub async fn converse(
        &self,
        history: &[ChatTurn],
        text: &str,
        credential: &Credential,
        mode: ChatMode,
    ) -> Reply {
        let result = match mode {
            ChatMode::Normal => self.try_converse(history, text, credential).await,
            ChatMode::Search => {
                let mut conversation = outgoing_history(history);
                conversation.push(WireMessage::user(text));
                self.try_search_answer(conversation, credential)
                    .await
                    .map(Reply::text)
            }
        };

        match result {
            Ok(reply) => reply,
            Err(e) => {
                error!(error = %e, ?mode, "Conversation turn failed");
                Reply::text(mode.failure_message())
            }
        }
    }

    /// Normal chat path: both tools offered, search answered with a
    /// placeholder, plus the keyword fallback for images.
    pub async fn try_converse(
        &self,
        history: &[ChatTurn],
        text: &str,
        credential: &Credential,
    ) -> Result<Reply, ChatError> {
        let mut conversation = outgoing_history(history);
        conversation.push(WireMessage::user(text));
        let context = context_lines(&conversation);

        let request = self
            .completion(with_system_prompt(CHAT_SYSTEM_PROMPT, conversation))
            .with_tools(vec![
                web_search_tool("Search the web for current information", "The search query"),
                image_generation_tool(),
            ]);
        let message = self.provider.complete(credential, &request).await?;

        let mut reply = Reply::default();
        for call in message.tool_calls() {
            match call.function.name.as_str() {
                WEB_SEARCH_TOOL => {
                    let args: SearchArgs = call.parse_arguments()?;
                    info!(query = %args.query, "Model requested web search outside search mode");
                    reply.absorb(ToolOutcome::Search(placeholder_search_summary(&args.query)));
                }
                IMAGE_TOOL => {
                    let args: ImageArgs = call.parse_arguments()?;
                    debug!(model_context = %args.conversation_context, "Model requested image generation");
                    let url = self.images.generate(credential, &args.prompt, &context).await?;
                    reply.absorb(ToolOutcome::Image(url));
                }
                other => warn!(tool = other, "Ignoring call to unknown tool"),
            }
        }

        reply.text = message.content.unwrap_or_default();

        if reply.image_url.is_none() && wants_image(text) {
            info!("Image keyword found without a generated image, generating directly");
            let url = self.images.generate(credential, text, &context).await?;
            reply.absorb(ToolOutcome::Image(url));
        }

        Ok(reply)
    }

    /// Search path: one completion offering `web_search`; if the model calls
    /// it, the search runs and a second completion writes the cited answer.
    ///
    /// `conversation` must not include a system message.
    pub async fn try_search_answer(
        &self,
        conversation: Vec<WireMessage>,
        credential: &Credential,
    ) -> Result<String, ChatError> {
        let mut messages = with_system_prompt(SEARCH_SYSTEM_PROMPT, conversation);
        let request = self.completion(messages.clone()).with_tools(vec![web_search_tool(
            "웹에서 실시간 정보를 검색합니다. 최신 뉴스, 날씨, 주가, 이벤트 등 실시간 정보가 필요할 때 사용하세요.",
            "검색할 키워드나 질문",
        )]);
        let message = self.provider.complete(credential, &request).await?;

        let search_call = message
            .tool_calls()
            .first()
            .filter(|call| call.function.name == WEB_SEARCH_TOOL)
            .cloned();

        let Some(call) = search_call else {
            return Ok(message
                .content_text()
                .unwrap_or(NO_RESPONSE_MESSAGE)
                .to_string());
        };

        let args: SearchArgs = call.parse_arguments()?;
        let outcome = self.search.search(&args.query).await;
        info!(
            query = %args.query,
            results = outcome.results.len(),
            simulated = outcome.is_simulated(),
            "Web search finished"
        );

        messages.push(message);
        messages.push(WireMessage::tool_result(call.id.clone(), outcome.to_tool_payload()));

        let answer = self.provider.complete(credential, &self.completion(messages)).await?;
        Ok(answer
            .content_text()
            .unwrap_or(UNPROCESSED_SEARCH_MESSAGE)
            .to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wants_image_keywords() {
        assert!(wants_image("고양이 그려줘"));
        assert!(wants_image("Please DRAW a dog"));
        assert!(wants_image("이미지 하나 부탁해"));
        assert!(!wants_image("오늘 서울 날씨 어때?"));
        assert!(!wants_image("hello there"));
    }

    #[test]
    fn test_mode_failure_messages_differ() {
        assert_eq!(ChatMode::Normal.failure_message(), CHAT_FAILURE_MESSAGE);
        assert_eq!(ChatMode::Search.failure_message(), SEARCH_FAILURE_MESSAGE);
        assert_eq!(ChatMode::from_search_flag(true), ChatMode::Search);
        assert_eq!(ChatMode::default(), ChatMode::Normal);
    }

    #[test]
    fn test_placeholder_summary_mentions_query() {
        let summary = placeholder_search_summary("환율");
        assert!(summary.starts_with("🔍 **검색 결과: 환율**"));
    }

    #[test]
    fn test_with_system_prompt_prepends() {
        let messages = with_system_prompt("sys", vec![WireMessage::user("hi")]);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content.as_deref(), Some("sys"));
    }
}

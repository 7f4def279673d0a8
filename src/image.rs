//! Image generation with prompt preparation.
//!
//! Korean prompts are rewritten into a detailed English prompt by a small
//! chat model before they reach the image endpoint; other prompts get a fixed
//! set of quality qualifiers appended.

use tracing::{debug, info, instrument, warn};

use crate::config::Settings;
use crate::credential::Credential;
use crate::error::ChatError;
use crate::provider::{CompletionRequest, ImageRequest, ProviderClient, WireMessage};

pub const IMAGE_TOOL: &str = "image_generation";
const CONTEXT_WINDOW: usize = 5;
const QUALITY_SUFFIX: &str =
    "highly detailed, professional photography, beautiful lighting, artistic composition";
const PROMPT_OPTIMIZER_INSTRUCTIONS: &str = "You are a professional translator and DALL-E prompt optimizer. \
Translate Korean text to English and optimize it for DALL-E image generation. \
Make the prompt detailed, vivid, and artistic. Include style, mood, lighting, and composition details. \
Use the conversation context to enhance the prompt with relevant details.";

/// Hangul compatibility jamo (consonants and vowels) or precomposed syllables.
pub fn contains_hangul(text: &str) -> bool {
    text.chars()
        .any(|c| matches!(c, 'ㄱ'..='ㅎ' | 'ㅏ'..='ㅣ' | '가'..='힣'))
}

/// Renders the last few messages as `role: content` lines.
pub fn context_lines(messages: &[WireMessage]) -> Vec<String> {
    messages
        .iter()
        .map(|message| {
            format!(
                "{}: {}",
                message.role.as_str(),
                message.content.as_deref().unwrap_or_default()
            )
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct ImageGenerator {
    provider: ProviderClient,
    prompt_model: String,
    image_model: String,
    image_size: String,
    temperature: f32,
}

impl ImageGenerator {
    pub fn new(provider: ProviderClient, settings: &Settings) -> Self {
        Self {
            provider,
            prompt_model: settings.prompt_model.clone(),
            image_model: settings.image_model.clone(),
            image_size: settings.image_size.clone(),
            temperature: settings.temperature,
        }
    }

    /// Generates one image for `prompt` and returns its URL.
    ///
    /// `context` is the conversation so far as `role: content` lines; only the
    /// last five are used.
    #[instrument(skip(self, credential, context))]
    pub async fn generate(
        &self,
        credential: &Credential,
        prompt: &str,
        context: &[String],
    ) -> Result<String, ChatError> {
        let prepared = self.prepare_prompt(credential, prompt, context).await;
        debug!(prompt = %prepared, "Prepared image prompt");

        let request = ImageRequest {
            model: self.image_model.clone(),
            prompt: prepared,
            n: 1,
            size: self.image_size.clone(),
            quality: "standard",
            response_format: "url",
        };
        let url = self
            .provider
            .create_image(credential, &request)
            .await?
            .ok_or_else(|| ChatError::tool(IMAGE_TOOL, "provider response did not include an image URL"))?;

        info!(%url, "Image generated");
        Ok(url)
    }

    async fn prepare_prompt(&self, credential: &Credential, prompt: &str, context: &[String]) -> String {
        if !contains_hangul(prompt) {
            return format!("{}, {}", prompt, QUALITY_SUFFIX);
        }

        match self.translate(credential, prompt, context).await {
            Ok(Some(translated)) => translated,
            Ok(None) => prompt.to_string(),
            Err(e) => {
                warn!(error = %e, "Prompt translation failed, using the original prompt");
                prompt.to_string()
            }
        }
    }

    async fn translate(
        &self,
        credential: &Credential,
        prompt: &str,
        context: &[String],
    ) -> Result<Option<String>, ChatError> {
        let recent = &context[context.len().saturating_sub(CONTEXT_WINDOW)..];
        let mut instruction = format!("Translate and optimize this Korean prompt for DALL-E: \"{}\"", prompt);
        if !recent.is_empty() {
            instruction.push_str("\n\nConversation context for reference:\n");
            instruction.push_str(&recent.join("\n"));
        }

        let request = CompletionRequest::new(
            &self.prompt_model,
            vec![
                WireMessage::system(PROMPT_OPTIMIZER_INSTRUCTIONS),
                WireMessage::user(instruction),
            ],
            crate::constants::PROMPT_MAX_TOKENS,
            self.temperature,
        );
        let message = self.provider.complete(credential, &request).await?;
        Ok(message.content_text().map(|text| text.trim().to_string()))
    }
}

use crate::error::{AnswerError, RetrievalError};
use crate::models::RetrievedPassage;
use crate::service::RetrievalService;
use crate::traits::AnswerComposer;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

pub const CONTEXT_SEPARATOR: &str = "\n\n";
pub const SYSTEM_PROMPT: &str = "Answer only from the provided context.";

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub question: String,
    pub text: String,
    pub passages: Vec<RetrievedPassage>,
}

pub fn build_context(passages: &[RetrievedPassage]) -> String {
    passages
        .iter()
        .map(|hit| hit.passage.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

pub async fn answer_question<C>(
    service: &RetrievalService,
    composer: &C,
    question: &str,
    k: usize,
) -> Result<Answer, AnswerError>
where
    C: AnswerComposer + Sync + ?Sized,
{
    let question = question.trim();
    if question.is_empty() {
        return Err(RetrievalError::EmptyText.into());
    }

    let passages = service.search(question, k)?;
    let context = build_context(&passages);
    debug!(passages = passages.len(), context_chars = context.len(), "composing answer");

    let text = composer.compose(question, &context).await?;
    Ok(Answer {
        question: question.to_string(),
        text,
        passages,
    })
}

#[derive(Debug, Clone)]
pub struct ChatCompletionsConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: Option<f32>,
    pub timeout: Duration,
}

impl Default for ChatCompletionsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            temperature: Some(0.2),
            timeout: Duration::from_secs(60),
        }
    }
}

pub struct ChatCompletionsComposer {
    endpoint: Url,
    api_key: Option<String>,
    model: String,
    temperature: Option<f32>,
    client: Client,
}

impl ChatCompletionsComposer {
    pub fn new(config: ChatCompletionsConfig) -> Result<Self, AnswerError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            endpoint: chat_endpoint(&config.base_url)?,
            api_key: config.api_key,
            model: config.model,
            temperature: config.temperature,
            client,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn request_body(&self, question: &str, context: &str) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                {
                    "role": "user",
                    "content": format!("Context:\n{context}\n\nQuestion:\n{question}")
                }
            ]
        });
        if let Some(temperature) = self.temperature {
            body["temperature"] = json!(temperature);
        }
        body
    }
}

#[async_trait]
impl AnswerComposer for ChatCompletionsComposer {
    async fn compose(&self, question: &str, context: &str) -> Result<String, AnswerError> {
        let mut request = self
            .client
            .post(self.endpoint.clone())
            .json(&self.request_body(question, context));
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AnswerError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let text = parse_completion(&body)?;
        info!(model = %self.model, answer_chars = text.len(), "answer composed");
        Ok(text)
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

fn parse_completion(body: &str) -> Result<String, AnswerError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|error| AnswerError::InvalidResponse(error.to_string()))?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| AnswerError::InvalidResponse("no message content in choices".to_string()))
}

fn chat_endpoint(base_url: &str) -> Result<Url, AnswerError> {
    let mut base = Url::parse(base_url.trim())?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base.join("chat/completions")?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::models::{PassageFragment, RetrievalOptions};
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    #[derive(Default)]
    struct RecordingComposer {
        seen: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl AnswerComposer for RecordingComposer {
        async fn compose(&self, question: &str, context: &str) -> Result<String, AnswerError> {
            self.seen
                .lock()
                .unwrap()
                .push((question.to_string(), context.to_string()));
            Ok("Paris".to_string())
        }
    }

    struct FailingComposer;

    #[async_trait]
    impl AnswerComposer for FailingComposer {
        async fn compose(&self, _question: &str, _context: &str) -> Result<String, AnswerError> {
            Err(AnswerError::Provider {
                status: 503,
                body: "overloaded".to_string(),
            })
        }
    }

    fn service(dir: &std::path::Path) -> RetrievalService {
        RetrievalService::with_model(
            Arc::new(CharacterNgramEmbedder::default()),
            RetrievalOptions {
                snapshot_dir: dir.to_path_buf(),
                ..RetrievalOptions::default()
            },
        )
    }

    #[tokio::test]
    async fn answer_uses_retrieved_context_in_order() {
        let dir = tempdir().unwrap();
        let service = service(dir.path());
        service
            .add_documents(vec![
                PassageFragment::new("france.txt", 0, "Paris is the capital of France."),
                PassageFragment::new("japan.txt", 0, "Tokyo is the capital of Japan."),
            ])
            .unwrap();

        let composer = RecordingComposer::default();
        let answer = answer_question(&service, &composer, "capital of France", 2)
            .await
            .unwrap();

        assert_eq!(answer.text, "Paris");
        assert_eq!(answer.passages.len(), 2);
        let seen = composer.seen.lock().unwrap();
        assert_eq!(seen[0].0, "capital of France");
        assert_eq!(seen[0].1, build_context(&answer.passages));
        assert!(seen[0].1.starts_with("Paris is the capital of France.\n\n"));
    }

    #[tokio::test]
    async fn empty_corpus_is_reported_before_calling_the_composer() {
        let dir = tempdir().unwrap();
        let composer = RecordingComposer::default();

        let result = answer_question(&service(dir.path()), &composer, "anything", 3).await;

        assert!(matches!(
            result,
            Err(AnswerError::Retrieval(RetrievalError::IndexEmpty))
        ));
        assert!(composer.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn composer_errors_surface_unchanged() {
        let dir = tempdir().unwrap();
        let service = service(dir.path());
        service
            .add_documents(vec![PassageFragment::new("a.txt", 0, "some text")])
            .unwrap();

        let result = answer_question(&service, &FailingComposer, "text", 1).await;
        assert!(matches!(
            result,
            Err(AnswerError::Provider { status: 503, .. })
        ));
    }

    #[test]
    fn endpoint_appends_chat_completions() {
        assert_eq!(
            chat_endpoint("https://example.com/v1").unwrap().as_str(),
            "https://example.com/v1/chat/completions"
        );
        assert_eq!(
            chat_endpoint("https://example.com/v1/").unwrap().as_str(),
            "https://example.com/v1/chat/completions"
        );
        assert!(chat_endpoint("not a url").is_err());
    }

    #[test]
    fn request_body_carries_context_and_question() {
        let composer = ChatCompletionsComposer::new(ChatCompletionsConfig {
            model: "test-model".to_string(),
            ..ChatCompletionsConfig::default()
        })
        .unwrap();

        let body = composer.request_body("Who?", "Some context");
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["messages"][0]["content"], SYSTEM_PROMPT);
        assert_eq!(
            body["messages"][1]["content"],
            "Context:\nSome context\n\nQuestion:\nWho?"
        );
        assert!(body.get("temperature").is_some());
    }

    #[test]
    fn completion_content_is_extracted() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"42"}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "42");
        assert!(matches!(
            parse_completion(r#"{"choices":[]}"#),
            Err(AnswerError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_completion("<html>"),
            Err(AnswerError::InvalidResponse(_))
        ));
    }
}

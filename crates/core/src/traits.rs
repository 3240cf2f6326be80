use crate::error::AnswerError;
use async_trait::async_trait;

#[async_trait]
pub trait AnswerComposer {
    async fn compose(&self, question: &str, context: &str) -> Result<String, AnswerError>;
}

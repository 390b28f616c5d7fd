use crate::config::Config;
use crate::error::Result;
use crate::services::decision_service::Mistake;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;

/// Inputs for the study and career guidance text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuidanceRequest {
    pub survey_title: String,
    pub code: String,
    pub endorsed: Vec<String>,
    pub selections: Vec<String>,
    pub careers: Vec<String>,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SummaryOutcome {
    Generated { text: String },
    AllCorrect { message: String },
    Undetermined { message: String },
    Unavailable { diagnostic: String },
}

/// Natural-language generation collaborator. Replies are displayed verbatim.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn weak_areas(&self, mistakes: &[Mistake]) -> Result<String>;

    async fn guidance(&self, request: &GuidanceRequest) -> Result<String>;
}

pub fn weak_area_prompt(mistakes: &[Mistake]) -> String {
    let mut prompt = String::from(
        "Analyze the following incorrectly answered questions to identify weak areas, \
         then suggest suitable courses together with a study plan.\n",
    );
    for item in mistakes {
        prompt.push_str(&format!(
            "\nCategory: {}\nQuestion: {}\nSelected answer: {}\nCorrect answer: {}\n",
            item.category, item.prompt, item.selected_answer, item.correct_answer
        ));
    }
    prompt
}

pub fn guidance_prompt(request: &GuidanceRequest) -> String {
    let list = |items: &[String]| {
        if items.is_empty() {
            "(none)".to_string()
        } else {
            items.join(", ")
        }
    };
    format!(
        "The student completed '{}' and received the personality code {}.\n\
         - Statements they agreed with: {}\n\
         - Items they selected: {}\n\
         - Careers matching the code: {}\n\
         - Suggested fields of study: {}\n\n\
         Provide guidance that explains why this code fits them, ranks the suggested \
         fields by percentage based on their preferences and answers, and gives advice \
         for succeeding in them. Keep the answer under 500 tokens.",
        request.survey_title,
        request.code,
        list(&request.endorsed),
        list(&request.selections),
        list(&request.careers),
        list(&request.fields),
    )
}

/// Chat-completion backed summarizer.
#[derive(Clone)]
pub struct OpenAiSummarizer {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    timeout: Duration,
    max_tokens: u32,
}

impl OpenAiSummarizer {
    pub fn new(client: Client, api_key: String, config: &Config) -> Self {
        Self {
            client,
            api_key,
            model: config.openai_model.clone(),
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.summary_timeout_secs),
            max_tokens: config.summary_max_tokens,
        }
    }

    async fn chat_openai(&self, user_prompt: String) -> Result<String> {
        let payload = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": "You are a helpful assistant."},
                {"role": "user", "content": user_prompt}
            ],
            "temperature": 0.7,
            "max_tokens": self.max_tokens
        });

        let res = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .timeout(self.timeout)
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("OpenAI API Error {}: {}", status, text).into());
        }

        let body: JsonValue = res.json().await?;
        extract_content(&body)
    }
}

fn extract_content(body: &JsonValue) -> Result<String> {
    body.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response format").into())
}

#[async_trait]
impl Summarizer for OpenAiSummarizer {
    async fn weak_areas(&self, mistakes: &[Mistake]) -> Result<String> {
        self.chat_openai(weak_area_prompt(mistakes)).await
    }

    async fn guidance(&self, request: &GuidanceRequest) -> Result<String> {
        self.chat_openai(guidance_prompt(request)).await
    }
}

/// Offline summarizer rendering fixed templates.
#[derive(Debug, Clone, Default)]
pub struct TemplateSummarizer;

#[async_trait]
impl Summarizer for TemplateSummarizer {
    async fn weak_areas(&self, mistakes: &[Mistake]) -> Result<String> {
        let mut categories: Vec<&str> = Vec::new();
        for m in mistakes {
            if !categories.contains(&m.category.as_str()) {
                categories.push(&m.category);
            }
        }
        let mut text = format!(
            "{} answer(s) need review. Focus areas: {}.\n",
            mistakes.len(),
            categories.join(", ")
        );
        for m in mistakes {
            text.push_str(&format!(
                "- {} (you chose '{}', the answer is '{}')\n",
                m.prompt, m.selected_answer, m.correct_answer
            ));
        }
        Ok(text)
    }

    async fn guidance(&self, request: &GuidanceRequest) -> Result<String> {
        let mut text = format!("Your code is {}.", request.code);
        if !request.careers.is_empty() {
            text.push_str(&format!(" Matching careers: {}.", request.careers.join(", ")));
        }
        if !request.fields.is_empty() {
            text.push_str(&format!(" Suggested fields: {}.", request.fields.join(", ")));
        }
        if request.careers.is_empty() && request.fields.is_empty() {
            text.push_str(" No exact matches were found; explore careers that fit your top categories.");
        }
        Ok(text)
    }
}

#[derive(Clone)]
pub struct AIService {
    summarizer: Arc<dyn Summarizer>,
}

impl AIService {
    pub fn new(summarizer: Arc<dyn Summarizer>) -> Self {
        Self { summarizer }
    }

    /// OpenAI when a key is configured, the offline templates otherwise.
    pub fn from_config(config: &Config) -> Self {
        match &config.openai_api_key {
            Some(key) => {
                tracing::info!("Summaries use model {}", config.openai_model);
                Self::new(Arc::new(OpenAiSummarizer::new(
                    Client::new(),
                    key.clone(),
                    config,
                )))
            }
            None => {
                tracing::info!("OPENAI_API_KEY not set, using offline summaries");
                Self::new(Arc::new(TemplateSummarizer))
            }
        }
    }

    /// Never fails: collaborator errors become a display-only diagnostic.
    pub async fn summarize_mistakes(&self, mistakes: &[Mistake]) -> SummaryOutcome {
        if mistakes.is_empty() {
            return SummaryOutcome::AllCorrect {
                message: "Well done! Every question was answered correctly.".to_string(),
            };
        }
        match self.summarizer.weak_areas(mistakes).await {
            Ok(text) => SummaryOutcome::Generated { text },
            Err(e) => {
                tracing::warn!("Weak-area summary failed: {:?}", e);
                SummaryOutcome::Unavailable {
                    diagnostic: format!("The analysis service could not be reached: {}", e),
                }
            }
        }
    }

    pub async fn summarize_guidance(&self, request: Option<GuidanceRequest>) -> SummaryOutcome {
        let Some(request) = request else {
            return SummaryOutcome::Undetermined {
                message: "No preference signal was recorded, so no guidance can be given."
                    .to_string(),
            };
        };
        match self.summarizer.guidance(&request).await {
            Ok(text) => SummaryOutcome::Generated { text },
            Err(e) => {
                tracing::warn!("Guidance summary failed: {:?}", e);
                SummaryOutcome::Unavailable {
                    diagnostic: format!("The guidance service could not be reached: {}", e),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn mistake(n: usize) -> Mistake {
        Mistake {
            prompt: format!("Question {}", n),
            category: "Ethics".to_string(),
            selected_answer: "A".to_string(),
            correct_answer: "B".to_string(),
        }
    }

    fn guidance_request() -> GuidanceRequest {
        GuidanceRequest {
            survey_title: "Quick".to_string(),
            code: "RIA".to_string(),
            endorsed: vec!["Do you like fixing things?".to_string()],
            selections: vec![],
            careers: vec!["Engineer".to_string()],
            fields: vec![],
        }
    }

    #[tokio::test]
    async fn no_mistakes_skips_the_collaborator() {
        let mut mock = MockSummarizer::new();
        mock.expect_weak_areas().never();
        let service = AIService::new(Arc::new(mock));

        let outcome = service.summarize_mistakes(&[]).await;
        assert!(matches!(outcome, SummaryOutcome::AllCorrect { .. }));
    }

    #[tokio::test]
    async fn collaborator_receives_only_the_mistakes() {
        let mut mock = MockSummarizer::new();
        mock.expect_weak_areas()
            .withf(|m: &[Mistake]| m.len() == 3)
            .times(1)
            .returning(|_| Ok("Review ethics.".to_string()));
        let service = AIService::new(Arc::new(mock));

        let mistakes: Vec<Mistake> = (0..3).map(mistake).collect();
        let outcome = service.summarize_mistakes(&mistakes).await;
        assert_eq!(
            outcome,
            SummaryOutcome::Generated {
                text: "Review ethics.".to_string()
            }
        );
    }

    #[tokio::test]
    async fn collaborator_failure_becomes_a_diagnostic() {
        let mut mock = MockSummarizer::new();
        mock.expect_guidance()
            .returning(|_| Err(Error::Internal("timeout".to_string())));
        let service = AIService::new(Arc::new(mock));

        let outcome = service.summarize_guidance(Some(guidance_request())).await;
        match outcome {
            SummaryOutcome::Unavailable { diagnostic } => assert!(diagnostic.contains("timeout")),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn undetermined_result_gets_no_guidance() {
        let mut mock = MockSummarizer::new();
        mock.expect_guidance().never();
        let service = AIService::new(Arc::new(mock));
        assert!(matches!(
            service.summarize_guidance(None).await,
            SummaryOutcome::Undetermined { .. }
        ));
    }

    #[test]
    fn weak_area_prompt_lists_each_mistake() {
        let prompt = weak_area_prompt(&[mistake(1), mistake(2)]);
        assert_eq!(prompt.matches("Correct answer: B").count(), 2);
        assert!(prompt.contains("Question 2"));
    }

    #[test]
    fn guidance_prompt_marks_empty_lists() {
        let prompt = guidance_prompt(&guidance_request());
        assert!(prompt.contains("personality code RIA"));
        assert!(prompt.contains("Items they selected: (none)"));
    }

    #[tokio::test]
    async fn template_summarizer_is_deterministic() {
        let summarizer = TemplateSummarizer;
        let text = summarizer.guidance(&guidance_request()).await.unwrap();
        assert_eq!(text, "Your code is RIA. Matching careers: Engineer.");
    }

    #[test]
    fn content_is_extracted_from_chat_reply() {
        let body = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "  Study plan  "}}]
        });
        assert_eq!(extract_content(&body).unwrap(), "Study plan");
        assert!(extract_content(&serde_json::json!({"choices": []})).is_err());
    }
}

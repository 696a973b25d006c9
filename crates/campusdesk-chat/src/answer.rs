//! Answer generation over a retrieval result.

use tracing::{debug, info, warn};

use campusdesk_core::{Error, Result};
use campusdesk_store::RetrievalResult;

use crate::prompt::{build_prompt, location_lines, rewrite_prompt};
use crate::providers::LanguageModel;
use crate::retry::RetryPolicy;
use crate::types::{Answer, ChatMessage};

pub struct Answerer<M> {
    model: M,
    retry: RetryPolicy,
}

impl<M: LanguageModel> Answerer<M> {
    pub fn new(model: M, retry: RetryPolicy) -> Self {
        Self { model, retry }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Answer `query` from `result`.
    ///
    /// Quota errors are retried with backoff; any other error fails at once.
    /// The location lines found in `result` are prepended to the answer.
    pub async fn answer(&self, query: &str, result: &RetrievalResult, identity: &str) -> Result<Answer> {
        let prompt = build_prompt(query, result, identity);
        let mut attempt = 0;

        let text = loop {
            match self.model.generate(&prompt).await {
                Ok(text) => break text,
                Err(Error::Quota(msg)) => match self.retry.delay_for(attempt) {
                    Some(delay) => {
                        warn!(
                            "Quota exceeded, waiting {:?} before retry (attempt {}/{})",
                            delay,
                            attempt + 1,
                            self.retry.max_attempts
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => return Err(Error::Quota(msg)),
                },
                Err(e) => return Err(e),
            }
        };

        if text.trim().is_empty() {
            return Err(Error::Generation("model returned no text".into()));
        }

        let locations = location_lines(result);
        let text = if locations.is_empty() {
            text
        } else {
            format!("辦理地點：\n{}\n\n{}", locations.join("\n"), text)
        };
        info!("Answer generated after {} attempt(s)", attempt + 1);

        Ok(Answer {
            text,
            locations,
            attempts: attempt + 1,
        })
    }

    /// Rewrite a follow-up question into a standalone query. Falls back to
    /// `query` when there is no history or the model fails.
    pub async fn rewrite_query(&self, history: &[ChatMessage], query: &str) -> String {
        if history.is_empty() {
            return query.to_string();
        }
        match self.model.generate(&rewrite_prompt(history, query)).await {
            Ok(text) if !text.trim().is_empty() => {
                let rewritten = text.trim().to_string();
                debug!("Rewrote {:?} as {:?}", query, rewritten);
                rewritten
            }
            Ok(_) => query.to_string(),
            Err(e) => {
                warn!("Query rewrite failed: {}", e);
                query.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use campusdesk_store::{ChunkMetadata, Place};

    /// Replies with scripted outcomes in order and records every prompt.
    struct ScriptedModel {
        replies: Mutex<VecDeque<Result<String>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<Result<String>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    impl LanguageModel for ScriptedModel {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::Generation("script exhausted".into())))
        }
    }

    fn quota() -> Result<String> {
        Err(Error::Quota("429".into()))
    }

    fn with_location() -> RetrievalResult {
        let mut result = RetrievalResult::new();
        let meta = ChunkMetadata::location(
            "註冊組位置",
            "https://admin.example.edu/building",
            "admin",
            Place {
                building: "行政大樓".into(),
                floor: "1樓".into(),
                room: "106".into(),
            },
        )
        .with_unit("註冊組", "註冊組");
        result.push("註冊組位於行政大樓1樓的106室。".into(), meta, 0.1);
        result
    }

    #[tokio::test]
    async fn test_quota_is_retried() {
        let answerer = Answerer::new(
            ScriptedModel::new(vec![quota(), quota(), Ok("請至註冊組辦理。".into())]),
            RetryPolicy::immediate(3),
        );

        let answer = answerer.answer("在學證明", &RetrievalResult::new(), "").await.unwrap();

        assert_eq!(answer.text, "請至註冊組辦理。");
        assert_eq!(answer.attempts, 3);
        assert_eq!(answerer.model().calls(), 3);
    }

    #[tokio::test]
    async fn test_quota_exhausted() {
        let answerer = Answerer::new(
            ScriptedModel::new(vec![quota(), quota(), quota(), Ok("late".into())]),
            RetryPolicy::immediate(3),
        );

        let err = answerer.answer("q", &RetrievalResult::new(), "").await.unwrap_err();

        assert!(matches!(err, Error::Quota(_)));
        assert_eq!(answerer.model().calls(), 3);
    }

    #[tokio::test]
    async fn test_other_errors_fail_immediately() {
        let answerer = Answerer::new(
            ScriptedModel::new(vec![Err(Error::Generation("500".into())), Ok("never".into())]),
            RetryPolicy::immediate(3),
        );

        let err = answerer.answer("q", &RetrievalResult::new(), "").await.unwrap_err();

        assert!(matches!(err, Error::Generation(_)));
        assert_eq!(answerer.model().calls(), 1);
    }

    #[tokio::test]
    async fn test_location_block_prepended() {
        let answerer = Answerer::new(
            ScriptedModel::new(vec![Ok("註冊組受理在學證明申請。".into())]),
            RetryPolicy::immediate(1),
        );

        let answer = answerer.answer("註冊組在哪", &with_location(), "").await.unwrap();

        assert_eq!(
            answer.text,
            "辦理地點：\n- 註冊組：行政大樓 1樓 106室\n\n註冊組受理在學證明申請。"
        );
        assert_eq!(answer.locations.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_answer_is_an_error() {
        let answerer = Answerer::new(ScriptedModel::new(vec![Ok("  ".into())]), RetryPolicy::immediate(3));
        let err = answerer.answer("q", &with_location(), "").await.unwrap_err();
        assert!(matches!(err, Error::Generation(_)));
    }

    #[tokio::test]
    async fn test_rewrite_falls_back_to_query() {
        let history = vec![ChatMessage::user("註冊組在哪"), ChatMessage::assistant("行政大樓1樓")];

        let failing = Answerer::new(ScriptedModel::new(vec![quota()]), RetryPolicy::immediate(3));
        assert_eq!(failing.rewrite_query(&history, "電話呢").await, "電話呢");

        let blank = Answerer::new(ScriptedModel::new(vec![Ok("\n".into())]), RetryPolicy::immediate(3));
        assert_eq!(blank.rewrite_query(&history, "電話呢").await, "電話呢");

        let working = Answerer::new(
            ScriptedModel::new(vec![Ok(" 註冊組電話 \n".into())]),
            RetryPolicy::immediate(3),
        );
        assert_eq!(working.rewrite_query(&history, "電話呢").await, "註冊組電話");
    }

    #[tokio::test]
    async fn test_rewrite_without_history_skips_model() {
        let answerer = Answerer::new(ScriptedModel::new(vec![]), RetryPolicy::immediate(3));
        assert_eq!(answerer.rewrite_query(&[], "休學").await, "休學");
        assert_eq!(answerer.model().calls(), 0);
    }
}

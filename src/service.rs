use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::composer::Composer;
use crate::config::Config;
use crate::history::{ConversationLog, replay_context};
use crate::intent::{Intent, IntentRouter, Window};
use crate::models::{AggregationRequest, AggregationResult, QaRecord, QueryStatistics};
use crate::schema::SchemaCatalog;
use crate::store::{MetricsStore, StoreBackend};

fn default_true() -> bool {
    true
}

/// Per-question switches exposed to the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AskOptions {
    /// Replay the last few exchanges as extra context
    #[serde(default = "default_true")]
    pub include_history: bool,
    /// Ask for a structured analysis of the fetched data instead of a chat reply
    #[serde(default)]
    pub analysis: bool,
}

impl Default for AskOptions {
    fn default() -> Self {
        Self {
            include_history: true,
            analysis: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    pub user_id: String,
    pub intent: Intent,
    pub window: Window,
    pub data: Value,
    pub data_text: String,
    pub answer: String,
    pub saved: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub title: String,
    pub ai_connected: bool,
    pub model: String,
    pub store_backend: StoreBackend,
    pub history_connected: bool,
    pub missing_settings: Vec<&'static str>,
}

/// Session ids are derived from the session start time in the business zone
pub fn session_user_id(now: DateTime<FixedOffset>) -> String {
    now.format("user_%Y%m%d_%H%M%S").to_string()
}

/// Ties routing, prompting and history together for one question at a time
pub struct DashboardService {
    router: IntentRouter,
    store_backend: StoreBackend,
    composer: Arc<dyn Composer>,
    log: ConversationLog,
    schema: SchemaCatalog,
    title: String,
    model: String,
    history_limit: usize,
    missing_settings: Vec<&'static str>,
    offset: FixedOffset,
}

impl DashboardService {
    pub fn new(
        config: &Config,
        store: Arc<dyn MetricsStore>,
        composer: Arc<dyn Composer>,
        log: ConversationLog,
        schema: SchemaCatalog,
    ) -> Self {
        let offset = config.utc_offset();
        tracing::info!(
            backend = ?store.backend(),
            ai = composer.is_connected(),
            history = log.is_connected(),
            "Dashboard service initialised"
        );
        Self {
            store_backend: store.backend(),
            router: IntentRouter::new(store, offset),
            composer,
            log,
            schema,
            title: config.dashboard.title.clone(),
            model: config.gemini.model.clone(),
            history_limit: config.dashboard.history_limit,
            missing_settings: config.missing_settings(),
            offset,
        }
    }

    pub fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }

    pub fn new_session(&self) -> String {
        session_user_id(self.now())
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    pub async fn ask(&self, user_id: &str, question: &str, options: AskOptions) -> AskResponse {
        self.ask_at(user_id, question, options, self.now()).await
    }

    /// Route, fetch, compose and record one question as of `now`
    pub async fn ask_at(
        &self,
        user_id: &str,
        question: &str,
        options: AskOptions,
        now: DateTime<FixedOffset>,
    ) -> AskResponse {
        let routed = self.router.answer_at(question, now).await;
        let intent = routed.classification.intent;
        let window = routed.classification.window;

        let answer = if options.analysis {
            let data = json!({
                "intent": intent,
                "window": window,
                "summary": routed.text,
                "data": routed.data,
            });
            self.composer.analyze(&data, question).await
        } else {
            let context = self.context(user_id, &routed.text, options).await;
            self.composer.compose(question, Some(&context)).await
        };

        let saved = self.log.append(user_id, question, &answer).await;
        if !saved {
            tracing::debug!("Exchange for {} was not recorded", user_id);
        }

        AskResponse {
            user_id: user_id.to_string(),
            intent,
            window,
            data: routed.data,
            data_text: routed.text,
            answer,
            saved,
        }
    }

    async fn context(&self, user_id: &str, data_text: &str, options: AskOptions) -> String {
        let mut sections = vec![data_text.to_string(), self.schema.prompt_hint()];
        if options.include_history {
            let previous = self.log.recent(user_id, self.history_limit).await;
            if !previous.is_empty() {
                sections.push(format!("이전 대화:\n{}", replay_context(&previous)));
            }
        }
        sections.join("\n\n")
    }

    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            title: self.title.clone(),
            ai_connected: self.composer.is_connected(),
            model: self.model.clone(),
            store_backend: self.store_backend,
            history_connected: self.log.is_connected(),
            missing_settings: self.missing_settings.clone(),
        }
    }

    pub async fn history(&self, user_id: &str, limit: usize) -> Vec<QaRecord> {
        self.log.recent(user_id, limit).await
    }

    pub async fn statistics(&self) -> QueryStatistics {
        self.log.statistics().await
    }

    pub fn schema(&self) -> &SchemaCatalog {
        &self.schema
    }

    pub async fn aggregate(&self, request: &AggregationRequest) -> AggregationResult {
        self.router.aggregator().aggregate(request).await
    }
}

//! Chart-plan generation for uploaded datasets, with recovery of malformed model output.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use banklens_core::config::LlmConfig;

use crate::llm::{ChatMessage, CompletionRequest, LlmClient};
use crate::python_literal;

pub const SYSTEM_MESSAGE: &str = "You are a helpful data analyst AI.";
pub const NO_SUMMARY: &str = "No summary provided.";

pub const DEFAULT_PROMPT: &str = "\
You are given a statistical summary of a tabular dataset and a schema describing its columns.
Study them and answer with a single JSON object and nothing else, using these keys:
- \"insights\": a paragraph describing the dataset, notable patterns, data quality issues and business opportunities
- \"categorical_features\": list of categorical column names worth plotting
- \"numerical_features\": list of numerical column names worth plotting
- \"target_col\": the name of the target column (yes/no outcome)
- \"bivariate_pairs\": list of [feature, target] pairs worth plotting
- \"inference_univariate\": object mapping column name to a one-line observation
- \"inference_bivariate\": object mapping \"feature,target\" to a one-line observation
- \"heatmap_inference\": one line describing the correlation heatmap
- \"col_schema\": object mapping column name to a human-readable label";

/// Where a plan came from, for logging and tests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlanSource {
    Model { attempt: u32 },
    Fallback { reason: FallbackReason },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FallbackReason {
    RequestFailed,
    AttemptsExhausted,
}

/// Loosely typed chart plan. Every field has a default; unexpected shapes are ignored.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct InsightPlan {
    pub insights: Option<String>,
    pub categorical_features: Vec<String>,
    pub numerical_features: Vec<String>,
    pub target_col: String,
    pub bivariate_pairs: Vec<(String, String)>,
    pub inference_univariate: HashMap<String, String>,
    #[serde(skip)]
    pub inference_bivariate: HashMap<(String, String), String>,
    pub heatmap_inference: String,
    pub col_schema: HashMap<String, String>,
}

impl InsightPlan {
    pub fn from_value(value: &Value) -> Self {
        let target_col = value
            .get("target_col")
            .and_then(Value::as_str)
            .filter(|target| !target.trim().is_empty())
            .unwrap_or("y")
            .to_string();

        Self {
            insights: value.get("insights").and_then(text_of),
            categorical_features: string_list(value.get("categorical_features")),
            numerical_features: string_list(value.get("numerical_features")),
            target_col,
            bivariate_pairs: value
                .get("bivariate_pairs")
                .and_then(Value::as_array)
                .map(|pairs| pairs.iter().filter_map(pair_of).collect())
                .unwrap_or_default(),
            inference_univariate: string_map(value.get("inference_univariate")),
            inference_bivariate: value
                .get("inference_bivariate")
                .and_then(Value::as_object)
                .map(|entries| {
                    entries
                        .iter()
                        .filter_map(|(key, text)| Some((pair_from_key(key)?, text_of(text)?)))
                        .collect()
                })
                .unwrap_or_default(),
            heatmap_inference: value.get("heatmap_inference").and_then(text_of).unwrap_or_default(),
            col_schema: string_map(value.get("col_schema")),
        }
    }

    /// Human label for a column, falling back to the column name.
    pub fn label<'a>(&'a self, column: &'a str) -> &'a str {
        self.col_schema.get(column).map(String::as_str).unwrap_or(column)
    }

    pub fn summary_text(&self) -> &str {
        self.insights.as_deref().unwrap_or(NO_SUMMARY)
    }

    pub fn univariate_note(&self, column: &str) -> &str {
        self.inference_univariate.get(column).map(String::as_str).unwrap_or_default()
    }

    pub fn bivariate_note(&self, x: &str, y: &str) -> &str {
        self.inference_bivariate
            .get(&(x.to_string(), y.to_string()))
            .map(String::as_str)
            .unwrap_or_default()
    }
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

fn string_map(value: Option<&Value>) -> HashMap<String, String> {
    value
        .and_then(Value::as_object)
        .map(|entries| {
            entries.iter().filter_map(|(key, text)| Some((key.clone(), text_of(text)?))).collect()
        })
        .unwrap_or_default()
}

fn pair_of(value: &Value) -> Option<(String, String)> {
    match value {
        Value::Array(items) if items.len() == 2 => {
            Some((items[0].as_str()?.to_string(), items[1].as_str()?.to_string()))
        }
        Value::String(key) => pair_from_key(key),
        _ => None,
    }
}

/// Accepts `a,b`, `(a, b)`, `('a', 'b')` and `a vs b`.
fn pair_from_key(key: &str) -> Option<(String, String)> {
    let inner = key.trim().trim_start_matches(['(', '[']).trim_end_matches([')', ']']);
    let (x, y) = inner.split_once(',').or_else(|| inner.split_once(" vs "))?;
    let clean = |part: &str| part.trim().trim_matches(['\'', '"']).trim().to_string();
    let (x, y) = (clean(x), clean(y));
    (!x.is_empty() && !y.is_empty()).then_some((x, y))
}

/// Recovers a JSON value from chat output that may carry prose, code fences or
/// Python-literal syntax. Returns `None` when every strategy fails.
pub fn recover_plan_value(output: &str) -> Option<Value> {
    let from_brace = output.find('{').map(|index| &output[index..]).unwrap_or(output);
    let unfenced = from_brace.replace("```json", "").replace("```python", "").replace("```", "");
    let cleaned = unfenced.trim_matches(|c: char| c == '`' || c == ' ' || c == '\n');

    if let Ok(value) = serde_json::from_str::<Value>(cleaned) {
        return Some(value);
    }

    let unescaped = cleaned.replace("\\\"", "\"").replace("\\n", " ");
    if let Ok(value) = serde_json::from_str::<Value>(&unescaped) {
        return Some(value);
    }

    python_literal::parse(&unescaped).ok()
}

pub struct InsightGenerator {
    client: Arc<dyn LlmClient>,
    settings: LlmConfig,
    prompt: String,
    max_attempts: u32,
}

impl InsightGenerator {
    pub fn new(client: Arc<dyn LlmClient>, settings: LlmConfig, max_attempts: u32) -> Self {
        Self { client, settings, prompt: DEFAULT_PROMPT.to_string(), max_attempts: max_attempts.max(1) }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn request_for(&self, summary: &str, schema: &str) -> CompletionRequest {
        let content =
            format!("{}\n\n=== Summary ===\n{summary}\n\n=== Schema ===\n{schema}", self.prompt);
        CompletionRequest::new(vec![ChatMessage::system(SYSTEM_MESSAGE), ChatMessage::user(content)])
            .with_settings(&self.settings)
    }

    pub async fn generate(&self, summary: &str, schema: &str) -> InsightPlan {
        self.generate_with_source(summary, schema).await.0
    }

    pub async fn generate_with_source(
        &self,
        summary: &str,
        schema: &str,
    ) -> (InsightPlan, PlanSource) {
        let request = self.request_for(summary, schema);

        for attempt in 1..=self.max_attempts {
            let output = match self.client.complete(&request).await {
                Ok(output) => output,
                Err(error) => {
                    warn!(
                        event_name = "eda.insights.request_failed",
                        attempt,
                        error = %error,
                        "insight request failed, using fallback plan"
                    );
                    return (
                        fallback_plan(),
                        PlanSource::Fallback { reason: FallbackReason::RequestFailed },
                    );
                }
            };

            match recover_plan_value(&output) {
                Some(value) => {
                    info!(event_name = "eda.insights.parsed", attempt, "insight plan parsed");
                    return (InsightPlan::from_value(&value), PlanSource::Model { attempt });
                }
                None => {
                    warn!(
                        event_name = "eda.insights.parse_failed",
                        attempt,
                        max_attempts = self.max_attempts,
                        "could not recover a plan from model output"
                    );
                }
            }
        }

        warn!(event_name = "eda.insights.exhausted", "all attempts failed, using fallback plan");
        (fallback_plan(), PlanSource::Fallback { reason: FallbackReason::AttemptsExhausted })
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

fn owned_map(entries: &[(&str, &str)]) -> HashMap<String, String> {
    entries.iter().map(|(key, value)| (key.to_string(), value.to_string())).collect()
}

fn pair(x: &str, y: &str) -> (String, String) {
    (x.to_string(), y.to_string())
}

/// Plan used when the model cannot be reached or never produces parseable output.
///
/// Describes the bank-marketing dataset the service was first built around.
pub fn fallback_plan() -> InsightPlan {
    InsightPlan {
        insights: Some(
            "The dataset is about the marketing campaigns of a Portuguese banking institution, \
             aiming to predict whether a client will subscribe a term deposit. Customers who are \
             unemployed, retired, or blue-collar have a lower subscription rate. Calls longer \
             than 329 seconds have a 25.6% subscription rate, while calls under 104 seconds \
             result in only 4.8%. The number of contacts performed during the campaign affects \
             the subscription rate, with more than 3 contacts leading to diminishing returns. \
             Clients with a higher balance and more than 5 years of previous contacts have a \
             higher subscription rate. However, clients with previous campaigns leading to \
             failure have a lower subscription rate. The data quality issues include a high \
             percentage of missing values in the \"contact\" column, outliers in the \
             \"duration\" column, and a high skewness in the \"balance\" column. Real-world \
             decisions or business opportunities include adjusting the marketing strategy based \
             on the customer's job type, offering personalized promotions to clients with a \
             higher balance, and targeting clients with previous campaigns leading to success."
                .to_string(),
        ),
        categorical_features: owned(&[
            "job",
            "marital",
            "education",
            "default",
            "housing",
            "loan",
            "contact",
            "month",
        ]),
        numerical_features: owned(&[
            "age", "balance", "duration", "campaign", "pdays", "previous", "day",
        ]),
        target_col: "y".to_string(),
        bivariate_pairs: vec![
            pair("duration", "y"),
            pair("balance", "y"),
            pair("age", "y"),
            pair("job", "y"),
            pair("campaign", "y"),
            pair("poutcome", "y"),
        ],
        inference_univariate: owned_map(&[
            ("age", "📌 Most clients are aged between 30 and 50, with slight right skew."),
            ("balance", "📌 Most clients have low or moderate balances, some with very high/negative."),
            ("duration", "📌 Most calls are short; long calls are rare but more successful."),
            ("campaign", "📌 Most clients contacted 1–3 times; diminishing returns after that."),
            ("pdays", "📌 Most clients not contacted before; those contacted vary widely."),
            ("previous", "📌 Most have no prior contacts; few have several."),
            ("day", "📌 Contacted throughout month; no major skew."),
            ("job", "📌 Common jobs: blue-collar, management, technician."),
            ("marital", "📌 Mostly married, followed by single and divorced."),
            ("education", "📌 Mostly secondary; fewer tertiary/primary."),
            ("default", "📌 Very few have credit in default."),
            ("housing", "📌 Most have housing loan."),
            ("loan", "📌 Most do not have personal loan."),
            ("contact", "📌 'Cellular' most common; many nulls."),
            ("month", "📌 Most contacts in May, August, July."),
        ]),
        inference_bivariate: [
            (pair("duration", "y"), "📌 Longer calls (>400s) → 30% success vs. <100s → 4%."),
            (pair("job", "y"), "📌 Retired: 18%, students: 16%, blue-collar: 6%."),
            (pair("balance", "y"), "📌 >3000 EUR → 25.5%, <3000 EUR → 17.5%."),
            (pair("campaign", "y"), "📌 >3 calls → conversion <6%."),
            (pair("pdays", "y"), "📌 Contacted after 30 days → 22.3% vs. within 30 days → 14.5%."),
            (pair("previous", "y"), "📌 >5 prev. contacts → 23.5%, else → 16.5%"),
        ]
        .into_iter()
        .map(|(key, text)| (key, text.to_string()))
        .collect(),
        heatmap_inference:
            "📌 Duration and balance are most positively correlated with subscription.".to_string(),
        col_schema: owned_map(&[
            ("age", "Client Age"),
            ("balance", "Yearly Balance (EUR)"),
            ("duration", "Call Duration (seconds)"),
            ("campaign", "Number of Contacts"),
            ("pdays", "Days Since Last Contact"),
            ("previous", "Previous Contacts"),
            ("day", "Contact Day"),
            ("job", "Job Type"),
            ("education", "Education Level"),
            ("poutcome", "Previous Campaign Outcome"),
            ("housing", "Housing Loan"),
            ("loan", "Personal Loan"),
            ("contact", "Contact Method"),
            ("month", "Contact Month"),
            ("y", "Subscribed Term Deposit"),
        ]),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::json;

    use banklens_core::config::AppConfig;

    use super::{
        fallback_plan, recover_plan_value, FallbackReason, InsightGenerator, InsightPlan,
        PlanSource,
    };
    use crate::llm::{CompletionRequest, LlmClient, LlmError};

    struct ScriptedClient {
        replies: Mutex<VecDeque<Result<String, LlmError>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedClient {
        fn new(replies: Vec<Result<String, LlmError>>) -> Arc<Self> {
            Arc::new(Self { replies: Mutex::new(replies.into()), calls: Mutex::new(0) })
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().expect("lock")
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String, LlmError> {
            *self.calls.lock().expect("lock") += 1;
            self.replies
                .lock()
                .expect("lock")
                .pop_front()
                .unwrap_or_else(|| Ok("still not json".to_string()))
        }
    }

    fn generator(client: Arc<ScriptedClient>) -> InsightGenerator {
        let config = AppConfig::default();
        InsightGenerator::new(client, config.insights.llm, config.insights.max_attempts)
    }

    #[test]
    fn recovers_json_wrapped_in_prose_and_fences() {
        let output = "Sure! Here is the plan:\n```json\n{\"target_col\": \"deposit\"}\n```";
        assert_eq!(recover_plan_value(output), Some(json!({"target_col": "deposit"})));
    }

    #[test]
    fn recovers_escaped_json() {
        let output = r#"{\"insights\": \"line one\nline two\", \"numerical_features\": [\"age\"]}"#;
        let value = recover_plan_value(output).expect("escaped json should recover");
        assert_eq!(value["numerical_features"], json!(["age"]));
    }

    #[test]
    fn recovers_python_literal_with_tuple_keys() {
        let output = "```python\n{'numerical_features': ['duration'], 'target_col': 'y', \
                      'bivariate_pairs': [('duration', 'y')], \
                      'inference_bivariate': {('duration', 'y'): 'long calls convert'}, \
                      'flag': True,}\n```";
        let value = recover_plan_value(output).expect("python literal should recover");
        let plan = InsightPlan::from_value(&value);

        assert_eq!(plan.bivariate_pairs, vec![("duration".to_string(), "y".to_string())]);
        assert_eq!(plan.bivariate_note("duration", "y"), "long calls convert");
    }

    #[test]
    fn unparseable_output_yields_none() {
        assert_eq!(recover_plan_value("I cannot help with that."), None);
        assert_eq!(recover_plan_value("{'a': }"), None);
    }

    #[test]
    fn plan_lookups_default_when_shapes_are_unexpected() {
        let plan = InsightPlan::from_value(&json!({
            "numerical_features": "age",
            "col_schema": {"age": "Client Age", "bad": 3},
            "bivariate_pairs": [["age"], "balance, y", ["job", "y"]],
            "target_col": ""
        }));

        assert!(plan.numerical_features.is_empty());
        assert_eq!(plan.target_col, "y");
        assert_eq!(plan.label("age"), "Client Age");
        assert_eq!(plan.label("bad"), "3");
        assert_eq!(plan.label("job"), "job");
        assert_eq!(
            plan.bivariate_pairs,
            vec![("balance".to_string(), "y".to_string()), ("job".to_string(), "y".to_string())]
        );
        assert_eq!(plan.summary_text(), "No summary provided.");
        assert_eq!(InsightPlan::from_value(&json!([1, 2])), InsightPlan {
            target_col: "y".to_string(),
            ..InsightPlan::default()
        });
    }

    #[tokio::test]
    async fn second_attempt_success_is_used() {
        let client = ScriptedClient::new(vec![
            Ok("no json here".to_string()),
            Ok("{\"insights\": \"fine\"}".to_string()),
        ]);
        let (plan, source) = generator(client.clone()).generate_with_source("s", "c").await;

        assert_eq!(plan.summary_text(), "fine");
        assert_eq!(source, PlanSource::Model { attempt: 2 });
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test]
    async fn falls_back_after_three_failed_attempts() {
        let client = ScriptedClient::new(Vec::new());
        let (plan, source) = generator(client.clone()).generate_with_source("s", "c").await;

        assert_eq!(plan, fallback_plan());
        assert_eq!(source, PlanSource::Fallback { reason: FallbackReason::AttemptsExhausted });
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test]
    async fn request_failure_falls_back_immediately() {
        let client = ScriptedClient::new(vec![Err(LlmError::MalformedResponse(
            "missing content".to_string(),
        ))]);
        let (_, source) = generator(client.clone()).generate_with_source("s", "c").await;

        assert_eq!(source, PlanSource::Fallback { reason: FallbackReason::RequestFailed });
        assert_eq!(client.calls(), 1);
    }

    #[test]
    fn request_carries_system_message_and_sections() {
        let client = ScriptedClient::new(Vec::new());
        let request = generator(client).with_prompt("PROMPT").request_for("SUM", "SCHEMA");

        assert_eq!(request.messages[0].content, "You are a helpful data analyst AI.");
        assert_eq!(
            request.messages[1].content,
            "PROMPT\n\n=== Summary ===\nSUM\n\n=== Schema ===\nSCHEMA"
        );
        assert!((request.temperature - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn fallback_plan_describes_bank_marketing_columns() {
        let plan = fallback_plan();
        assert_eq!(plan.target_col, "y");
        assert_eq!(plan.numerical_features.len(), 7);
        assert_eq!(plan.label("duration"), "Call Duration (seconds)");
        assert!(plan.bivariate_note("duration", "y").contains("30% success"));
    }
}

use crate::schema::LineItemValue;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Stage-level progress reported by the extraction pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExtractionEvent {
    Starting,
    ScaleDetected { scale_factor: u64, ambiguous: bool },
    PatternsMatched { count: usize },
    FallbackRequested { matched: usize },
    FallbackCompleted { parser: String, fields: usize },
    FallbackUnavailable { reason: String },
    Formatted { fields: usize },
    Validated { adjustments: usize },
    Inferred { derived: usize, estimated: usize },
    Success,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingOptions {
    pub temperature: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: None,
        }
    }
}

/// A single prompt sent to a completion backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub prompt: String,
    pub model: String,
    pub sampling: SamplingOptions,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            sampling: SamplingOptions::default(),
        }
    }

    #[must_use]
    pub fn with_sampling(mut self, sampling: SamplingOptions) -> Self {
        self.sampling = sampling;
        self
    }
}

/// Shape the model is asked to answer with. Embedded in the prompt as a JSON
/// schema; responses are parsed leniently and never deserialized into this
/// type directly.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[schemars(description = "Income statement values exactly as printed in the document")]
pub struct ModelLineItems {
    #[serde(rename = "Revenue")]
    #[schemars(description = "The company's total income from sales")]
    pub revenue: LineItemValue,

    #[serde(rename = "Cost_of_Revenue")]
    #[schemars(description = "Direct costs attributable to producing the goods or services sold")]
    pub cost_of_revenue: LineItemValue,

    #[serde(rename = "Gross_Profit")]
    #[schemars(description = "Revenue minus Cost of Revenue")]
    pub gross_profit: LineItemValue,

    #[serde(rename = "Operating_Expenses")]
    #[schemars(description = "Expenses of normal business operations")]
    pub operating_expenses: LineItemValue,

    #[serde(rename = "Operating_Income")]
    #[schemars(description = "Gross Profit minus Operating Expenses")]
    pub operating_income: LineItemValue,

    #[serde(rename = "Net_Income")]
    #[schemars(description = "Final profit after all expenses, interest and taxes")]
    pub net_income: LineItemValue,
}

/// Request body for Ollama's `/api/generate`.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub stream: bool,
    pub options: GenerateOptions,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateOptions {
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    pub response: String,
    #[serde(default)]
    pub done: bool,
}

//! # Income Statement Extractor
//!
//! A library for recovering a scale-correct, internally consistent income
//! statement from noisy document text.
//!
//! ## Core Concepts
//!
//! - **Scale detection**: figures are printed in dollars, thousands, millions or billions,
//!   often without saying so. The document-wide multiplier is detected from scale phrases,
//!   headers, or as a last resort the magnitude of the `$` figures themselves
//! - **Pattern extraction**: deterministic label/amount patterns recover line items first
//! - **Model fallback**: when fewer than four items are found, a completion model is asked
//!   for the raw figures (never scaled) and its answer is parsed leniently
//! - **Validation**: Gross Profit <= Revenue, Operating Income <= Gross Profit and
//!   Net Income <= Operating Income are repaired in place
//! - **Inference**: missing items are derived from accounting identities, and as a
//!   low-confidence last resort from typical industry ratios
//!
//! ## Example
//!
//! ```rust,ignore
//! use income_statement_extractor::*;
//!
//! let text = "Income Statement (in millions)\nRevenue: 120\nCost of Revenue: 70\nNet Income: 15";
//! let report = IncomeStatementExtractor::deterministic().extract(text).await;
//!
//! assert_eq!(report.amount("Revenue"), Some(120_000_000.0));
//! assert_eq!(report.amount("Gross_Profit"), Some(50_000_000.0));
//! println!("{}", report.to_json_pretty()?);
//! ```

pub mod balancer;
pub mod config;
pub mod engine;
pub mod error;
pub mod inference;
pub mod ingestion;
pub mod llm;
pub mod patterns;
pub mod scale;
pub mod schema;
pub mod utils;
pub mod visualization;

pub use balancer::{AccountingValidator, Adjustment};
pub use config::*;
pub use engine::IncomeStatementExtractor;
pub use error::{ExtractionError, Result};
pub use inference::{InferenceOutcome, Inferencer};
pub use ingestion::{clean_text, join_pages, PlainTextExtractor, TextExtractor};
pub use llm::{
    CompletionModel, CompletionRequest, ExtractionEvent, FallbackOutcome, ModelFallbackExtractor,
    NoModel, SamplingOptions,
};
pub use patterns::{PatternExtractor, PatternMatches};
pub use scale::{DetectionMethod, ScaleDetection, ScaleDetector};
pub use schema::*;
pub use utils::{format_value, normalize_number, parse_amount, RawValue};
pub use visualization::*;

#[cfg(feature = "ollama")]
pub use llm::OllamaClient;

/// Extracts with pattern matching only, using the default configuration.
pub async fn extract_income_statement(text: &str) -> ExtractionReport {
    IncomeStatementExtractor::deterministic().extract(text).await
}

/// Extracts with `model` as the fallback for sparse documents.
pub async fn extract_income_statement_with_model<M: CompletionModel>(
    text: &str,
    model: M,
) -> ExtractionReport {
    IncomeStatementExtractor::new(model).extract(text).await
}

use crate::balancer::AccountingValidator;
use crate::config::PipelineConfig;
use crate::error::{ExtractionError, Result};
use crate::inference::Inferencer;
use crate::ingestion::{clean_text, join_pages, TextExtractor};
use crate::llm::client::{CompletionModel, NoModel};
use crate::llm::extractor::ModelFallbackExtractor;
use crate::llm::types::ExtractionEvent;
use crate::patterns::PatternExtractor;
use crate::scale::{DetectionMethod, ScaleDetector};
use crate::schema::{ExtractionReport, IncomeStatement, LineItem, Provenance};
use crate::utils::{format_value, RawValue};
use crate::visualization::build_visualization;
use futures::channel::mpsc::UnboundedSender;
use futures::FutureExt;
use log::{debug, error, info, warn};
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;

/// Runs the full extraction pipeline over document text.
///
/// Every call is independent; the extractor holds no per-request state and
/// can be shared across concurrent tasks.
pub struct IncomeStatementExtractor<M: CompletionModel = NoModel> {
    model: M,
    config: PipelineConfig,
    progress: Option<UnboundedSender<ExtractionEvent>>,
}

impl IncomeStatementExtractor<NoModel> {
    /// Pattern matching only. A sparse document gets no model fallback and
    /// records that as a warning.
    pub fn deterministic() -> Self {
        Self::new(NoModel)
    }
}

impl<M: CompletionModel> IncomeStatementExtractor<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            config: PipelineConfig::default(),
            progress: None,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Streams stage-level [`ExtractionEvent`]s to `sender`. A closed
    /// channel is ignored.
    #[must_use]
    pub fn with_progress(mut self, sender: UnboundedSender<ExtractionEvent>) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Extracts an income statement from `text`. Never fails: an internal
    /// error or panic is turned into an error envelope.
    pub async fn extract(&self, text: &str) -> ExtractionReport {
        match AssertUnwindSafe(self.run(text)).catch_unwind().await {
            Ok(Ok(report)) => report,
            Ok(Err(e)) => self.failure(e.to_string()),
            Err(panic) => self.failure(panic_message(panic.as_ref())),
        }
    }

    /// Decodes `document` with `extractor` and extracts from the joined pages.
    pub async fn extract_document(
        &self,
        document: &[u8],
        extractor: &dyn TextExtractor,
    ) -> ExtractionReport {
        let pages = match extractor.extract_pages(document) {
            Ok(pages) => pages,
            Err(e) => return self.failure(e.to_string()),
        };
        debug!(
            "{} produced {} pages",
            extractor.backend_name(),
            pages.len()
        );
        self.extract(&join_pages(&pages)).await
    }

    async fn run(&self, text: &str) -> Result<ExtractionReport> {
        self.emit(ExtractionEvent::Starting);
        self.config.validate()?;
        let mut warnings = Vec::new();

        let detection = ScaleDetector::new(self.config.scale.clone()).detect(text);
        let scale = detection.scale;
        if let DetectionMethod::Statistical { mean, samples } = detection.method {
            warnings.push(format!(
                "Scale {} inferred from the mean of {} dollar figures ({:.2}); no explicit scale statement found",
                scale, samples, mean
            ));
        }
        self.emit(ExtractionEvent::ScaleDetected {
            scale_factor: scale.as_u64(),
            ambiguous: detection.is_ambiguous(),
        });

        let cleaned = clean_text(text);
        let matches = PatternExtractor::new().extract(&cleaned);
        let matched = matches.len();
        self.emit(ExtractionEvent::PatternsMatched { count: matched });

        let mut raw: BTreeMap<LineItem, (RawValue, Provenance)> = matches
            .into_iter()
            .map(|(item, value)| (item, (RawValue::Number(value), Provenance::Extracted)))
            .collect();

        if matched < self.config.fallback_threshold {
            self.emit(ExtractionEvent::FallbackRequested { matched });
            let fallback = ModelFallbackExtractor::new(&self.model, &self.config.model);

            match fallback.extract(text).await {
                Ok(outcome) => {
                    let fields = outcome.values.len();
                    for (item, value) in outcome.values {
                        raw.entry(item).or_insert((value, Provenance::Model));
                    }
                    self.emit(ExtractionEvent::FallbackCompleted {
                        parser: outcome.parser.unwrap_or("none").to_string(),
                        fields,
                    });
                }
                Err(e) => {
                    warn!("Continuing without model fallback: {}", e);
                    warnings.push(e.to_string());
                    self.emit(ExtractionEvent::FallbackUnavailable {
                        reason: e.to_string(),
                    });
                }
            }
        }

        let mut statement = IncomeStatement::new(scale);
        for (item, (value, provenance)) in &raw {
            statement.set(item.clone(), format_value(value, scale), *provenance);
        }
        self.emit(ExtractionEvent::Formatted { fields: raw.len() });

        let adjustments = AccountingValidator::new(&self.config.validation).validate(&mut statement);
        warnings.extend(adjustments.iter().map(ToString::to_string));
        self.emit(ExtractionEvent::Validated {
            adjustments: adjustments.len(),
        });

        let inferred = Inferencer::new(&self.config.inference).infer(&mut statement);
        if !inferred.estimated.is_empty() {
            let names: Vec<String> = inferred.estimated.iter().map(ToString::to_string).collect();
            warnings.push(format!(
                "Estimated from typical industry ratios (low confidence): {}",
                names.join(", ")
            ));
        }
        self.emit(ExtractionEvent::Inferred {
            derived: inferred.derived.len(),
            estimated: inferred.estimated.len(),
        });

        statement.ensure_canonical();

        let known = statement.known_count();
        if known < self.config.insufficient_threshold {
            warnings.push(ExtractionError::ExtractionInsufficient { known }.to_string());
        }

        for (item, entry) in statement.iter() {
            if let Some(value) = entry.value.amount() {
                if !value.is_finite() {
                    return Err(ExtractionError::InvalidState(format!(
                        "{} holds a non-finite value",
                        item
                    )));
                }
            }
        }

        let quality = statement.quality(self.config.insufficient_threshold);
        let visualization = build_visualization(&statement);
        info!(
            "Extraction finished with {} of 6 canonical items known ({:?})",
            known, quality
        );
        self.emit(ExtractionEvent::Success);

        Ok(ExtractionReport::from_statement(
            &statement,
            quality,
            warnings,
            visualization,
        ))
    }

    fn failure(&self, reason: String) -> ExtractionReport {
        error!("Extraction failed: {}", reason);
        self.emit(ExtractionEvent::Failed {
            reason: reason.clone(),
        });
        ExtractionReport::failure(format!("Error processing request: {}", reason))
    }

    fn emit(&self, event: ExtractionEvent) {
        if let Some(tx) = &self.progress {
            let _ = tx.unbounded_send(event);
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unexpected panic during extraction".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::CompletionRequest;
    use crate::schema::{DataQuality, LineItemValue};
    use futures::StreamExt;

    struct Panicking;

    impl CompletionModel for Panicking {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
            panic!("model exploded")
        }
    }

    #[tokio::test]
    async fn test_panics_become_error_envelope() {
        let report = IncomeStatementExtractor::new(Panicking)
            .extract("Revenue: 100")
            .await;

        assert_eq!(report.data_quality, DataQuality::Error);
        let message = report.error.clone().unwrap();
        assert!(message.starts_with("Error processing request: "));
        assert!(message.contains("model exploded"));
        assert!(report.visualization_data.is_none());
        for item in LineItem::CANONICAL {
            assert_eq!(report.value(item.as_str()), LineItemValue::Unknown);
        }
    }

    #[tokio::test]
    async fn test_progress_events_in_order() {
        let (tx, rx) = futures::channel::mpsc::unbounded();
        let extractor = IncomeStatementExtractor::deterministic().with_progress(tx);

        extractor
            .extract(
                "Revenue: 1000 Cost of Revenue: 600 Gross Profit: 400 \
                 Operating Expenses: 250 Operating Income: 150 Net Income: 100",
            )
            .await;
        drop(extractor);

        let events: Vec<ExtractionEvent> = rx.collect().await;
        assert_eq!(events.first(), Some(&ExtractionEvent::Starting));
        assert_eq!(events.last(), Some(&ExtractionEvent::Success));
        assert!(events.contains(&ExtractionEvent::PatternsMatched { count: 6 }));
        assert!(!events
            .iter()
            .any(|e| matches!(e, ExtractionEvent::FallbackRequested { .. })));
    }

    #[test]
    fn test_panic_message_variants() {
        let text: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(text.as_ref()), "static");
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(owned.as_ref()), "owned");
        let other: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(
            panic_message(other.as_ref()),
            "unexpected panic during extraction"
        );
    }
}

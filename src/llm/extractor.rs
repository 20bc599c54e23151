use crate::config::ModelSettings;
use crate::error::Result;
use crate::llm::client::CompletionModel;
use crate::llm::parsers::{default_parsers, parse_response, ParsedFields, ResponseParser};
use crate::llm::prompts::build_extraction_prompt;
use crate::llm::types::{CompletionRequest, SamplingOptions};
use crate::schema::{ExtractionReport, LineItem};
use crate::utils::RawValue;
use log::{debug, info, warn};
use std::collections::BTreeMap;

/// Unscaled values recovered from a model answer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FallbackOutcome {
    pub values: BTreeMap<LineItem, RawValue>,
    /// Name of the parser that understood the answer, if any did.
    pub parser: Option<&'static str>,
}

impl FallbackOutcome {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

pub struct ModelFallbackExtractor<'a, M: CompletionModel> {
    model: &'a M,
    settings: &'a ModelSettings,
    parsers: Vec<Box<dyn ResponseParser>>,
}

impl<'a, M: CompletionModel> ModelFallbackExtractor<'a, M> {
    pub fn new(model: &'a M, settings: &'a ModelSettings) -> Self {
        Self {
            model,
            settings,
            parsers: default_parsers(),
        }
    }

    /// Replaces the parser chain. Parsers are tried in the given order.
    pub fn with_parsers(mut self, parsers: Vec<Box<dyn ResponseParser>>) -> Self {
        self.parsers = parsers;
        self
    }

    /// Asks the model for the line items in `text`.
    ///
    /// A failed model call is returned as an error. An answer no parser
    /// understands is not an error; it yields an empty outcome.
    pub async fn extract(&self, text: &str) -> Result<FallbackOutcome> {
        let prompt = build_extraction_prompt(text, self.settings.max_prompt_chars)?;
        let request = CompletionRequest::new(prompt, self.settings.model.as_str()).with_sampling(
            SamplingOptions {
                temperature: self.settings.temperature,
                max_tokens: self.settings.max_tokens,
            },
        );

        debug!("Querying model {} for fallback extraction", self.settings.model);
        let response = self.model.complete(&request).await?;

        let Some((parser, fields)) = parse_response(&response, &self.parsers) else {
            warn!("Model response could not be parsed; continuing without fallback data");
            return Ok(FallbackOutcome::default());
        };

        let values = normalize_keys(fields);
        info!(
            "Model fallback produced {} fields via {}",
            values.len(),
            parser
        );

        Ok(FallbackOutcome {
            values,
            parser: Some(parser),
        })
    }
}

/// Maps model labels onto line items. Unrecognized labels without a value are
/// dropped, as are labels naming an envelope field such as `scale_factor`.
/// When two labels map to the same item the first known value is kept.
fn normalize_keys(fields: ParsedFields) -> BTreeMap<LineItem, RawValue> {
    let mut values = BTreeMap::new();

    for (label, value) in fields {
        let item = LineItem::from_label(&label);
        if !item.is_canonical() && value == RawValue::Unknown {
            debug!("Dropping empty model field {}", label);
            continue;
        }
        if ExtractionReport::is_reserved_key(item.as_str()) {
            warn!("Ignoring model field {} that names an envelope field", label);
            continue;
        }

        match values.get(&item) {
            Some(RawValue::Unknown) | None => {
                values.insert(item, value);
            }
            Some(_) => debug!("Ignoring duplicate model field {}", label),
        }
    }

    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractionError;
    use crate::llm::client::NoModel;

    struct Canned(&'static str);

    impl CompletionModel for Canned {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn test_model_keys_are_normalized() {
        let model = Canned(r#"{"revenue": 120, "cost_of_sales": "80", "Free_Cash_Flow": 12, "junk": "Unknown"}"#);
        let settings = ModelSettings::default();

        let outcome = ModelFallbackExtractor::new(&model, &settings)
            .extract("Revenue 120")
            .await
            .unwrap();

        assert_eq!(outcome.parser, Some("embedded_object"));
        assert_eq!(outcome.values[&LineItem::Revenue], RawValue::Number(120.0));
        assert_eq!(
            outcome.values[&LineItem::CostOfRevenue],
            RawValue::Text("80".to_string())
        );
        assert_eq!(
            outcome.values[&LineItem::Other("Free_Cash_Flow".to_string())],
            RawValue::Number(12.0)
        );
        assert!(!outcome.values.contains_key(&LineItem::Other("junk".to_string())));
    }

    #[tokio::test]
    async fn test_unparsable_answer_is_empty_outcome() {
        let model = Canned("no idea");
        let settings = ModelSettings::default();

        let outcome = ModelFallbackExtractor::new(&model, &settings)
            .extract("text")
            .await
            .unwrap();

        assert!(outcome.is_empty());
        assert_eq!(outcome.parser, None);
    }

    #[tokio::test]
    async fn test_model_failure_is_reported() {
        let settings = ModelSettings::default();
        let result = ModelFallbackExtractor::new(&NoModel, &settings)
            .extract("text")
            .await;
        assert!(matches!(result, Err(ExtractionError::ModelUnavailable(_))));
    }

    #[test]
    fn test_duplicate_labels_keep_known_value() {
        let mut fields = ParsedFields::new();
        fields.insert("Net_Income".to_string(), RawValue::Unknown);
        fields.insert("net_profit".to_string(), RawValue::Number(9.0));

        let values = normalize_keys(fields);

        assert_eq!(values[&LineItem::NetIncome], RawValue::Number(9.0));
    }

    #[tokio::test]
    async fn test_envelope_names_from_model_are_dropped() {
        let model = Canned(r#"{"Revenue": 100, "scale_factor": 1000000, "error": 1, "warnings": "none"}"#);
        let settings = ModelSettings::default();

        let outcome = ModelFallbackExtractor::new(&model, &settings)
            .extract("Revenue 100")
            .await
            .unwrap();

        assert_eq!(outcome.values.len(), 1);
        assert_eq!(outcome.values[&LineItem::Revenue], RawValue::Number(100.0));
        for name in ExtractionReport::RESERVED_KEYS {
            assert!(!outcome.values.contains_key(&LineItem::Other(name.to_string())));
        }
    }
}

//! Document-wide scale detection.
//!
//! Three signals are tried in order: explicit phrases such as "(in millions)"
//! near the top or bottom of the document, a looser header form pairing a
//! scale word with a dollar sign, and finally the mean magnitude of every
//! `$` figure in the text. The last one is a heuristic and is reported as
//! such through [`DetectionMethod::Statistical`].

use crate::config::ScaleDetectorConfig;
use crate::schema::Scale;
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(&format!("(?i){}", p)).expect("scale pattern is valid"))
        .collect()
}

static BILLION_PHRASES: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"\(in billions\)",
        r"\(billions\)",
        r"\(in bb\)",
        r"presented in billions",
        r"amounts in billions",
        r"\$[^\n]*\bbb\b",
        r"\(bb\)",
        r"figures? in billions",
        r"expressed in billions",
        r"reported in billions",
        r"usd in billions",
        r"in billions of (?:dollars|usd|\$)",
        r"billions of (?:dollars|usd|\$)",
    ])
});

static MILLION_PHRASES: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"\(in millions\)",
        r"\(millions\)",
        r"\(in mm\)",
        r"presented in millions",
        r"amounts in millions",
        r"\$[^\n]*\bmm\b",
        r"\(mm\)",
        r"figures? in millions",
        r"expressed in millions",
        r"reported in millions",
        r"usd in millions",
        r"in millions of (?:dollars|usd|\$)",
        r"millions of (?:dollars|usd|\$)",
    ])
});

static THOUSAND_PHRASES: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"\(in thousands\)",
        r"\(thousands\)",
        r"\(in k\)",
        r"presented in thousands",
        r"amounts in thousands",
        r"\$[^\n]*\bk\b",
        r"\(k\)",
        r"figures? in thousands",
        r"expressed in thousands",
        r"reported in thousands",
        r"usd in thousands",
        r"in thousands of (?:dollars|usd|\$)",
        r"thousands of (?:dollars|usd|\$)",
    ])
});

static BILLION_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:billion|\bbb\b)[^\n]*\$|^\$[^\n]*\bbb\b").expect("header pattern is valid")
});

static MILLION_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:million|\bmm\b)[^\n]*\$|^\$[^\n]*\bmm\b").expect("header pattern is valid")
});

static DOLLAR_FIGURE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\s*([\d,]+(?:\.\d+)?)").expect("dollar pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DetectionMethod {
    /// An explicit scale phrase in the header/footer window.
    Phrase,
    /// A scale word paired with a dollar sign near the top of the document.
    Header,
    /// Inferred from the mean of `samples` dollar figures. Approximate.
    Statistical { mean: f64, samples: usize },
    /// No confident signal; raw values assumed.
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleDetection {
    pub scale: Scale,
    pub method: DetectionMethod,
}

impl ScaleDetection {
    pub fn is_ambiguous(&self) -> bool {
        self.method == DetectionMethod::Default
    }
}

pub struct ScaleDetector {
    config: ScaleDetectorConfig,
}

impl Default for ScaleDetector {
    fn default() -> Self {
        Self::new(ScaleDetectorConfig::default())
    }
}

impl ScaleDetector {
    pub fn new(config: ScaleDetectorConfig) -> Self {
        Self { config }
    }

    pub fn detect(&self, text: &str) -> ScaleDetection {
        if let Some(scale) = self.detect_phrase(text) {
            info!("Detected {} notation in header/footer", scale);
            return ScaleDetection {
                scale,
                method: DetectionMethod::Phrase,
            };
        }

        if let Some(scale) = self.detect_header(text) {
            info!("Detected {} notation from header", scale);
            return ScaleDetection {
                scale,
                method: DetectionMethod::Header,
            };
        }

        if let Some(detection) = self.detect_statistical(text) {
            return detection;
        }

        debug!("No scale signal found, using raw values");
        ScaleDetection {
            scale: Scale::Units,
            method: DetectionMethod::Default,
        }
    }

    fn detect_phrase(&self, text: &str) -> Option<Scale> {
        let window = format!(
            "{}\n{}",
            head_chars(text, self.config.phrase_window),
            tail_chars(text, self.config.phrase_window)
        );

        let tiers: [(&[Regex], Scale); 3] = [
            (&BILLION_PHRASES, Scale::Billions),
            (&MILLION_PHRASES, Scale::Millions),
            (&THOUSAND_PHRASES, Scale::Thousands),
        ];

        tiers
            .iter()
            .find(|(patterns, _)| patterns.iter().any(|re| re.is_match(&window)))
            .map(|(_, scale)| *scale)
    }

    fn detect_header(&self, text: &str) -> Option<Scale> {
        let header = head_chars(text, self.config.header_window);
        if BILLION_HEADER.is_match(header) {
            Some(Scale::Billions)
        } else if MILLION_HEADER.is_match(header) {
            Some(Scale::Millions)
        } else {
            None
        }
    }

    fn detect_statistical(&self, text: &str) -> Option<ScaleDetection> {
        let values: Vec<f64> = DOLLAR_FIGURE
            .captures_iter(text)
            .filter_map(|caps| caps.get(1)?.as_str().replace(',', "").parse::<f64>().ok())
            .collect();

        if values.is_empty() {
            return None;
        }
        if values.len() < self.config.min_statistical_samples {
            debug!(
                "Only {} dollar figures found, too few to infer a scale",
                values.len()
            );
            return None;
        }

        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let scale = classify_mean(mean)?;
        info!(
            "Inferred {} from mean dollar figure {:.2} over {} samples",
            scale,
            mean,
            values.len()
        );

        Some(ScaleDetection {
            scale,
            method: DetectionMethod::Statistical {
                mean,
                samples: values.len(),
            },
        })
    }
}

/// Maps the mean `$` figure to the scale it most likely implies. Means in the
/// gaps between bands carry no signal.
pub fn classify_mean(mean: f64) -> Option<Scale> {
    if mean > 1e8 {
        Some(Scale::Units)
    } else if (1e4..1e5).contains(&mean) {
        Some(Scale::Thousands)
    } else if mean > 10.0 && mean < 1e4 {
        Some(Scale::Millions)
    } else if mean < 10.0 {
        Some(Scale::Billions)
    } else {
        None
    }
}

fn head_chars(text: &str, n: usize) -> &str {
    match text.char_indices().nth(n) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn tail_chars(text: &str, n: usize) -> &str {
    let count = text.chars().count();
    if count <= n {
        return text;
    }
    match text.char_indices().nth(count - n) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}

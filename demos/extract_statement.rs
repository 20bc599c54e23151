use dotenv::dotenv;
use futures::StreamExt;
use income_statement_extractor::llm::{ExtractionEvent, OllamaClient};
use income_statement_extractor::{
    IncomeStatementExtractor, PipelineConfig, PlainTextExtractor, TextExtractor,
};
use std::error::Error;
use std::path::PathBuf;

const SAMPLE_STATEMENT: &str = "ACME Widgets Inc.\n\
Consolidated Statement of Operations (in millions)\n\
\n\
Total Revenue                 $ 4,812\n\
Cost of goods sold              2,960\n\
Operating income                  611\n\
Net income                        402\n";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();

    let mut config = PipelineConfig::default();
    if let Ok(path) = std::env::var("EXTRACTOR_CONFIG") {
        config = PipelineConfig::from_json_file(&path)?;
        println!("⚙️  Loaded configuration from {}", path);
    }
    if let Ok(model) = std::env::var("OLLAMA_MODEL") {
        config.model.model = model;
    }

    let client = OllamaClient::from_env()?;
    println!("🤖 Using model '{}' at {}", config.model.model, client.base_url());

    let text = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => {
            let bytes = tokio::fs::read(&path).await?;
            let pages = PlainTextExtractor.extract_pages(&bytes)?;
            println!("📄 Read {} page(s) from {:?}", pages.len(), path);
            income_statement_extractor::join_pages(&pages)
        }
        None => {
            println!("📄 No input file given, using the built-in sample statement");
            SAMPLE_STATEMENT.to_string()
        }
    };

    let (tx, mut rx) = futures::channel::mpsc::unbounded();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.next().await {
            match event {
                ExtractionEvent::Starting => println!("🔄 Starting extraction..."),
                ExtractionEvent::ScaleDetected {
                    scale_factor,
                    ambiguous,
                } => {
                    if ambiguous {
                        println!("📏 No scale statement found, using raw values");
                    } else {
                        println!("📏 Document scale: x{}", scale_factor);
                    }
                }
                ExtractionEvent::PatternsMatched { count } => {
                    println!("🔍 Pattern matching found {} line items", count)
                }
                ExtractionEvent::FallbackRequested { matched } => {
                    println!("🤖 Only {} items matched, asking the model...", matched)
                }
                ExtractionEvent::FallbackCompleted { parser, fields } => {
                    println!("   ✅ Model returned {} fields ({})", fields, parser)
                }
                ExtractionEvent::FallbackUnavailable { reason } => {
                    println!("   ⚠️  Model unavailable: {}", reason)
                }
                ExtractionEvent::Formatted { fields } => {
                    println!("🧮 Scaled {} values", fields)
                }
                ExtractionEvent::Validated { adjustments } => {
                    println!("🔧 Validation made {} adjustment(s)", adjustments)
                }
                ExtractionEvent::Inferred { derived, estimated } => println!(
                    "🧩 Derived {} and estimated {} missing item(s)",
                    derived, estimated
                ),
                ExtractionEvent::Success => println!("✅ Extraction complete"),
                ExtractionEvent::Failed { reason } => println!("❌ Extraction failed: {}", reason),
            }
        }
    });

    let extractor = IncomeStatementExtractor::new(client)
        .with_config(config)
        .with_progress(tx);
    let report = extractor.extract(&text).await;
    drop(extractor);
    printer.await?;

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("📊 INCOME STATEMENT ({:?} quality)", report.data_quality);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for (name, value) in &report.line_items {
        let provenance = report
            .provenance
            .get(name)
            .map(|p| format!("{:?}", p))
            .unwrap_or_default();
        println!("   {:<24} {:>20}  {}", name, value.to_string(), provenance);
    }

    if !report.warnings.is_empty() {
        println!("\n⚠️  Warnings:");
        for warning in &report.warnings {
            println!("   - {}", warning);
        }
    }

    if let Some(chart) = &report.visualization_data {
        let margins = chart.time_series.percentages;
        println!(
            "\n📈 Margins: gross {:.1}%, operating {:.1}%, net {:.1}%",
            margins.gross_margin, margins.operating_margin, margins.net_margin
        );
    }

    let output = PathBuf::from("demos").join("output").join("income_statement.json");
    if let Some(dir) = output.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }
    tokio::fs::write(&output, report.to_json_pretty()?).await?;
    println!("\n💾 Saved report to {:?}", output);

    Ok(())
}

use crate::error::Result;
use crate::llm::types::ModelLineItems;

pub const EXTRACTION_INSTRUCTIONS: &str = r#"
Extract ONLY the income statement data from this financial document text.

FORMAT INSTRUCTIONS (CRITICAL):
1. Respond with a single JSON object and nothing else.
2. Every key is quoted. Every value is a NUMBER without currency symbols, or the string "Unknown".
3. Report values exactly as they appear in the document. DO NOT apply any scale factor:
   if the document says "(in millions)" and shows 50, answer 50, not 50000000.
4. Write negative values as negative numbers such as -10.5, never with parentheses.
5. If a value cannot be found, use "Unknown".
6. Use these keys for the core line items:
   - "Revenue": the company's total income from sales
   - "Cost_of_Revenue": direct costs of producing the goods or services sold
   - "Gross_Profit": Revenue minus Cost of Revenue
   - "Operating_Expenses": expenses of normal business operations
   - "Operating_Income": Gross Profit minus Operating Expenses
   - "Net_Income": final profit after all expenses, interest and taxes
7. You may add other clearly labelled financial metrics under snake_case keys.
"#;

/// Builds the fallback extraction prompt. Only the first `max_chars`
/// characters of `text` are included.
pub fn build_extraction_prompt(text: &str, max_chars: usize) -> Result<String> {
    let schema = serde_json::to_string_pretty(&schemars::schema_for!(ModelLineItems))?;
    let excerpt: String = text.chars().take(max_chars).collect();

    Ok(format!(
        "{}\n\
        JSON SCHEMA OF THE EXPECTED ANSWER:\n{}\n\n\
        FINANCIAL DOCUMENT TEXT:\n\"\"\"\n{}\n\"\"\"\n\n\
        IMPORTANT: Return ONLY the JSON object, no explanations.",
        EXTRACTION_INSTRUCTIONS.trim(),
        schema,
        excerpt
    ))
}

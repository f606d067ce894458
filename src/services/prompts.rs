//! Prompt text and declared response schemas for the remote model.
//!
//! Everything prompt-shaped lives here so extraction behavior can change
//! without touching retry or parsing logic, and so unit tests can inspect
//! prompts without a live model.

use serde_json::{json, Value};

/// Instruction for reading a technical drawing into structured specs.
pub const EXTRACTION_PROMPT: &str = r#"You are an expert manufacturing engineer analyzing technical drawings.

Analyze this engineering drawing image and extract the following information in JSON format:

{
  "dimensions": {
    "length": <number or null>,
    "width": <number or null>,
    "height": <number or null>,
    "thickness": <number or null>,
    "diameter": <number or null>,
    "unit": "mm" | "cm" | "inch" | "m"
  },
  "material": {
    "type": "<material name, e.g., 'Steel SS400', 'Aluminum 6061', 'SUS304'>",
    "grade": "<grade if specified>",
    "specifications": "<any additional specs>",
    "confidence": <0.0 to 1.0>
  },
  "quantity": <number>,
  "surfaceFinish": "<e.g., 'Polishing', 'Painting', 'Anodizing', or null>",
  "tolerances": ["<tolerance 1>", "<tolerance 2>"],
  "manufacturingProcess": ["<process 1>", "<process 2>"],
  "overallConfidence": <0.0 to 1.0>
}

Important:
- Extract EXACT dimensions from the drawing
- If a dimension is not visible, use null
- Identify material type from notes or material callouts
- List all manufacturing processes implied (cutting, bending, welding, etc.)
- Set confidence based on image clarity and completeness
- Return ONLY valid JSON, no markdown formatting"#;

/// Probe message for the connection test endpoint.
pub const CONNECTION_PROBE_PROMPT: &str = "Hello, please respond with \"OK\"";

/// Response schema for drawing extraction, declared to the model so the
/// reply is guaranteed parseable JSON.
pub fn extraction_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "dimensions": {
                "type": "object",
                "properties": {
                    "length": { "type": "number", "nullable": true },
                    "width": { "type": "number", "nullable": true },
                    "height": { "type": "number", "nullable": true },
                    "thickness": { "type": "number", "nullable": true },
                    "diameter": { "type": "number", "nullable": true },
                    "unit": { "type": "string", "enum": ["mm", "cm", "inch", "m"] }
                },
                "required": ["unit"]
            },
            "material": {
                "type": "object",
                "properties": {
                    "type": { "type": "string" },
                    "grade": { "type": "string", "nullable": true },
                    "specifications": { "type": "string", "nullable": true },
                    "confidence": { "type": "number" }
                },
                "required": ["type", "confidence"]
            },
            "quantity": { "type": "integer" },
            "surfaceFinish": { "type": "string", "nullable": true },
            "tolerances": { "type": "array", "items": { "type": "string" } },
            "manufacturingProcess": { "type": "array", "items": { "type": "string" } },
            "overallConfidence": { "type": "number" }
        },
        "required": ["material", "overallConfidence"]
    })
}

/// Instruction for turning extracted specs (plus up to five historical
/// comparables) into a cost estimate.
pub fn cost_estimation_prompt(specs_json: &str, comparables_json: &str) -> String {
    format!(
        r#"You are a manufacturing cost estimation expert.

Given the following specifications and historical data, estimate the manufacturing cost:

CURRENT PROJECT:
{specs_json}

SIMILAR HISTORICAL PROJECTS:
{comparables_json}

Provide a detailed cost estimate in JSON format:
{{
  "material": <total material cost in JPY>,
  "labor": <total labor cost in JPY>,
  "overhead": <overhead cost in JPY>,
  "total": <total manufacturing cost in JPY>,
  "confidence": <0.0 to 1.0>,
  "reasoning": "<overall explanation>"
}}

Return ONLY valid JSON."#
    )
}

/// Response schema for cost estimation.
pub fn cost_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "material": { "type": "number" },
            "labor": { "type": "number" },
            "overhead": { "type": "number" },
            "total": { "type": "number" },
            "confidence": { "type": "number" },
            "reasoning": { "type": "string", "nullable": true }
        },
        "required": ["material", "labor", "overhead", "total", "confidence"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_schema_requires_material_and_confidence() {
        let schema = extraction_schema();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert!(required.contains(&"material"));
        assert!(required.contains(&"overallConfidence"));
        assert_eq!(
            schema["properties"]["dimensions"]["properties"]["unit"]["enum"],
            json!(["mm", "cm", "inch", "m"])
        );
    }

    #[test]
    fn cost_schema_requires_all_components() {
        let schema = cost_schema();
        let required = schema["required"].as_array().unwrap();
        for field in ["material", "labor", "overhead", "total", "confidence"] {
            assert!(required.iter().any(|v| v == field), "missing {field}");
        }
    }

    #[test]
    fn cost_prompt_embeds_specs_and_comparables() {
        let prompt = cost_estimation_prompt("{\"quantity\":2}", "No historical data available");
        assert!(prompt.contains("{\"quantity\":2}"));
        assert!(prompt.contains("No historical data available"));
    }
}

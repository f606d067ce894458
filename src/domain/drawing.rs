//! Extracted specification of a part, as read off an engineering drawing.

use serde::{Deserialize, Deserializer, Serialize};

/// Measurement unit used by every dimension on one drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DimensionUnit {
    #[default]
    Mm,
    Cm,
    Inch,
    M,
}

/// Dimensions read from the drawing. A `None` field means the measurement is
/// not visible on the drawing, never that it is zero.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Dimensions {
    pub length: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub thickness: Option<f64>,
    pub diameter: Option<f64>,
    #[serde(default)]
    pub unit: DimensionUnit,
}

/// Material callout: type plus optional grade/spec notes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    #[serde(rename = "type")]
    pub material_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specifications: Option<String>,
    #[serde(default = "default_confidence", deserialize_with = "null_to_half")]
    pub confidence: f64,
}

/// Full extracted specification of one part.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawingSpecs {
    #[serde(default, deserialize_with = "null_to_default")]
    pub dimensions: Dimensions,
    pub material: Material,
    #[serde(default = "default_quantity", deserialize_with = "null_to_one")]
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surface_finish: Option<String>,
    #[serde(default, deserialize_with = "null_to_default")]
    pub tolerances: Vec<String>,
    #[serde(default, deserialize_with = "null_to_default")]
    pub manufacturing_process: Vec<String>,
}

/// Wire shape of the extraction response: the specs plus the model's overall
/// confidence in the reading.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawingExtraction {
    #[serde(flatten)]
    pub specs: DrawingSpecs,
    #[serde(default = "default_confidence", deserialize_with = "null_to_half")]
    pub overall_confidence: f64,
}

impl DrawingExtraction {
    /// Enforce the model-data invariants: `quantity >= 1` and every
    /// confidence in [0.0, 1.0]. Out-of-range values from the remote model
    /// are a data-quality anomaly: clamp and warn, never crash.
    pub fn into_normalized(mut self) -> (DrawingSpecs, f64) {
        if self.specs.quantity == 0 {
            tracing::warn!("Model returned quantity 0, clamping to 1");
            self.specs.quantity = 1;
        }
        self.specs.material.confidence = clamp_confidence(self.specs.material.confidence);
        let overall = clamp_confidence(self.overall_confidence);
        (self.specs, overall)
    }
}

pub(crate) fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        tracing::warn!("Model returned NaN confidence, treating as 0");
        0.0
    } else if !(0.0..=1.0).contains(&value) {
        tracing::warn!(value, "Model returned out-of-range confidence, clamping");
        value.clamp(0.0, 1.0)
    } else {
        value
    }
}

fn default_quantity() -> u32 {
    1
}

fn default_confidence() -> f64 {
    0.5
}

// The model occasionally emits explicit `null` where the prompt allows
// omission. Serde's `default` only covers missing keys, so these map
// null to the same defaults.
fn null_to_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_to_one<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u32>::deserialize(deserializer)?.unwrap_or(1))
}

fn null_to_half<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.5))
}

//! Cost estimate produced by the remote model for one set of specs.

use serde::{Deserialize, Deserializer, Serialize};

use super::drawing::clamp_confidence;

/// Manufacturing cost breakdown. All figures are model-generated and
/// unverified; `total` is the model's own figure, not a recomputed sum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostEstimate {
    pub material: f64,
    pub labor: f64,
    pub overhead: f64,
    pub total: f64,
    #[serde(default = "default_confidence", deserialize_with = "null_to_half")]
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl CostEstimate {
    /// Soft invariant: `total ≈ material + labor + overhead`. The model
    /// computes all four figures independently, so drift happens; callers
    /// flag it rather than silently accepting or rejecting the estimate.
    pub fn reconciles(&self, relative_tolerance: f64) -> bool {
        let sum = self.material + self.labor + self.overhead;
        let drift = (self.total - sum).abs();
        drift <= relative_tolerance * sum.abs() + 1.0
    }

    pub fn normalize(mut self) -> Self {
        self.confidence = clamp_confidence(self.confidence);
        if self.material < 0.0 || self.labor < 0.0 || self.overhead < 0.0 || self.total < 0.0 {
            tracing::warn!(
                material = self.material,
                labor = self.labor,
                overhead = self.overhead,
                total = self.total,
                "Model returned a negative cost component"
            );
        }
        if !self.reconciles(0.01) {
            tracing::warn!(
                material = self.material,
                labor = self.labor,
                overhead = self.overhead,
                total = self.total,
                "Cost total does not reconcile with its components"
            );
        }
        self
    }
}

fn default_confidence() -> f64 {
    0.5
}

fn null_to_half<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.5))
}

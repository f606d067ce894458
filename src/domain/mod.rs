//! Domain types for drawing analysis and cost estimation.
//!
//! These mirror the JSON shapes exchanged with the remote vision model and
//! the shapes returned to the browser client.

pub mod analysis;
pub mod costing;
pub mod drawing;

pub use analysis::{next_document_stem, AnalysisResult, UploadedImage};
pub use costing::CostEstimate;
pub use drawing::{DimensionUnit, Dimensions, DrawingExtraction, DrawingSpecs, Material};

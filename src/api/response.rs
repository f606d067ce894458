//! Outbound wire shapes for the success paths.
//!
//! Failures use the uniform envelope in [`crate::error`]; everything here
//! carries `success: true` so the browser client can branch on one flag.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::domain::{AnalysisResult, CostEstimate, DrawingSpecs};

/// Body of a successful `POST /api/upload`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub document_id: String,
    pub filename: String,
    pub analysis: AnalysisBody,
    pub costing: CostEstimate,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct AnalysisBody {
    pub specs: DrawingSpecs,
    pub confidence: f64,
}

impl From<AnalysisResult> for UploadResponse {
    fn from(result: AnalysisResult) -> Self {
        Self {
            success: true,
            document_id: result.document_id,
            filename: result.filename,
            analysis: AnalysisBody {
                specs: result.specs,
                confidence: result.analysis_confidence,
            },
            costing: result.costing,
            message: "Drawing analyzed successfully".to_string(),
        }
    }
}

impl IntoResponse for UploadResponse {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Body of `GET /api/upload/test`.
#[derive(Debug, Serialize)]
pub struct ConnectionTestResponse {
    pub success: bool,
    pub connected: bool,
    pub message: String,
}

impl ConnectionTestResponse {
    pub fn new(connected: bool) -> Self {
        Self {
            success: true,
            connected,
            message: format!(
                "Analysis service is {}",
                if connected { "connected" } else { "not connected" }
            ),
        }
    }
}

impl IntoResponse for ConnectionTestResponse {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub success: bool,
    pub status: String,
    pub timestamp: String,
    pub environment: String,
    pub service: String,
    pub version: String,
}

impl IntoResponse for HealthResponse {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// JSON body for unknown routes.
#[derive(Debug, Serialize)]
pub struct RouteNotFound {
    pub success: bool,
    pub error: String,
    pub path: String,
}

impl RouteNotFound {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            success: false,
            error: "Route not found".to_string(),
            path: path.into(),
        }
    }
}

impl IntoResponse for RouteNotFound {
    fn into_response(self) -> Response {
        (StatusCode::NOT_FOUND, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DimensionUnit, Dimensions, Material};

    #[test]
    fn upload_response_shape() {
        let result = AnalysisResult {
            document_id: "DOC-1-0001".to_string(),
            filename: "drawing-1-0001.jpg".to_string(),
            specs: DrawingSpecs {
                dimensions: Dimensions {
                    length: Some(10.0),
                    unit: DimensionUnit::Mm,
                    ..Default::default()
                },
                material: Material {
                    material_type: "Steel".to_string(),
                    grade: None,
                    specifications: None,
                    confidence: 0.9,
                },
                quantity: 1,
                surface_finish: None,
                tolerances: vec![],
                manufacturing_process: vec![],
            },
            analysis_confidence: 0.8,
            costing: CostEstimate {
                material: 100.0,
                labor: 200.0,
                overhead: 30.0,
                total: 330.0,
                confidence: 0.7,
                reasoning: None,
            },
        };

        let value = serde_json::to_value(UploadResponse::from(result)).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["documentId"], "DOC-1-0001");
        assert_eq!(value["analysis"]["specs"]["quantity"], 1);
        assert_eq!(value["analysis"]["confidence"], 0.8);
        assert_eq!(value["costing"]["total"], 330.0);
        assert_eq!(value["message"], "Drawing analyzed successfully");
    }
}

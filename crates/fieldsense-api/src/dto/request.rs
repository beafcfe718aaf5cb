use fieldsense_core::models::{AnalysisRequest, AreaOfInterest, FieldId};
use serde::Deserialize;

use crate::error::ApiError;

/// Run-analysis request body.
///
/// `farm_id` and `coords` are accepted as aliases for older clients.
#[derive(Debug, Deserialize)]
pub struct RunAnalysisRequest {
    #[serde(default, alias = "farm_id")]
    pub field_id: Option<String>,
    #[serde(default, alias = "coords")]
    pub area_of_interest: Option<serde_json::Value>,
}

impl RunAnalysisRequest {
    /// Validate into a domain request
    pub fn into_domain(self) -> Result<AnalysisRequest, ApiError> {
        let field_id = self.field_id.ok_or_else(|| ApiError::bad_request("Missing field_id"))?;
        let field_id = FieldId::new(field_id)
            .map_err(|e| ApiError::bad_request("Invalid field_id").with_details(e.to_string()))?;

        let geometry = self
            .area_of_interest
            .ok_or_else(|| ApiError::bad_request("Missing area_of_interest"))?;
        let area = AreaOfInterest::from_geojson(&geometry).map_err(|e| {
            ApiError::bad_request("Invalid area_of_interest").with_details(e.to_string())
        })?;

        Ok(AnalysisRequest::new(field_id, area))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn square() -> serde_json::Value {
        json!({
            "type": "Polygon",
            "coordinates": [[[36.8, -1.3], [36.81, -1.3], [36.81, -1.29], [36.8, -1.29], [36.8, -1.3]]]
        })
    }

    #[test]
    fn test_accepts_legacy_names() {
        let body: RunAnalysisRequest =
            serde_json::from_value(json!({ "farm_id": "farm-01", "coords": square() })).unwrap();
        let request = body.into_domain().unwrap();
        assert_eq!(request.field_id.as_str(), "farm-01");
    }

    #[test]
    fn test_missing_field_id() {
        let body: RunAnalysisRequest =
            serde_json::from_value(json!({ "area_of_interest": square() })).unwrap();
        let err = body.into_domain().unwrap_err();
        assert_eq!(err.message, "Missing field_id");
    }

    #[test]
    fn test_blank_field_id() {
        let body: RunAnalysisRequest =
            serde_json::from_value(json!({ "field_id": "  ", "area_of_interest": square() })).unwrap();
        assert!(body.into_domain().is_err());
    }

    #[test]
    fn test_point_is_rejected() {
        let body: RunAnalysisRequest = serde_json::from_value(json!({
            "field_id": "farm-01",
            "area_of_interest": { "type": "Point", "coordinates": [36.8, -1.3] }
        }))
        .unwrap();
        let err = body.into_domain().unwrap_err();
        assert_eq!(err.message, "Invalid area_of_interest");
    }
}

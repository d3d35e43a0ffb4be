//! 通过大模型补充地点信息（尽力而为）。
//!
//! 每次增强并发发出三个独立请求。某个响应无法解析时只丢弃对应片段，
//! 其余片段照常合并。

pub mod fragment;
mod provider;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::geo::Coordinate;
use crate::models::Location;

pub use fragment::{Fragment, Validate};
pub use provider::{CompletionRequest, LlmError, LlmProvider, OpenAiProvider};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinateFragment {
    #[serde(default)]
    pub refined_coordinates: Option<Coordinate>,
    #[serde(default)]
    pub confidence_score: Option<f64>,
    #[serde(default)]
    pub verified_address: Option<String>,
}

impl Validate for CoordinateFragment {
    fn validate(&self) -> Result<(), String> {
        if let Some(coordinates) = &self.refined_coordinates {
            coordinates.validate().map_err(|e| e.to_string())?;
        }
        match self.confidence_score {
            Some(score) if !(0.0..=1.0).contains(&score) => {
                Err(format!("confidence score {score} is outside [0, 1]"))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptionFragment {
    #[serde(default)]
    pub enhanced_description: Option<String>,
    #[serde(default)]
    pub historical_facts: Vec<String>,
    #[serde(default)]
    pub visitor_tips: Vec<String>,
    #[serde(default)]
    pub cultural_context: Option<String>,
}

impl Validate for DescriptionFragment {
    fn validate(&self) -> Result<(), String> {
        let empty = self.enhanced_description.is_none()
            && self.cultural_context.is_none()
            && self.historical_facts.is_empty()
            && self.visitor_tips.is_empty();
        if empty {
            Err("description response has no usable fields".to_string())
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RadiusFragment {
    pub suggested_radius: f64,
}

impl Validate for RadiusFragment {
    fn validate(&self) -> Result<(), String> {
        if self.suggested_radius.is_finite() && self.suggested_radius > 0.0 {
            Ok(())
        } else {
            Err(format!("suggested radius {} is not positive", self.suggested_radius))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentError {
    pub fragment: String,
    pub reason: String,
}

/// 三个片段合并后的结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationEnhancement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refined_coordinates: Option<Coordinate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhanced_description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub historical_facts: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub visitor_tips: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cultural_context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_radius: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fragment_errors: Vec<FragmentError>,
}

impl LocationEnhancement {
    pub fn is_empty(&self) -> bool {
        self.refined_coordinates.is_none()
            && self.confidence_score.is_none()
            && self.verified_address.is_none()
            && self.enhanced_description.is_none()
            && self.historical_facts.is_empty()
            && self.visitor_tips.is_empty()
            && self.cultural_context.is_none()
            && self.suggested_radius.is_none()
    }

    /// 只覆盖本次拿到的字段；地址仅在原本为空时填写
    pub fn apply_to(&self, location: &mut Location, at: DateTime<Utc>) {
        if let Some(coordinates) = self.refined_coordinates {
            location.ai_refined_coordinates = Some(coordinates);
        }
        if let Some(score) = self.confidence_score {
            location.confidence_score = Some(score);
        }
        if location.address.is_none() {
            location.address = self.verified_address.clone();
        }
        if let Some(description) = &self.enhanced_description {
            location.ai_enhanced_description = Some(description.clone());
        }
        if !self.historical_facts.is_empty() {
            location.historical_facts = self.historical_facts.clone();
        }
        if !self.visitor_tips.is_empty() {
            location.visitor_tips = self.visitor_tips.clone();
        }
        if let Some(context) = &self.cultural_context {
            location.cultural_context = Some(context.clone());
        }
        if let Some(radius) = self.suggested_radius {
            location.ai_suggested_radius = Some(radius);
        }
        location.last_ai_update = Some(at);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinateValidation {
    pub is_valid: bool,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_correction: Option<Coordinate>,
}

impl CoordinateValidation {
    /// 模型不可用时的保守默认值
    pub fn conservative() -> Self {
        Self {
            is_valid: true,
            confidence: 0.5,
            suggested_correction: None,
        }
    }
}

impl Validate for CoordinateValidation {
    fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!("confidence {} is outside [0, 1]", self.confidence));
        }
        if let Some(c) = &self.suggested_correction {
            c.validate().map_err(|e| e.to_string())?;
        }
        Ok(())
    }
}

pub struct LocationEnhancer {
    provider: Arc<dyn LlmProvider>,
    region: String,
}

impl LocationEnhancer {
    pub fn new(provider: Arc<dyn LlmProvider>, region: impl Into<String>) -> Self {
        Self {
            provider,
            region: region.into(),
        }
    }

    fn coordinate_prompt(&self, location: &Location) -> String {
        format!(
            r#"Given this location in {region}:

Name: {name}
Current Coordinates: {lat}, {lng}
Category: {category}
Description: {description}
Address: {address}

Provide more precise coordinates if the current ones look inaccurate, a confidence score between 0 and 1 for the coordinate accuracy, and a verified address.

Return ONLY a JSON object with this exact structure:
{{"refinedCoordinates": {{"lat": number, "lng": number}}, "confidenceScore": number, "verifiedAddress": "string"}}"#,
            region = self.region,
            name = location.name,
            lat = location.coordinates.lat,
            lng = location.coordinates.lng,
            category = location.category,
            description = location.description,
            address = location.address.as_deref().unwrap_or("Not provided"),
        )
    }

    fn description_prompt(&self, location: &Location) -> String {
        format!(
            r#"Enhance this location description for a treasure hunting game in {region}:

Name: {name}
Category: {category}
Current Description: {description}

Provide an enriched description with historical and cultural context, 3 historical facts, 3 practical visitor tips and the cultural significance for the local community.

Return ONLY a JSON object with this exact structure:
{{"enhancedDescription": "string", "historicalFacts": ["string"], "visitorTips": ["string"], "culturalContext": "string"}}"#,
            region = self.region,
            name = location.name,
            category = location.category,
            description = location.description,
        )
    }

    fn radius_prompt(&self, location: &Location) -> String {
        format!(
            r#"Suggest a check-in radius in meters for this location:

Name: {name}
Category: {category}
Description: {description}

Consider the size of the place, the typical visit, safety and the check-in game mechanics.

Return ONLY a JSON object with this exact structure:
{{"suggestedRadius": number}}"#,
            name = location.name,
            category = location.category,
            description = location.description,
        )
    }

    pub async fn enhance(&self, location: &Location) -> LocationEnhancement {
        let (coordinates, description, radius) = tokio::join!(
            self.provider.complete(CompletionRequest {
                prompt: self.coordinate_prompt(location),
                temperature: 0.3,
                max_tokens: 500,
            }),
            self.provider.complete(CompletionRequest {
                prompt: self.description_prompt(location),
                temperature: 0.7,
                max_tokens: 800,
            }),
            self.provider.complete(CompletionRequest {
                prompt: self.radius_prompt(location),
                temperature: 0.4,
                max_tokens: 200,
            }),
        );

        let mut enhancement = LocationEnhancement::default();

        match fragment::decode::<CoordinateFragment>(coordinates) {
            Fragment::Parsed(f) => {
                enhancement.refined_coordinates = f.refined_coordinates;
                enhancement.confidence_score = f.confidence_score;
                enhancement.verified_address = f.verified_address;
            }
            Fragment::Invalid(reason) | Fragment::Failed(reason) => {
                enhancement.record_failure(&location.id, "coordinates", reason);
            }
        }

        match fragment::decode::<DescriptionFragment>(description) {
            Fragment::Parsed(f) => {
                enhancement.enhanced_description = f.enhanced_description;
                enhancement.historical_facts = f.historical_facts;
                enhancement.visitor_tips = f.visitor_tips;
                enhancement.cultural_context = f.cultural_context;
            }
            Fragment::Invalid(reason) | Fragment::Failed(reason) => {
                enhancement.record_failure(&location.id, "description", reason);
            }
        }

        match fragment::decode::<RadiusFragment>(radius) {
            Fragment::Parsed(f) => enhancement.suggested_radius = Some(f.suggested_radius),
            Fragment::Invalid(reason) | Fragment::Failed(reason) => {
                enhancement.record_failure(&location.id, "radius", reason);
            }
        }

        enhancement
    }

    pub async fn enhance_all(&self, locations: &[Location]) -> Vec<(String, LocationEnhancement)> {
        join_all(locations.iter().map(|location| async move {
            (location.id.clone(), self.enhance(location).await)
        }))
        .await
    }

    pub async fn validate_coordinates(&self, coordinates: Coordinate, name: &str) -> CoordinateValidation {
        let prompt = format!(
            r#"Validate these coordinates for "{name}" in {region}:

Coordinates: {lat}, {lng}

Check whether the coordinates are reasonable for this place. Include a suggested correction only if they are not.

Return ONLY a JSON object with this exact structure:
{{"isValid": boolean, "confidence": number, "suggestedCorrection": {{"lat": number, "lng": number}}}}"#,
            region = self.region,
            lat = coordinates.lat,
            lng = coordinates.lng,
        );

        let response = self
            .provider
            .complete(CompletionRequest {
                prompt,
                temperature: 0.1,
                max_tokens: 300,
            })
            .await;

        match fragment::decode::<CoordinateValidation>(response) {
            Fragment::Parsed(validation) => validation,
            Fragment::Invalid(reason) | Fragment::Failed(reason) => {
                tracing::warn!("Coordinate validation for {} degraded: {}", name, reason);
                CoordinateValidation::conservative()
            }
        }
    }
}

impl LocationEnhancement {
    fn record_failure(&mut self, location_id: &str, fragment: &str, reason: String) {
        tracing::warn!(
            "AI {} fragment for location {} dropped: {}",
            fragment,
            location_id,
            reason
        );
        self.fragment_errors.push(FragmentError {
            fragment: fragment.to_string(),
            reason,
        });
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedProvider;
    use super::*;
    use crate::store::seed;

    fn enhancer(provider: ScriptedProvider) -> (LocationEnhancer, Arc<ScriptedProvider>) {
        let provider = Arc::new(provider);
        (
            LocationEnhancer::new(provider.clone(), "Vale do Capão, BA, Brazil"),
            provider,
        )
    }

    #[tokio::test]
    async fn merges_all_three_fragments() {
        let (enhancer, provider) = enhancer(ScriptedProvider::well_behaved());
        let location = &seed::locations()[0];

        let enhancement = enhancer.enhance(location).await;
        assert_eq!(
            enhancement.refined_coordinates,
            Some(Coordinate::new(-14.0643, -41.3026))
        );
        assert_eq!(enhancement.confidence_score, Some(0.92));
        assert_eq!(enhancement.historical_facts.len(), 3);
        assert_eq!(enhancement.suggested_radius, Some(75.0));
        assert!(enhancement.fragment_errors.is_empty());

        let calls = provider.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        let mut temperatures: Vec<f32> = calls.iter().map(|c| c.temperature).collect();
        temperatures.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(temperatures, vec![0.3, 0.4, 0.7]);
    }

    #[tokio::test]
    async fn malformed_fragment_keeps_the_others() {
        let mut provider = ScriptedProvider::well_behaved();
        provider.coordinates = Some("{\"refinedCoordinates\": {\"lat\": -14.06,".into());
        provider.radius = Some(r#"{"suggestedRadius": -10}"#.into());
        let (enhancer, _) = enhancer(provider);

        let enhancement = enhancer.enhance(&seed::locations()[1]).await;
        assert!(enhancement.refined_coordinates.is_none());
        assert!(enhancement.suggested_radius.is_none());
        assert_eq!(enhancement.enhanced_description.as_deref(), Some("A sweeping view"));

        let failed: Vec<_> = enhancement
            .fragment_errors
            .iter()
            .map(|e| e.fragment.as_str())
            .collect();
        assert_eq!(failed, vec!["coordinates", "radius"]);
    }

    #[tokio::test]
    async fn out_of_range_confidence_is_rejected() {
        let mut provider = ScriptedProvider::well_behaved();
        provider.coordinates = Some(r#"{"confidenceScore": 7}"#.into());
        let (enhancer, _) = enhancer(provider);

        let enhancement = enhancer.enhance(&seed::locations()[0]).await;
        assert!(enhancement.confidence_score.is_none());
        assert_eq!(enhancement.fragment_errors.len(), 1);
    }

    #[tokio::test]
    async fn provider_down_yields_empty_enhancement() {
        let (enhancer, _) = enhancer(ScriptedProvider::default());
        let enhancement = enhancer.enhance(&seed::locations()[0]).await;
        assert!(enhancement.is_empty());
        assert_eq!(enhancement.fragment_errors.len(), 3);
    }

    #[tokio::test]
    async fn validation_falls_back_to_conservative_default() {
        let (good, _) = enhancer(ScriptedProvider::well_behaved());
        let result = good
            .validate_coordinates(Coordinate::new(-14.0, -41.0), "Rodas")
            .await;
        assert!(!result.is_valid);
        assert!(result.suggested_correction.is_some());

        let (down, _) = enhancer(ScriptedProvider::default());
        let result = down
            .validate_coordinates(Coordinate::new(-14.0, -41.0), "Rodas")
            .await;
        assert_eq!(result, CoordinateValidation::conservative());
    }

    #[test]
    fn apply_keeps_existing_fields() {
        let mut location = seed::locations()[5].clone();
        let address = location.address.clone();
        location.visitor_tips = vec!["bring cash".into()];

        let enhancement = LocationEnhancement {
            confidence_score: Some(0.4),
            verified_address: Some("somewhere else".into()),
            ..Default::default()
        };
        let at = Utc::now();
        enhancement.apply_to(&mut location, at);

        assert_eq!(location.confidence_score, Some(0.4));
        assert_eq!(location.address, address);
        assert_eq!(location.visitor_tips, vec!["bring cash".to_string()]);
        assert_eq!(location.last_ai_update, Some(at));
    }
}

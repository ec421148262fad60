use crate::category::Category;
use batcher::ResultMap;
use serde::Serialize;

/// Raw key lists of one aggregation request, as received in the query string.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AggregationRequest {
    pub pricing: Option<String>,
    pub shipments: Option<String>,
    pub track: Option<String>,
}

impl AggregationRequest {
    /// Parses `pricing`, `shipments` and `track` out of a query string.
    /// A repeated parameter has its values joined with a comma, other
    /// parameters are ignored.
    pub fn from_query(query: Option<&str>) -> Self {
        let mut request = Self::default();
        let Some(query) = query else {
            return request;
        };

        for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let Some(category) = Category::from_query_param(&name) else {
                continue;
            };
            let slot = request.param_mut(category);
            match slot {
                Some(existing) => {
                    existing.push_str(batcher::PARAMS_SEPARATOR);
                    existing.push_str(&value);
                }
                None => *slot = Some(value.into_owned()),
            }
        }
        request
    }

    pub fn param(&self, category: Category) -> Option<&str> {
        match category {
            Category::Pricing => self.pricing.as_deref(),
            Category::Shipments => self.shipments.as_deref(),
            Category::Tracking => self.track.as_deref(),
        }
    }

    fn param_mut(&mut self, category: Category) -> &mut Option<String> {
        match category {
            Category::Pricing => &mut self.pricing,
            Category::Shipments => &mut self.shipments,
            Category::Tracking => &mut self.track,
        }
    }
}

/// Result of one aggregation. A category that was not requested is `null`,
/// a key that could not be resolved in time maps to `null`.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AggregationResponse {
    pub pricing: Option<ResultMap<f64>>,
    pub tracking: Option<ResultMap<String>>,
    pub shipments: Option<ResultMap<Vec<String>>>,
}

impl AggregationResponse {
    pub fn is_complete(&self) -> bool {
        self.pricing.as_ref().is_none_or(ResultMap::is_complete)
            && self.tracking.as_ref().is_none_or(ResultMap::is_complete)
            && self.shipments.as_ref().is_none_or(ResultMap::is_complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_query() {
        let request = AggregationRequest::from_query(Some(
            "pricing=NL,CN&track=1%2C2&other=x&shipments=",
        ));
        assert_eq!(request.pricing.as_deref(), Some("NL,CN"));
        assert_eq!(request.track.as_deref(), Some("1,2"));
        assert_eq!(request.shipments.as_deref(), Some(""));

        let request = AggregationRequest::from_query(Some("pricing=NL&pricing=CN"));
        assert_eq!(request.param(Category::Pricing), Some("NL,CN"));

        assert_eq!(
            AggregationRequest::from_query(None),
            AggregationRequest::default()
        );
    }

    #[test]
    fn test_response_json_shape() {
        let mut pricing = ResultMap::new(["NL", "CN"]);
        pricing.fill_from(|k| (k == "NL").then_some(14.24));

        let response = AggregationResponse {
            pricing: Some(pricing),
            ..Default::default()
        };
        assert!(!response.is_complete());

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(
            json,
            json!({
                "pricing": {"NL": 14.24, "CN": null},
                "tracking": null,
                "shipments": null,
            })
        );
    }
}

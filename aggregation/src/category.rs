/// Lookup categories served by the aggregation endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    Pricing,
    Shipments,
    Tracking,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Pricing, Category::Shipments, Category::Tracking];

    /// Query parameter on `/aggregation` and path segment on the upstream.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Pricing => "pricing",
            Category::Shipments => "shipments",
            Category::Tracking => "track",
        }
    }

    pub fn from_query_param(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }

    pub fn executor_name(&self) -> &'static str {
        match self {
            Category::Pricing => "Pricing",
            Category::Shipments => "Shipments",
            Category::Tracking => "Track",
        }
    }
}

use serde::{Serialize, Serializer};

/// One scraped apartment. Zero means the field was missing or did not parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Apartment {
    #[serde(rename = "id")]
    pub reference: u64,
    pub rooms: u32,
    pub area: u32,
    pub rent: u64,
    #[serde(serialize_with = "fixed_point")]
    pub latitude: f64,
    #[serde(serialize_with = "fixed_point")]
    pub longitude: f64,
}

/// An index page as fetched by the frontier. `html` is empty when the fetch failed.
#[derive(Debug, Clone)]
pub struct IndexPage {
    pub url: String,
    pub html: String,
}

fn fixed_point<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{value:.6}"))
}

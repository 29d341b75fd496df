//! Upstream tile server description.

use super::template::UrlTemplate;
use crate::coord::TileCoord;

/// One upstream tile server.
///
/// Immutable after construction; health state lives in the
/// [`ServerPool`](crate::pool::ServerPool), not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEndpoint {
    name: String,
    template: UrlTemplate,
    weight: u32,
    headers: Vec<(String, String)>,
}

impl ServerEndpoint {
    /// Creates an endpoint named after the template's host, with weight 1.
    pub fn new(template: UrlTemplate) -> Self {
        Self {
            name: template.host().to_string(),
            template,
            weight: 1,
            headers: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the selection weight; values below 1 are raised to 1.
    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight.max(1);
        self
    }

    /// Adds a static header sent with every request to this server.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn template(&self) -> &UrlTemplate {
        &self.template
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Request URL for a tile.
    pub fn url_for(&self, tile: &TileCoord) -> String {
        self.template.render(tile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_template() {
        let endpoint =
            ServerEndpoint::new(UrlTemplate::parse("https://b.tile.test/{z}/{x}/{y}.png").unwrap());
        assert_eq!(endpoint.name(), "b.tile.test");
        assert_eq!(endpoint.weight(), 1);
        assert!(endpoint.headers().is_empty());
    }

    #[test]
    fn test_weight_floor_is_one() {
        let endpoint =
            ServerEndpoint::new(UrlTemplate::parse("https://t.test/{z}/{x}/{y}").unwrap())
                .with_weight(0);
        assert_eq!(endpoint.weight(), 1);
    }

    #[test]
    fn test_builder() {
        let endpoint =
            ServerEndpoint::new(UrlTemplate::parse("https://t.test/{z}/{x}/{y}.png").unwrap())
                .with_name("CartoDB Light")
                .with_weight(3)
                .with_header("User-Agent", "tilehoard-test");
        assert_eq!(endpoint.name(), "CartoDB Light");
        assert_eq!(endpoint.weight(), 3);
        assert_eq!(
            endpoint.headers(),
            &[("User-Agent".to_string(), "tilehoard-test".to_string())]
        );
        assert_eq!(
            endpoint.url_for(&TileCoord { z: 1, x: 0, y: 1 }),
            "https://t.test/1/0/1.png"
        );
    }
}

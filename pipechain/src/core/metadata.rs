//! Read-only map, layer and service metadata shared by all stages of a run.

use serde::{Deserialize, Serialize};

/// The map a pipeline was created for.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MapInfo {
    /// Map identifier.
    pub id: String,
    /// Human readable label.
    pub label: String,
    /// Spatial reference system code (e.g. "EPSG:4326").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub srs: Option<String>,
}

impl MapInfo {
    /// Creates a new map description.
    #[must_use]
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            srs: None,
        }
    }

    /// Sets the spatial reference system.
    #[must_use]
    pub fn with_srs(mut self, srs: impl Into<String>) -> Self {
        self.srs = Some(srs.into());
        self
    }
}

/// A layer of the map that feeds the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LayerInfo {
    /// Layer identifier.
    pub id: String,
    /// Human readable label.
    pub label: String,
    /// Spatial reference system of the layer data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub srs: Option<String>,
    /// Z-order of the layer inside its map; lower draws first.
    #[serde(default)]
    pub order_key: i32,
}

impl LayerInfo {
    /// Creates a new layer description.
    #[must_use]
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            srs: None,
            order_key: 0,
        }
    }

    /// Sets the spatial reference system.
    #[must_use]
    pub fn with_srs(mut self, srs: impl Into<String>) -> Self {
        self.srs = Some(srs.into());
        self
    }

    /// Sets the z-order key.
    #[must_use]
    pub const fn with_order_key(mut self, order_key: i32) -> Self {
        self.order_key = order_key;
        self
    }
}

/// The data service backing the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    /// Service identifier.
    pub id: String,
    /// Service type (e.g. "WMS", "WFS").
    pub service_type: String,
    /// Path the service is published under.
    #[serde(default)]
    pub path_spec: String,
    /// Supported spatial reference systems.
    #[serde(default)]
    pub srs: Vec<String>,
    /// Whether the service is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl ServiceInfo {
    /// Creates a new service description.
    #[must_use]
    pub fn new(id: impl Into<String>, service_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            service_type: service_type.into(),
            path_spec: String::new(),
            srs: Vec::new(),
            enabled: true,
        }
    }

    /// Sets the path spec.
    #[must_use]
    pub fn with_path_spec(mut self, path_spec: impl Into<String>) -> Self {
        self.path_spec = path_spec.into();
        self
    }

    /// Adds a supported spatial reference system.
    #[must_use]
    pub fn with_srs(mut self, srs: impl Into<String>) -> Self {
        self.srs.push(srs.into());
        self
    }

    /// Marks the service as disabled.
    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Checks the service type, ignoring case.
    #[must_use]
    pub fn is_service_type(&self, service_type: &str) -> bool {
        self.service_type.eq_ignore_ascii_case(service_type)
    }
}

/// Metadata identifying what a pipeline serves.
///
/// Processors read it through their stage context; the executor never
/// looks at it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PipelineMetadata {
    /// The owning map.
    pub map: MapInfo,
    /// Layers processed by the pipeline.
    #[serde(default)]
    pub layers: Vec<LayerInfo>,
    /// The associated service, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceInfo>,
}

impl PipelineMetadata {
    /// Creates metadata for the given map with no layers or service.
    #[must_use]
    pub fn new(map: MapInfo) -> Self {
        Self {
            map,
            layers: Vec::new(),
            service: None,
        }
    }

    /// Adds a layer.
    #[must_use]
    pub fn with_layer(mut self, layer: LayerInfo) -> Self {
        self.layers.push(layer);
        self
    }

    /// Sets the service.
    #[must_use]
    pub fn with_service(mut self, service: ServiceInfo) -> Self {
        self.service = Some(service);
        self
    }

    /// Finds a layer by id.
    #[must_use]
    pub fn layer(&self, id: &str) -> Option<&LayerInfo> {
        self.layers.iter().find(|l| l.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_builder() {
        let meta = PipelineMetadata::new(MapInfo::new("m1", "City").with_srs("EPSG:31468"))
            .with_layer(LayerInfo::new("roads", "Roads").with_order_key(2))
            .with_layer(LayerInfo::new("parcels", "Parcels"))
            .with_service(ServiceInfo::new("svc", "WMS").with_srs("EPSG:4326"));

        assert_eq!(meta.map.srs.as_deref(), Some("EPSG:31468"));
        assert_eq!(meta.layers.len(), 2);
        assert_eq!(meta.layer("roads").map(|l| l.order_key), Some(2));
        assert!(meta.layer("missing").is_none());
        assert!(meta.service.as_ref().unwrap().is_service_type("wms"));
    }

    #[test]
    fn test_service_defaults_on_deserialize() {
        let svc: ServiceInfo =
            serde_json::from_str(r#"{"id": "s", "service_type": "WFS"}"#).unwrap();
        assert!(svc.enabled);
        assert!(svc.srs.is_empty());
        assert!(!svc.clone().disabled().enabled);
    }
}

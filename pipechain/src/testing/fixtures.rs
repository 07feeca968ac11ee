//! Test fixtures for building pipelines.

use super::TerminalProcessor;
use crate::core::{LayerInfo, MapInfo, PipelineMetadata, ServiceInfo};
use crate::pipeline::Pipeline;
use crate::processors::PassThroughProcessor;

/// Metadata for a small two-layer map served by one WMS.
#[must_use]
pub fn sample_metadata() -> PipelineMetadata {
    PipelineMetadata::new(MapInfo::new("map-test", "Test map").with_srs("EPSG:4326"))
        .with_layer(LayerInfo::new("roads", "Roads").with_order_key(1))
        .with_layer(LayerInfo::new("rivers", "Rivers").with_order_key(2))
        .with_service(ServiceInfo::new("wms-test", "WMS").with_path_spec("http://localhost/wms"))
}

/// Builds a chain of `len - 1` pass-through stages ending in a terminal
/// stage that answers with `responses`.
///
/// # Panics
///
/// Panics if `len` is zero.
#[must_use]
pub fn forwarding_chain(len: usize, responses: &[&str]) -> Pipeline<String, String> {
    assert!(len > 0, "a forwarding chain needs at least one stage");
    let mut builder = Pipeline::builder(format!("chain-{len}")).metadata(sample_metadata());
    for i in 0..len - 1 {
        builder = builder.processor(PassThroughProcessor::new(format!("pass-{i}")));
    }
    let terminal = TerminalProcessor::new("terminal")
        .with_responses(responses.iter().map(|r| (*r).to_string()).collect());
    match builder.processor(terminal).build() {
        Ok(pipeline) => pipeline,
        Err(err) => panic!("fixture pipeline is invalid: {err}"),
    }
}

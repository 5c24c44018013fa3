use std::path::Path;

use crate::error::{DriverError, DriverResult};
use crate::geo::srs::SpatialReference;
use crate::raster::RasterDataset;

/// Where the dataset's spatial reference came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SrsSource {
    Embedded,
    GroundControlPoints,
    Sidecar,
}

/// Resolve the dataset's spatial reference: embedded projection first, then
/// the GCP projection when GCPs exist, then a `.prj` file next to
/// `source_name`.
pub(crate) fn resolve_srs(
    dataset: &dyn RasterDataset,
    source_name: &str,
    read_sidecar: impl Fn(&Path) -> Option<String>,
) -> DriverResult<(SpatialReference, SrsSource)> {
    let mut definition = dataset.projection().map(|p| (p, SrsSource::Embedded));

    if definition.is_none() && dataset.gcp_count() > 0 {
        definition = dataset
            .gcp_projection()
            .map(|p| (p, SrsSource::GroundControlPoints));
    }

    if let Some((srs, from)) = definition
        .as_ref()
        .and_then(|(text, from)| SpatialReference::parse(text).map(|srs| (srs, *from)))
    {
        return Ok((srs, from));
    }

    if !source_name.is_empty() {
        let prj = Path::new(source_name).with_extension("prj");
        if let Some(srs) = read_sidecar(&prj).and_then(|text| SpatialReference::parse(text.trim())) {
            tracing::debug!("Read spatial reference for {} from {}", source_name, prj.display());
            return Ok((srs, SrsSource::Sidecar));
        }
    }

    Err(DriverError::unavailable(format!(
        "Dataset has no spatial reference information ({})",
        source_name
    )))
}

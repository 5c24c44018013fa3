use std::sync::Arc;

use crate::config::SourceOptions;
use crate::error::{DriverError, DriverResult};
use crate::raster::{RasterDataset, RasterLibrary};

/// A dataset handle the driver either closes itself or shares with the
/// caller that supplied it.
pub(crate) enum DatasetHandle {
    Owned(Box<dyn RasterDataset>),
    Borrowed(Arc<dyn RasterDataset>),
}

impl DatasetHandle {
    pub(crate) fn get(&self) -> &dyn RasterDataset {
        match self {
            DatasetHandle::Owned(ds) => ds.as_ref(),
            DatasetHandle::Borrowed(ds) => ds.as_ref(),
        }
    }
}

/// Open the dataset named by `options`, descending into a sub-dataset when
/// the name resolves to a container.
pub(crate) fn open_source(
    library: &dyn RasterLibrary,
    options: &SourceOptions,
) -> DriverResult<DatasetHandle> {
    let name = options.source_name().ok_or_else(|| {
        DriverError::Configuration("No URI, connection string or dataset specified".to_string())
    })?;

    let container = library
        .open(name)
        .map_err(|e| DriverError::unavailable(format!("Failed to open {} ({})", name, e)))?;

    let sub_datasets = container.sub_dataset_names();
    if sub_datasets.is_empty() {
        return Ok(DatasetHandle::Owned(container));
    }

    let index = select_sub_dataset(options.sub_dataset, sub_datasets.len());
    let sub_name = &sub_datasets[index - 1];
    tracing::debug!(
        "{} has {} sub-datasets, opening #{}: {}",
        name,
        sub_datasets.len(),
        index,
        sub_name
    );

    drop(container);
    let dataset = library
        .open(sub_name)
        .map_err(|e| DriverError::unavailable(format!("Failed to open {} ({})", sub_name, e)))?;
    Ok(DatasetHandle::Owned(dataset))
}

/// 1-based sub-dataset index; anything out of range falls back to the first.
pub(crate) fn select_sub_dataset(requested: Option<usize>, count: usize) -> usize {
    match requested {
        Some(n) if n >= 1 && n <= count => n,
        _ => 1,
    }
}

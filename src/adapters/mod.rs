// Adapters layer: concrete implementations of the domain ports (storage, regions, raster backend, zonal statistics).

pub mod http;
pub mod regions;
pub mod storage;
pub mod zonal;

pub use http::{BackendSettings, HttpRasterBackend};
pub use regions::{open_region_source, CatalogRegionSource, FileRegionSource};
pub use storage::LocalStorage;
pub use zonal::GridZonalStatistics;

pub mod aggregator;
pub mod calendar;
pub mod decompose;
pub mod export;
pub mod orchestrator;

pub use crate::domain::model::{AggregatedWindow, ReducedRaster, RegionSet, TimeSeries, TimeSeriesRow};
pub use crate::domain::period::{CalendarWindow, Granularity, LabeledWindow, PeriodLabel};
pub use crate::domain::ports::{RasterBackend, RegionSource, Storage, ZonalStatistics};
pub use crate::utils::error::Result;

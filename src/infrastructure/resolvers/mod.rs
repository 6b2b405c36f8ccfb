pub mod dataset;
pub mod instrument_resolver;

pub use dataset::{DatasetIndex, DatasetInfo, InstrumentDataset};
pub use instrument_resolver::{InstrumentResolver, ResolverCacheInfo, ResolverStats};

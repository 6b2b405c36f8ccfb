pub mod holding;
pub mod instrument;
pub mod market;
pub mod prediction;

pub mod confidence;
pub mod match_kind;
pub mod portfolio_schema;
pub mod similarity;
pub mod symbol;

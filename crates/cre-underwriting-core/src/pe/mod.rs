pub mod waterfall;

pub use waterfall::{compute_waterfall, distribute_cash_flows, WaterfallResults, WaterfallStructure};

pub mod assumptions;
pub mod debt_sizing;
pub mod financing;
pub mod pro_forma;
pub mod sources_uses;

pub use assumptions::{Assumptions, CapitalSource, ProFormaOptions, SourceKind};
pub use pro_forma::{compute_pro_forma, ProFormaResult};

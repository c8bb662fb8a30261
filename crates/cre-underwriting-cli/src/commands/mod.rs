pub mod debt;
pub mod irr;
pub mod pro_forma;
pub mod sensitivity;
pub mod stress;
pub mod waterfall;

use serde::Deserialize;
use serde_json::Value;

use cre_underwriting_core::real_estate::assumptions::{
    Assumptions, CapitalSource, DevelopmentBudget, ProFormaOptions,
};

/// A deal document: `{ assumptions, capital_sources?, development_budget? }`.
#[derive(Debug, Deserialize)]
struct DealDocument {
    assumptions: Assumptions,
    #[serde(default)]
    capital_sources: Option<Vec<CapitalSource>>,
    #[serde(default)]
    development_budget: Option<DevelopmentBudget>,
}

/// Split a deal document into assumptions and pro forma options. A document
/// without an `assumptions` key is read as bare assumptions.
pub(crate) fn parse_deal(value: Value) -> Result<(Assumptions, ProFormaOptions), Box<dyn std::error::Error>> {
    if value.get("assumptions").is_some() {
        let doc: DealDocument = serde_json::from_value(value)?;
        let options = ProFormaOptions {
            capital_sources: doc.capital_sources,
            development_budget: doc.development_budget,
        };
        Ok((doc.assumptions, options))
    } else {
        let assumptions: Assumptions = serde_json::from_value(value)?;
        Ok((assumptions, ProFormaOptions::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_wrapped_document() {
        let value = serde_json::json!({
            "assumptions": { "acquisition": { "purchase_price": "1000000" } },
            "capital_sources": [
                { "source_kind": "DEBT", "amount": "600000" },
                { "source_kind": "LP_EQUITY", "amount": "400000" }
            ]
        });
        let (assumptions, options) = parse_deal(value).unwrap();
        assert_eq!(assumptions.acquisition.purchase_price, dec!(1000000));
        assert_eq!(options.capital_sources.unwrap().len(), 2);
    }

    #[test]
    fn test_parse_bare_assumptions() {
        let value = serde_json::json!({ "buildable_sf": "12000" });
        let (assumptions, options) = parse_deal(value).unwrap();
        assert_eq!(assumptions.buildable_sf, dec!(12000));
        assert_eq!(options, ProFormaOptions::default());
    }
}

// 💷 Tax Rates - VAT codes applied to line items
//
// Each line either names a tax code explicitly or falls back to the
// table's standard rate.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxRate {
    pub id: String,

    /// Display name, e.g. "Standard 20%"
    pub name: String,

    /// Percentage, e.g. 20.0 for 20%
    pub rate: f64,

    /// Marks the rate used for lines without an explicit tax code
    #[serde(default)]
    pub is_standard: bool,
}

impl TaxRate {
    pub fn new(id: &str, name: &str, rate: f64) -> Self {
        TaxRate {
            id: id.to_string(),
            name: name.to_string(),
            rate,
            is_standard: false,
        }
    }

    pub fn standard(id: &str, name: &str, rate: f64) -> Self {
        TaxRate {
            is_standard: true,
            ..TaxRate::new(id, name, rate)
        }
    }

    pub fn is_zero_rated(&self) -> bool {
        self.rate == 0.0
    }
}

/// Lookup table for tax rates with a designated standard rate.
#[derive(Debug, Clone, Default)]
pub struct TaxRateTable {
    rates: Vec<TaxRate>,
    standard_id: Option<String>,
}

impl TaxRateTable {
    pub fn new() -> Self {
        TaxRateTable::default()
    }

    /// Build a table; the first rate flagged `is_standard` becomes the standard rate.
    pub fn from_rates(rates: Vec<TaxRate>) -> Self {
        let mut table = TaxRateTable::new();
        for rate in rates {
            table.register(rate);
        }
        table
    }

    pub fn register(&mut self, rate: TaxRate) {
        if rate.is_standard && self.standard_id.is_none() {
            self.standard_id = Some(rate.id.clone());
        }
        match self.rates.iter_mut().find(|r| r.id == rate.id) {
            Some(existing) => *existing = rate,
            None => self.rates.push(rate),
        }
    }

    /// Override the standard rate (e.g. from configuration). Unknown ids are ignored.
    pub fn set_standard(&mut self, id: &str) -> bool {
        if self.find_by_id(id).is_some() {
            self.standard_id = Some(id.to_string());
            true
        } else {
            false
        }
    }

    pub fn find_by_id(&self, id: &str) -> Option<&TaxRate> {
        self.rates.iter().find(|r| r.id == id)
    }

    pub fn standard(&self) -> Option<&TaxRate> {
        self.standard_id.as_deref().and_then(|id| self.find_by_id(id))
    }

    /// Resolve the rate for a line's tax code.
    ///
    /// Missing or unknown codes fall back to the standard rate; `None` when
    /// there is no standard rate either.
    pub fn rate_for(&self, tax_code_id: Option<&str>) -> Option<&TaxRate> {
        tax_code_id
            .filter(|id| !id.trim().is_empty())
            .and_then(|id| self.find_by_id(id))
            .or_else(|| self.standard())
    }

    pub fn all(&self) -> &[TaxRate] {
        &self.rates
    }

    pub fn count(&self) -> usize {
        self.rates.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uk_rates() -> TaxRateTable {
        TaxRateTable::from_rates(vec![
            TaxRate::standard("T1", "Standard", 20.0),
            TaxRate::new("T0", "Zero rated", 0.0),
            TaxRate::new("T5", "Reduced", 5.0),
        ])
    }

    #[test]
    fn test_rate_for_explicit_code() {
        let table = uk_rates();
        assert_eq!(table.rate_for(Some("T5")).unwrap().rate, 5.0);
        assert!(table.rate_for(Some("T0")).unwrap().is_zero_rated());
    }

    #[test]
    fn test_rate_for_falls_back_to_standard() {
        let table = uk_rates();
        assert_eq!(table.rate_for(None).unwrap().id, "T1");
        assert_eq!(table.rate_for(Some("")).unwrap().id, "T1");
        assert_eq!(table.rate_for(Some("T99")).unwrap().id, "T1");
    }

    #[test]
    fn test_no_standard_rate() {
        let table = TaxRateTable::from_rates(vec![TaxRate::new("T5", "Reduced", 5.0)]);
        assert!(table.standard().is_none());
        assert!(table.rate_for(None).is_none());
        assert_eq!(table.rate_for(Some("T5")).unwrap().rate, 5.0);
    }

    #[test]
    fn test_set_standard_override() {
        let mut table = uk_rates();
        assert!(table.set_standard("T5"));
        assert_eq!(table.rate_for(None).unwrap().id, "T5");
        assert!(!table.set_standard("nope"));
        assert_eq!(table.standard().unwrap().id, "T5");
    }
}

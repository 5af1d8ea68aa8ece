// 🧮 Totals Engine - VAT breakdown and profit roll-up
//
// Formulas (package components excluded everywhere):
//   line net     = quantity × unit price
//   subtotal     = Σ line net
//   VAT per code = Σ net in group × rate / 100   (rounded to pennies)
//   grand total  = subtotal + Σ VAT
//   profit       = subtotal − Σ quantity × unit cost
//   margin %     = profit / subtotal × 100        (0 when subtotal is 0)
//
// Recomputed from scratch on every call; nothing is cached.

use crate::entities::TaxRateTable;
use crate::line_items::LineItem;
use serde::{Deserialize, Serialize};

/// Round a currency amount to two decimal places
pub fn round_currency(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

// ============================================================================
// VAT BREAKDOWN
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VatLine {
    /// Tax code id the group is keyed by
    pub tax_code_id: String,
    pub name: String,
    pub rate: f64,
    pub net: f64,
    pub vat: f64,
}

// ============================================================================
// DOCUMENT TOTALS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentTotals {
    pub net_subtotal: f64,
    /// Non-zero rate groups, in order of first appearance
    pub vat_breakdown: Vec<VatLine>,
    pub vat_total: f64,
    pub grand_total: f64,
    pub total_cost: f64,
    pub profit: f64,
    pub margin_percent: f64,
    /// Lines that contributed (package components excluded)
    pub line_count: usize,
}

impl DocumentTotals {
    pub fn summary(&self) -> String {
        format!(
            "{} lines: net £{:.2}, VAT £{:.2}, total £{:.2}, profit £{:.2} ({:.1}% margin)",
            self.line_count,
            self.net_subtotal,
            self.vat_total,
            self.grand_total,
            self.profit,
            self.margin_percent
        )
    }

    pub fn vat_for(&self, tax_code_id: &str) -> Option<&VatLine> {
        self.vat_breakdown.iter().find(|v| v.tax_code_id == tax_code_id)
    }
}

// ============================================================================
// TOTALS CALCULATOR
// ============================================================================

pub struct TotalsCalculator<'t> {
    tax_rates: &'t TaxRateTable,
}

impl<'t> TotalsCalculator<'t> {
    pub fn new(tax_rates: &'t TaxRateTable) -> Self {
        TotalsCalculator { tax_rates }
    }

    /// Resolved (tax code id, name, rate) for a line; untaxed lines get `("", "No VAT", 0)`
    pub fn tax_for(&self, line: &LineItem) -> (String, String, f64) {
        match self.tax_rates.rate_for(line.tax_code_id.as_deref()) {
            Some(rate) => (rate.id.clone(), rate.name.clone(), rate.rate),
            None => (String::new(), "No VAT".to_string(), 0.0),
        }
    }

    /// VAT on a single line, at its resolved rate
    pub fn line_vat(&self, line: &LineItem) -> f64 {
        let (_, _, rate) = self.tax_for(line);
        round_currency(line.net() * rate / 100.0)
    }

    pub fn calculate(&self, lines: &[LineItem]) -> DocumentTotals {
        let counted: Vec<&LineItem> = lines.iter().filter(|l| !l.is_package_component).collect();

        let net_subtotal: f64 = counted.iter().map(|l| l.net()).sum();
        let total_cost: f64 = counted.iter().map(|l| l.cost()).sum();

        let mut groups: Vec<VatLine> = Vec::new();
        for line in &counted {
            let (tax_code_id, name, rate) = self.tax_for(line);
            match groups.iter_mut().find(|g| g.tax_code_id == tax_code_id) {
                Some(group) => group.net += line.net(),
                None => groups.push(VatLine {
                    tax_code_id,
                    name,
                    rate,
                    net: line.net(),
                    vat: 0.0,
                }),
            }
        }

        // Zero-rated groups still count toward the subtotal above
        groups.retain(|g| g.rate != 0.0);
        for group in &mut groups {
            group.vat = round_currency(group.net * group.rate / 100.0);
        }

        let vat_total: f64 = groups.iter().map(|g| g.vat).sum();
        let profit = net_subtotal - total_cost;
        let margin_percent = if net_subtotal == 0.0 {
            0.0
        } else {
            profit * 100.0 / net_subtotal
        };

        DocumentTotals {
            net_subtotal,
            vat_breakdown: groups,
            vat_total,
            grand_total: net_subtotal + vat_total,
            total_cost,
            profit,
            margin_percent,
            line_count: counted.len(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{ItemType, TaxRate};

    fn rates() -> TaxRateTable {
        TaxRateTable::from_rates(vec![
            TaxRate::standard("T1", "Standard", 20.0),
            TaxRate::new("T0", "Zero rated", 0.0),
            TaxRate::new("T5", "Reduced", 5.0),
        ])
    }

    fn line(qty: f64, price: f64, cost: f64, tax: Option<&str>) -> LineItem {
        LineItem::new(ItemType::Part, "Test part", qty, price)
            .with_unit_cost(cost)
            .with_tax_code(tax)
    }

    #[test]
    fn test_package_component_excluded() {
        let rates = rates();
        let lines = vec![
            line(2.0, 50.0, 20.0, Some("T1")),
            line(1.0, 100.0, 60.0, Some("T1")).as_package_component(),
        ];

        let totals = TotalsCalculator::new(&rates).calculate(&lines);

        assert_eq!(totals.net_subtotal, 100.0);
        assert_eq!(totals.vat_total, 20.0);
        assert_eq!(totals.grand_total, 120.0);
        assert_eq!(totals.total_cost, 40.0);
        assert_eq!(totals.profit, 60.0);
        assert_eq!(totals.margin_percent, 60.0);
        assert_eq!(totals.line_count, 1);

        println!("✅ Test passed: {}", totals.summary());
    }

    #[test]
    fn test_missing_tax_code_uses_standard_rate() {
        let rates = rates();
        let totals = TotalsCalculator::new(&rates).calculate(&[line(1.0, 10.0, 0.0, None)]);

        assert_eq!(totals.vat_breakdown.len(), 1);
        assert_eq!(totals.vat_breakdown[0].tax_code_id, "T1");
        assert_eq!(totals.vat_total, 2.0);
    }

    #[test]
    fn test_zero_rate_group_dropped_but_counted() {
        let rates = rates();
        let lines = vec![
            line(1.0, 100.0, 0.0, Some("T1")),
            line(1.0, 40.0, 0.0, Some("T0")),
            line(2.0, 10.0, 0.0, Some("T5")),
        ];

        let totals = TotalsCalculator::new(&rates).calculate(&lines);

        assert_eq!(totals.net_subtotal, 160.0);
        assert!(totals.vat_for("T0").is_none());
        assert_eq!(totals.vat_for("T1").unwrap().vat, 20.0);
        assert_eq!(totals.vat_for("T5").unwrap().vat, 1.0);
        assert_eq!(totals.vat_total, 21.0);
        assert_eq!(totals.grand_total, 181.0);

        let order: Vec<&str> = totals
            .vat_breakdown
            .iter()
            .map(|v| v.tax_code_id.as_str())
            .collect();
        assert_eq!(order, vec!["T1", "T5"]);
    }

    #[test]
    fn test_groups_accumulate_by_tax_code() {
        let rates = rates();
        let lines = vec![
            line(1.0, 10.0, 0.0, Some("T1")),
            line(1.0, 5.0, 0.0, None),
            line(3.0, 5.0, 0.0, Some("T1")),
        ];

        let totals = TotalsCalculator::new(&rates).calculate(&lines);

        assert_eq!(totals.vat_breakdown.len(), 1);
        assert_eq!(totals.vat_breakdown[0].net, 30.0);
        assert_eq!(totals.vat_breakdown[0].vat, 6.0);
    }

    #[test]
    fn test_zero_subtotal_has_zero_margin() {
        let rates = rates();
        let totals = TotalsCalculator::new(&rates).calculate(&[]);

        assert_eq!(totals.net_subtotal, 0.0);
        assert_eq!(totals.margin_percent, 0.0);
        assert_eq!(totals.grand_total, 0.0);

        let free_line = TotalsCalculator::new(&rates).calculate(&[line(1.0, 0.0, 5.0, None)]);
        assert_eq!(free_line.profit, -5.0);
        assert_eq!(free_line.margin_percent, 0.0);
    }

    #[test]
    fn test_no_standard_rate_means_no_vat() {
        let rates = TaxRateTable::from_rates(vec![TaxRate::new("T5", "Reduced", 5.0)]);
        let totals = TotalsCalculator::new(&rates).calculate(&[line(1.0, 50.0, 0.0, None)]);

        assert_eq!(totals.net_subtotal, 50.0);
        assert!(totals.vat_breakdown.is_empty());
        assert_eq!(totals.grand_total, 50.0);
    }

    #[test]
    fn test_vat_rounded_to_pennies() {
        let rates = rates();
        let totals = TotalsCalculator::new(&rates).calculate(&[line(1.0, 10.33, 0.0, Some("T5"))]);

        assert_eq!(totals.vat_total, 0.52);
        assert_eq!(round_currency(2.346), 2.35);
    }

    #[test]
    fn test_recalculation_is_deterministic() {
        let rates = rates();
        let lines = vec![line(1.5, 33.0, 10.0, Some("T1")), line(2.0, 7.25, 1.0, Some("T5"))];
        let calculator = TotalsCalculator::new(&rates);

        assert_eq!(calculator.calculate(&lines), calculator.calculate(&lines));
    }
}

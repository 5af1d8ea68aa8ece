// 📤 Nominal Export - One ledger row per posted line
//
// Rows carry the assigned nominal code (or the unassigned label) so the
// bookkeeping import can post them. Package components are skipped, the
// same way totals skip them.

use crate::entities::{NominalCodeRegistry, TaxRateTable};
use crate::line_items::LineDocument;
use crate::rules::RuleEngine;
use crate::totals::{round_currency, TotalsCalculator};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    #[serde(rename = "Document")]
    pub document_number: String,

    #[serde(rename = "Type")]
    pub document_kind: String,

    #[serde(rename = "Entity")]
    pub entity_id: String,

    #[serde(rename = "Date")]
    pub date: String,

    #[serde(rename = "Description")]
    pub description: String,

    #[serde(rename = "Item_Type")]
    pub item_type: String,

    #[serde(rename = "Net")]
    pub net: f64,

    #[serde(rename = "VAT")]
    pub vat: f64,

    #[serde(rename = "Gross")]
    pub gross: f64,

    #[serde(rename = "Nominal_Code")]
    pub nominal_code: String,

    #[serde(rename = "Nominal_Name")]
    pub nominal_name: String,

    #[serde(rename = "Rule")]
    pub rule_id: String,

    /// Resolved to a real nominal code (the label alone can collide with one)
    #[serde(skip)]
    pub assigned: bool,
}

impl ExportRow {
    pub fn is_assigned(&self) -> bool {
        self.assigned
    }
}

/// Net/VAT posted to one nominal code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NominalSummary {
    pub nominal_code: String,
    pub nominal_name: String,
    pub line_count: usize,
    pub net: f64,
    pub vat: f64,
    pub assigned: bool,
}

pub struct NominalExporter<'a> {
    engine: &'a RuleEngine,
    codes: &'a NominalCodeRegistry,
    tax_rates: &'a TaxRateTable,
    unassigned_label: String,
}

impl<'a> NominalExporter<'a> {
    pub fn new(
        engine: &'a RuleEngine,
        codes: &'a NominalCodeRegistry,
        tax_rates: &'a TaxRateTable,
    ) -> Self {
        NominalExporter {
            engine,
            codes,
            tax_rates,
            unassigned_label: "Unassigned".to_string(),
        }
    }

    pub fn with_unassigned_label(mut self, label: &str) -> Self {
        self.unassigned_label = label.to_string();
        self
    }

    pub fn unassigned_label(&self) -> &str {
        &self.unassigned_label
    }

    pub fn export(&self, documents: &[LineDocument]) -> Vec<ExportRow> {
        let calculator = TotalsCalculator::new(self.tax_rates);
        let mut rows = Vec::new();

        for document in documents {
            for (line, item) in document.classifiable_items() {
                let assignment = self.engine.classify(&item);
                let code = assignment
                    .nominal_code_id
                    .as_deref()
                    .and_then(|id| self.codes.find_by_id(id));

                let (nominal_code, nominal_name) = match code {
                    Some(code) => (code.export_code().to_string(), code.name.clone()),
                    None => (self.unassigned_label.clone(), String::new()),
                };
                let assigned = code.is_some();

                let net = round_currency(line.net());
                let vat = calculator.line_vat(line);

                rows.push(ExportRow {
                    document_number: document.number.clone(),
                    document_kind: document.kind.as_str().to_string(),
                    entity_id: document.entity_id.clone(),
                    date: document.issued_on.format("%Y-%m-%d").to_string(),
                    description: line.description.clone(),
                    item_type: line.item_type.to_string(),
                    net,
                    vat,
                    gross: round_currency(net + vat),
                    nominal_code,
                    nominal_name,
                    rule_id: assignment.rule_id.unwrap_or_default(),
                    assigned,
                });
            }
        }

        let unassigned = rows.iter().filter(|r| !r.is_assigned()).count();
        if unassigned > 0 {
            tracing::warn!(unassigned, total = rows.len(), "Export contains unassigned lines");
        } else {
            tracing::info!(total = rows.len(), "All export lines assigned");
        }

        rows
    }

    /// Totals per nominal code, in order of first appearance.
    /// Unassigned lines form their own group even if a real code shares the label.
    pub fn summarize(&self, rows: &[ExportRow]) -> Vec<NominalSummary> {
        let mut summaries: Vec<NominalSummary> = Vec::new();
        for row in rows {
            let existing = summaries
                .iter_mut()
                .find(|s| s.assigned == row.assigned && s.nominal_code == row.nominal_code);
            match existing {
                Some(summary) => {
                    summary.line_count += 1;
                    summary.net = round_currency(summary.net + row.net);
                    summary.vat = round_currency(summary.vat + row.vat);
                }
                None => summaries.push(NominalSummary {
                    nominal_code: row.nominal_code.clone(),
                    nominal_name: row.nominal_name.clone(),
                    line_count: 1,
                    net: row.net,
                    vat: row.vat,
                    assigned: row.assigned,
                }),
            }
        }
        summaries
    }
}

pub fn write_csv<W: Write>(rows: &[ExportRow], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row).context("Failed to write export row")?;
    }
    wtr.flush().context("Failed to flush export")?;
    Ok(())
}

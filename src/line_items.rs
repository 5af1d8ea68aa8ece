// 🧾 Line Items - Estimates, invoices and purchase orders
//
// Every document belongs to one business entity; its lines inherit that
// entity when they are classified. Package components are detail lines
// nested under a package header and never count on their own.

use crate::entities::{ItemType, TaxRateTable};
use crate::rules::ClassifiableItem;
use crate::totals::{DocumentTotals, TotalsCalculator};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// ============================================================================
// LINE ITEM
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    #[serde(default = "default_line_id")]
    pub id: String,

    pub item_type: ItemType,

    pub description: String,

    pub quantity: f64,

    pub unit_price: f64,

    #[serde(default)]
    pub unit_cost: f64,

    /// Explicit tax code; `None` means the standard rate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_code_id: Option<String>,

    /// Detail line inside a package (excluded from totals and export)
    #[serde(default)]
    pub is_package_component: bool,
}

fn default_line_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl LineItem {
    pub fn new(item_type: ItemType, description: &str, quantity: f64, unit_price: f64) -> Self {
        LineItem {
            id: default_line_id(),
            item_type,
            description: description.to_string(),
            quantity,
            unit_price,
            unit_cost: 0.0,
            tax_code_id: None,
            is_package_component: false,
        }
    }

    pub fn with_unit_cost(mut self, unit_cost: f64) -> Self {
        self.unit_cost = unit_cost;
        self
    }

    pub fn with_tax_code(mut self, tax_code_id: Option<&str>) -> Self {
        self.tax_code_id = tax_code_id.map(str::to_string);
        self
    }

    pub fn as_package_component(mut self) -> Self {
        self.is_package_component = true;
        self
    }

    /// quantity × unit price
    pub fn net(&self) -> f64 {
        self.quantity * self.unit_price
    }

    /// quantity × unit cost
    pub fn cost(&self) -> f64 {
        self.quantity * self.unit_cost
    }

    pub fn classifiable(&self, entity_id: &str) -> ClassifiableItem {
        ClassifiableItem::new(&self.description, self.item_type, entity_id)
    }
}

// ============================================================================
// DOCUMENTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentKind {
    Estimate,
    Invoice,
    PurchaseOrder,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Estimate => "Estimate",
            DocumentKind::Invoice => "Invoice",
            DocumentKind::PurchaseOrder => "Purchase Order",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineDocument {
    pub id: String,

    /// Human-facing number, e.g. "INV-00042"
    pub number: String,

    pub kind: DocumentKind,

    /// Owning business entity
    pub entity_id: String,

    pub issued_on: NaiveDate,

    #[serde(default)]
    pub lines: Vec<LineItem>,
}

impl LineDocument {
    pub fn new(kind: DocumentKind, number: &str, entity_id: &str, issued_on: NaiveDate) -> Self {
        LineDocument {
            id: uuid::Uuid::new_v4().to_string(),
            number: number.to_string(),
            kind,
            entity_id: entity_id.to_string(),
            issued_on,
            lines: Vec::new(),
        }
    }

    pub fn with_line(mut self, line: LineItem) -> Self {
        self.lines.push(line);
        self
    }

    /// Lines that post to the ledger, paired with their classification input
    pub fn classifiable_items(&self) -> impl Iterator<Item = (&LineItem, ClassifiableItem)> + '_ {
        self.lines
            .iter()
            .filter(|line| !line.is_package_component)
            .map(move |line| (line, line.classifiable(&self.entity_id)))
    }

    pub fn totals(&self, tax_rates: &TaxRateTable) -> DocumentTotals {
        TotalsCalculator::new(tax_rates).calculate(&self.lines)
    }

    /// Load a JSON array of documents
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Vec<LineDocument>> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read documents file: {:?}", path.as_ref()))?;

        serde_json::from_str(&content).context("Failed to parse documents JSON")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::TaxRate;

    fn invoice() -> LineDocument {
        LineDocument::new(
            DocumentKind::Invoice,
            "INV-00001",
            "e1",
            NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
        )
        .with_line(LineItem::new(ItemType::Labor, "Full service", 1.5, 80.0).with_unit_cost(30.0))
        .with_line(LineItem::new(ItemType::Part, "Service kit", 1.0, 45.0).with_unit_cost(25.0))
        .with_line(
            LineItem::new(ItemType::Part, "Oil filter", 1.0, 12.0)
                .with_unit_cost(4.0)
                .as_package_component(),
        )
    }

    #[test]
    fn test_line_net_and_cost() {
        let line = LineItem::new(ItemType::Part, "Pads", 2.0, 35.5).with_unit_cost(12.25);
        assert_eq!(line.net(), 71.0);
        assert_eq!(line.cost(), 24.5);
    }

    #[test]
    fn test_classifiable_items_skip_package_components() {
        let doc = invoice();
        let items: Vec<ClassifiableItem> = doc.classifiable_items().map(|(_, item)| item).collect();

        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.entity_id == "e1"));
        assert_eq!(items[0].item_type, ItemType::Labor);
        assert_eq!(items[1].description, "Service kit");
    }

    #[test]
    fn test_document_totals() {
        let rates = TaxRateTable::from_rates(vec![TaxRate::standard("T1", "Standard", 20.0)]);
        let totals = invoice().totals(&rates);

        assert_eq!(totals.net_subtotal, 165.0);
        assert_eq!(totals.vat_total, 33.0);
        assert_eq!(totals.total_cost, 70.0);
        assert_eq!(totals.profit, 95.0);
    }

    #[test]
    fn test_document_json_shape() {
        let json = r#"{
            "id": "d1",
            "number": "PO-00003",
            "kind": "PurchaseOrder",
            "entityId": "e2",
            "issuedOn": "2025-01-31",
            "lines": [
                {"itemType": "Purchase", "description": "Brake fluid 5L", "quantity": 2, "unitPrice": 18.5, "taxCodeId": "T1"}
            ]
        }"#;
        let doc: LineDocument = serde_json::from_str(json).unwrap();

        assert_eq!(doc.kind, DocumentKind::PurchaseOrder);
        assert_eq!(doc.lines[0].unit_cost, 0.0);
        assert!(!doc.lines[0].id.is_empty());
        assert!(!doc.lines[0].is_package_component);
        assert_eq!(doc.lines[0].tax_code_id.as_deref(), Some("T1"));
    }
}

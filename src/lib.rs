// Workshop Ledger - Core Library
// Nominal code assignment and VAT/profit roll-ups for workshop documents

pub mod config;
pub mod db;
pub mod entities;
pub mod export;
pub mod line_items;
pub mod numbering;
pub mod rules;
pub mod totals;
pub mod validation;

// Re-export commonly used types
pub use db::{
    Event, setup_database, upsert_document, import_documents, get_document, list_documents, count_documents,
    save_nominal_code, save_rule, save_tax_rate,
    load_nominal_codes, load_rules, load_tax_rates,
    insert_event, get_events_for_entity,
};
pub use entities::{
    ItemType, NominalCode, NominalCodeRegistry, TaxRate, TaxRateTable,
};
pub use rules::{
    ClassifiableItem, EntityScope, NominalCodeRule, RuleEngine, Assignment,
    resolve_nominal_code, select_rule, keyword_tokens,
};
pub use totals::{
    DocumentTotals, TotalsCalculator, VatLine, round_currency,
};
pub use line_items::{DocumentKind, LineDocument, LineItem};
pub use numbering::{next_document_number, NumberingError};
pub use validation::{AuditReport, RuleAuditor, RuleIssue, Severity};
pub use export::{ExportRow, NominalExporter, NominalSummary, write_csv};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

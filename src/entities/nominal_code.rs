// 📒 Nominal Code Entity - Accounting ledger codes
//
// A nominal code is the ledger bucket a line item is posted to when the
// books are exported (e.g. "4000 Sales - Labor"). The `id` is the stable
// identity rules point at; `code` and `name` are what the accountant sees.
//
// Codes are immutable once a rule references them: there is no cascade on
// delete, so a rule pointing at a removed code resolves to "Unassigned".

use serde::{Deserialize, Serialize};

// ============================================================================
// NOMINAL CODE ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NominalCode {
    /// Stable identity (UUID or document id from the store)
    pub id: String,

    /// Ledger code, e.g. "4000"
    pub code: String,

    /// Display name, e.g. "Sales - Labor"
    pub name: String,

    /// Mapping for an external accounting package, when it differs from `code`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_code: Option<String>,
}

impl NominalCode {
    /// Create a nominal code with a fresh UUID
    pub fn new(code: &str, name: &str) -> Self {
        NominalCode {
            id: uuid::Uuid::new_v4().to_string(),
            code: code.to_string(),
            name: name.to_string(),
            secondary_code: None,
        }
    }

    pub fn with_secondary_code(mut self, secondary_code: &str) -> Self {
        self.secondary_code = Some(secondary_code.to_string());
        self
    }

    /// "4000 - Sales - Labor"
    pub fn label(&self) -> String {
        format!("{} - {}", self.code, self.name)
    }

    /// Code to hand to the external package (secondary code wins when set)
    pub fn export_code(&self) -> &str {
        match self.secondary_code.as_deref() {
            Some(secondary) if !secondary.trim().is_empty() => secondary,
            _ => &self.code,
        }
    }
}

// ============================================================================
// NOMINAL CODE REGISTRY
// ============================================================================

/// In-memory view of the nominal code collection.
///
/// Keeps insertion order so listings match the order codes were created.
#[derive(Debug, Clone, Default)]
pub struct NominalCodeRegistry {
    codes: Vec<NominalCode>,
}

impl NominalCodeRegistry {
    pub fn new() -> Self {
        NominalCodeRegistry { codes: Vec::new() }
    }

    pub fn from_codes(codes: Vec<NominalCode>) -> Self {
        let mut registry = NominalCodeRegistry::new();
        for code in codes {
            registry.register(code);
        }
        registry
    }

    /// Register a code; a code with the same id replaces the existing entry in place.
    pub fn register(&mut self, code: NominalCode) {
        match self.codes.iter_mut().find(|c| c.id == code.id) {
            Some(existing) => *existing = code,
            None => self.codes.push(code),
        }
    }

    pub fn find_by_id(&self, id: &str) -> Option<&NominalCode> {
        self.codes.iter().find(|c| c.id == id)
    }

    /// Find by ledger code (case-insensitive, surrounding whitespace ignored)
    pub fn find_by_code(&self, code: &str) -> Option<&NominalCode> {
        let wanted = code.trim();
        self.codes
            .iter()
            .find(|c| c.code.trim().eq_ignore_ascii_case(wanted))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.find_by_id(id).is_some()
    }

    pub fn all(&self) -> &[NominalCode] {
        &self.codes
    }

    pub fn count(&self) -> usize {
        self.codes.len()
    }
}

// ============================================================================
// TESTS
// ============================================================================

// 🏷️ Nominal Code Rules - Rules as Data
// Keyword rules that decide which ledger code a line item is posted to
//
// Resolution for one item:
//   1. rule.item_type == item.item_type
//   2. rule scope is "all" or the item's owning entity
//   3. no exclude keyword occurs in the description (exclusion always wins)
//   4. no keywords (wildcard) or any keyword occurs in the description
//   5. highest priority wins; equal priorities go to the earlier rule
//   6. the winner's nominal code is looked up; a dangling id means Unassigned
//
// All matching is case-insensitive substring matching.

use crate::entities::item_type::deserialize_optional_item_type;
use crate::entities::{ItemType, NominalCode, NominalCodeRegistry};
use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

// ============================================================================
// ENTITY SCOPE
// ============================================================================

/// Which business entity a rule applies to.
///
/// Stored as a plain string: `"all"` means every entity. A blank value is
/// kept as `Blank` so the audit can flag it; it matches like `All`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntityScope {
    #[default]
    All,
    Blank,
    Entity(String),
}

impl EntityScope {
    /// Scope that applies to every entity
    pub fn is_global(&self) -> bool {
        matches!(self, EntityScope::All | EntityScope::Blank)
    }

    pub fn covers(&self, entity_id: &str) -> bool {
        match self {
            EntityScope::All | EntityScope::Blank => true,
            EntityScope::Entity(id) => id == entity_id,
        }
    }

    /// True when every entity `other` covers is also covered by `self`
    pub fn contains(&self, other: &EntityScope) -> bool {
        match (self, other) {
            _ if self.is_global() => true,
            (EntityScope::Entity(a), EntityScope::Entity(b)) => a == b,
            _ => false,
        }
    }

    /// True when some entity is covered by both scopes
    pub fn overlaps(&self, other: &EntityScope) -> bool {
        match (self, other) {
            (EntityScope::Entity(a), EntityScope::Entity(b)) => a == b,
            _ => true,
        }
    }
}

impl From<String> for EntityScope {
    fn from(value: String) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            EntityScope::Blank
        } else if trimmed.eq_ignore_ascii_case("all") {
            EntityScope::All
        } else {
            EntityScope::Entity(trimmed.to_string())
        }
    }
}

impl From<EntityScope> for String {
    fn from(scope: EntityScope) -> Self {
        match scope {
            EntityScope::All => "all".to_string(),
            EntityScope::Blank => String::new(),
            EntityScope::Entity(id) => id,
        }
    }
}

// ============================================================================
// RULE DEFINITION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NominalCodeRule {
    /// Rule ID for tracking
    pub id: String,

    /// Higher wins. Not unique: ties go to the earlier rule in the list.
    #[serde(default)]
    pub priority: i32,

    /// Owning business entity, or "all"
    #[serde(default)]
    pub entity_id: EntityScope,

    /// Item type this rule classifies. `None` while the rule is half-edited.
    #[serde(default, deserialize_with = "deserialize_optional_item_type")]
    pub item_type: Option<ItemType>,

    /// Comma-separated include keywords; empty matches every item (wildcard)
    #[serde(default)]
    pub keywords: String,

    /// Comma-separated exclude keywords; any hit disqualifies the rule
    #[serde(default)]
    pub exclude_keywords: String,

    /// Nominal code to assign
    #[serde(default)]
    pub nominal_code_id: String,
}

/// Split a comma-separated keyword list into trimmed, lowercased, non-empty tokens.
pub fn keyword_tokens(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

impl NominalCodeRule {
    /// Wildcard rule for every entity; refine with the `with_*` builders
    pub fn new(id: &str, priority: i32, item_type: ItemType, nominal_code_id: &str) -> Self {
        NominalCodeRule {
            id: id.to_string(),
            priority,
            entity_id: EntityScope::All,
            item_type: Some(item_type),
            keywords: String::new(),
            exclude_keywords: String::new(),
            nominal_code_id: nominal_code_id.to_string(),
        }
    }

    pub fn with_keywords(mut self, keywords: &str) -> Self {
        self.keywords = keywords.to_string();
        self
    }

    pub fn with_exclude_keywords(mut self, exclude_keywords: &str) -> Self {
        self.exclude_keywords = exclude_keywords.to_string();
        self
    }

    pub fn for_entity(mut self, entity_id: &str) -> Self {
        self.entity_id = EntityScope::from(entity_id.to_string());
        self
    }

    /// Rules missing an item type or a nominal code never take part in matching
    pub fn is_well_formed(&self) -> bool {
        self.item_type.is_some() && !self.nominal_code_id.trim().is_empty()
    }

    pub fn is_wildcard(&self) -> bool {
        keyword_tokens(&self.keywords).is_empty()
    }

    /// Type and entity filter (steps 1-2)
    pub fn applies_to(&self, item: &ClassifiableItem) -> bool {
        self.item_type == Some(item.item_type) && self.entity_id.covers(&item.entity_id)
    }

    /// Keyword predicate against an already-lowercased description (step 3)
    fn matches_lowered(&self, description: &str) -> bool {
        let excluded = keyword_tokens(&self.exclude_keywords)
            .iter()
            .any(|token| description.contains(token.as_str()));
        if excluded {
            return false;
        }

        let keywords = keyword_tokens(&self.keywords);
        keywords.is_empty()
            || keywords
                .iter()
                .any(|token| description.contains(token.as_str()))
    }

    /// Check the keyword predicate against a description (case-insensitive)
    pub fn matches_description(&self, description: &str) -> bool {
        self.matches_lowered(&description.to_lowercase())
    }

    /// Full candidate test: well-formed, in scope, and keyword match
    pub fn matches(&self, item: &ClassifiableItem) -> bool {
        self.is_well_formed() && self.applies_to(item) && self.matches_description(&item.description)
    }
}

// ============================================================================
// CLASSIFIABLE ITEM
// ============================================================================

/// The part of a line item that takes part in matching.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiableItem {
    pub description: String,
    pub item_type: ItemType,
    /// Id of the business entity that owns the document
    pub entity_id: String,
}

impl ClassifiableItem {
    pub fn new(description: &str, item_type: ItemType, entity_id: &str) -> Self {
        ClassifiableItem {
            description: description.to_string(),
            item_type,
            entity_id: entity_id.to_string(),
        }
    }
}

// ============================================================================
// RESOLUTION (pure functions over the current rule set)
// ============================================================================

/// Pick the winning rule: highest priority, first in list on ties.
pub fn select_rule<'r>(
    item: &ClassifiableItem,
    rules: &'r [NominalCodeRule],
) -> Option<&'r NominalCodeRule> {
    let description = item.description.to_lowercase();
    let mut best: Option<&NominalCodeRule> = None;

    for rule in rules {
        if !rule.is_well_formed() || !rule.applies_to(item) || !rule.matches_lowered(&description) {
            continue;
        }
        match best {
            Some(current) if current.priority >= rule.priority => {}
            _ => best = Some(rule),
        }
    }

    best
}

/// Resolve the nominal code for one item, or `None` for "Unassigned".
///
/// A winning rule whose code is missing also yields `None`; lower-priority
/// rules are not consulted.
pub fn resolve_nominal_code<'c>(
    item: &ClassifiableItem,
    rules: &[NominalCodeRule],
    nominal_codes: &'c [NominalCode],
) -> Option<&'c NominalCode> {
    let rule = select_rule(item, rules)?;
    nominal_codes.iter().find(|code| code.id == rule.nominal_code_id)
}

// ============================================================================
// ASSIGNMENT RESULT
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assignment {
    pub rule_id: Option<String>,
    pub nominal_code_id: Option<String>,
    pub priority: Option<i32>,
}

impl Assignment {
    fn from_rule(rule: &NominalCodeRule) -> Self {
        Assignment {
            rule_id: Some(rule.id.clone()),
            nominal_code_id: Some(rule.nominal_code_id.clone()),
            priority: Some(rule.priority),
        }
    }

    pub fn is_matched(&self) -> bool {
        self.rule_id.is_some()
    }
}

// ============================================================================
// RULE ENGINE
// ============================================================================

/// Rules pre-indexed by item type for batch classification.
///
/// Each bucket is stable-sorted by descending priority, so the first match in
/// a bucket is the same rule `select_rule` picks over the original list.
pub struct RuleEngine {
    buckets: HashMap<ItemType, Vec<NominalCodeRule>>,
    skipped: usize,
}

impl RuleEngine {
    /// Create a new empty rule engine
    pub fn new() -> Self {
        RuleEngine {
            buckets: HashMap::new(),
            skipped: 0,
        }
    }

    /// Load rules from a JSON array
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read rules file: {:?}", path.as_ref()))?;

        let rules: Vec<NominalCodeRule> =
            serde_json::from_str(&content).context("Failed to parse rules JSON")?;

        Ok(RuleEngine::from_rules(rules))
    }

    /// Create engine from a list of rules (input order is the tie-break)
    pub fn from_rules(rules: Vec<NominalCodeRule>) -> Self {
        let mut engine = RuleEngine::new();
        for rule in rules {
            engine.add_rule(rule);
        }
        engine
    }

    /// Add a single rule; it ranks after existing rules of equal priority
    pub fn add_rule(&mut self, rule: NominalCodeRule) {
        let item_type = match rule.item_type {
            Some(item_type) if rule.is_well_formed() => item_type,
            _ => {
                self.skipped += 1;
                tracing::debug!(rule_id = %rule.id, "Skipping malformed nominal code rule");
                return;
            }
        };

        let bucket = self.buckets.entry(item_type).or_default();
        bucket.push(rule);
        // Stable sort keeps insertion order among equal priorities
        bucket.sort_by(|a, b| b.priority.cmp(&a.priority));
    }

    /// Find the winning rule for an item
    pub fn classify(&self, item: &ClassifiableItem) -> Assignment {
        let Some(bucket) = self.buckets.get(&item.item_type) else {
            return Assignment::default();
        };

        let description = item.description.to_lowercase();
        bucket
            .iter()
            .find(|rule| rule.entity_id.covers(&item.entity_id) && rule.matches_lowered(&description))
            .map(Assignment::from_rule)
            .unwrap_or_default()
    }

    /// Classify and look the code up; `None` means "Unassigned"
    pub fn resolve<'c>(
        &self,
        item: &ClassifiableItem,
        codes: &'c NominalCodeRegistry,
    ) -> Option<&'c NominalCode> {
        self.classify(item)
            .nominal_code_id
            .and_then(|id| codes.find_by_id(&id))
    }

    /// Number of usable rules loaded
    pub fn rule_count(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Number of malformed rules ignored while loading
    pub fn skipped_count(&self) -> usize {
        self.skipped
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

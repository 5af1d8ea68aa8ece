// ✅ Rule Audit - Find rules that can never do what their author intended
//
// Rules come from form input and may be half-edited. The engine quietly
// skips bad rules; this audit tells the user why an item shows "Unassigned".

use crate::entities::NominalCodeRegistry;
use crate::rules::{keyword_tokens, EntityScope, NominalCodeRule};
use serde::{Deserialize, Serialize};

// ============================================================================
// REPORT TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Critical, // Rule is ignored or resolves to Unassigned
    Warning,  // Rule (or part of it) can never take effect
    Info,     // Rule works but depends on list order
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleIssue {
    pub rule_id: String,
    pub severity: Severity,
    pub field: String,
    pub issue: String,
    pub recommendation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    pub rule_count: usize,
    pub issues: Vec<RuleIssue>,
}

impl AuditReport {
    pub fn summary(&self) -> String {
        format!(
            "{} rules audited: {} usable, {} issues ({} critical, {} warnings)",
            self.rule_count,
            self.usable_rule_count(),
            self.issues.len(),
            self.count(Severity::Critical),
            self.count(Severity::Warning)
        )
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }

    pub fn has_critical_issues(&self) -> bool {
        self.count(Severity::Critical) > 0
    }

    /// Rules with no critical issue
    pub fn usable_rule_count(&self) -> usize {
        let mut broken: Vec<&str> = self
            .issues
            .iter()
            .filter(|i| i.severity == Severity::Critical)
            .map(|i| i.rule_id.as_str())
            .collect();
        broken.sort_unstable();
        broken.dedup();
        self.rule_count - broken.len()
    }

    pub fn issues_for(&self, rule_id: &str) -> Vec<&RuleIssue> {
        self.issues.iter().filter(|i| i.rule_id == rule_id).collect()
    }
}

// ============================================================================
// RULE AUDITOR
// ============================================================================

pub struct RuleAuditor<'c> {
    codes: &'c NominalCodeRegistry,
}

impl<'c> RuleAuditor<'c> {
    pub fn new(codes: &'c NominalCodeRegistry) -> Self {
        RuleAuditor { codes }
    }

    pub fn audit(&self, rules: &[NominalCodeRule]) -> AuditReport {
        let mut issues = Vec::new();

        for rule in rules {
            self.check_structure(rule, &mut issues);
            check_entity_scope(rule, &mut issues);
            check_keyword_conflicts(rule, &mut issues);
        }

        // Ordering checks only make sense between rules the engine will use
        let usable: Vec<&NominalCodeRule> = rules.iter().filter(|r| r.is_well_formed()).collect();
        for (index, rule) in usable.iter().enumerate() {
            check_ordering(rule, &usable[..index], &usable[index + 1..], &mut issues);
        }

        AuditReport {
            rule_count: rules.len(),
            issues,
        }
    }

    fn check_structure(&self, rule: &NominalCodeRule, issues: &mut Vec<RuleIssue>) {
        if rule.item_type.is_none() {
            issues.push(RuleIssue {
                rule_id: rule.id.clone(),
                severity: Severity::Critical,
                field: "itemType".to_string(),
                issue: "Rule has no item type and is ignored".to_string(),
                recommendation: "Choose Labor, Part, MOT, Purchase, CourtesyCar or Storage"
                    .to_string(),
            });
        }

        if rule.nominal_code_id.trim().is_empty() {
            issues.push(RuleIssue {
                rule_id: rule.id.clone(),
                severity: Severity::Critical,
                field: "nominalCodeId".to_string(),
                issue: "Rule has no nominal code and is ignored".to_string(),
                recommendation: "Select the nominal code this rule assigns".to_string(),
            });
        } else if !self.codes.contains(&rule.nominal_code_id) {
            issues.push(RuleIssue {
                rule_id: rule.id.clone(),
                severity: Severity::Critical,
                field: "nominalCodeId".to_string(),
                issue: format!(
                    "Nominal code '{}' does not exist; matching items show as Unassigned",
                    rule.nominal_code_id
                ),
                recommendation: "Point the rule at an existing nominal code".to_string(),
            });
        }
    }
}

fn check_entity_scope(rule: &NominalCodeRule, issues: &mut Vec<RuleIssue>) {
    if rule.entity_id == EntityScope::Blank {
        issues.push(RuleIssue {
            rule_id: rule.id.clone(),
            severity: Severity::Warning,
            field: "entityId".to_string(),
            issue: "Entity is blank, so the rule applies to every entity".to_string(),
            recommendation: "Set the entity explicitly, or \"all\" for every entity".to_string(),
        });
    }
}

fn check_keyword_conflicts(rule: &NominalCodeRule, issues: &mut Vec<RuleIssue>) {
    let excludes = keyword_tokens(&rule.exclude_keywords);
    for keyword in keyword_tokens(&rule.keywords) {
        // An include keyword containing an exclude token excludes itself
        if let Some(exclude) = excludes.iter().find(|e| keyword.contains(e.as_str())) {
            issues.push(RuleIssue {
                rule_id: rule.id.clone(),
                severity: Severity::Warning,
                field: "keywords".to_string(),
                issue: format!(
                    "Keyword '{}' is cancelled by exclude keyword '{}'",
                    keyword, exclude
                ),
                recommendation: "Remove the keyword or narrow the exclude keyword".to_string(),
            });
        }
    }
}

/// `rule` is shadowed when an earlier-or-higher unconditional wildcard covers its scope
fn check_ordering(
    rule: &NominalCodeRule,
    before: &[&NominalCodeRule],
    after: &[&NominalCodeRule],
    issues: &mut Vec<RuleIssue>,
) {
    let outranks = |other: &NominalCodeRule, earlier: bool| {
        other.priority > rule.priority || (earlier && other.priority == rule.priority)
    };

    let shadow = before
        .iter()
        .map(|r| (*r, true))
        .chain(after.iter().map(|r| (*r, false)))
        .filter(|(other, _)| other.item_type == rule.item_type)
        .find(|(other, earlier)| {
            other.is_wildcard()
                && keyword_tokens(&other.exclude_keywords).is_empty()
                && other.entity_id.contains(&rule.entity_id)
                && outranks(*other, *earlier)
        });

    if let Some((shadowing, _)) = shadow {
        issues.push(RuleIssue {
            rule_id: rule.id.clone(),
            severity: Severity::Warning,
            field: "priority".to_string(),
            issue: format!(
                "Never selected: wildcard rule '{}' (priority {}) always wins",
                shadowing.id, shadowing.priority
            ),
            recommendation: "Raise this rule's priority above the wildcard".to_string(),
        });
        return;
    }

    if let Some(tied) = before.iter().find(|other| {
        other.item_type == rule.item_type
            && other.priority == rule.priority
            && other.entity_id.overlaps(&rule.entity_id)
    }) {
        issues.push(RuleIssue {
            rule_id: rule.id.clone(),
            severity: Severity::Info,
            field: "priority".to_string(),
            issue: format!(
                "Shares priority {} with rule '{}'; the earlier rule wins when both match",
                rule.priority, tied.id
            ),
            recommendation: "Give the rules distinct priorities".to_string(),
        });
    }
}

// ============================================================================
// TESTS
// ============================================================================

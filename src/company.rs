//! Company name checks used when registering accounts.
//!
//! Two accounts are considered the same company when their cleaned names are within
//! [`DUPLICATE_DISTANCE`] edits of each other.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use strsim::levenshtein;

use crate::store::Account;

/// Maximum edit distance between cleaned names that still counts as a duplicate
pub const DUPLICATE_DISTANCE: usize = 2;

/// Abbreviations that must be spelled out in company names
pub const DISALLOWED_ABBREVIATIONS: [&str; 5] = ["INC", "CORP", "LTD", "CO", "LLC"];

/// Placeholder names that are never accepted
pub const PLACEHOLDER_NAMES: [&str; 3] = ["NONE", "N/A", "OTHER"];

/// Shortest accepted company name, counted before cleaning
pub const MIN_NAME_LENGTH: usize = 3;

lazy_static! {
    static ref PUNCTUATION: Regex = Regex::new(r"[-_.]").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref TRAILING_DIGITS: Regex = Regex::new(r"\d+$").unwrap();
}

/// Normalize a company name for comparison
///
/// Uppercases, drops `-`, `_` and `.`, collapses whitespace and removes a trailing run of
/// digits, so `"Acme-Lights  2"` and `"ACME LIGHTS"` clean to the same string.
///
/// # Examples
/// ```
/// use quotation_desk::company::clean_company_name;
///
/// assert_eq!(clean_company_name("  acme_lights. 001 "), "ACMELIGHTS");
/// ```
pub fn clean_company_name(name: &str) -> String {
    let upper = name.to_uppercase();
    let without_punctuation = PUNCTUATION.replace_all(&upper, "");
    let collapsed = WHITESPACE.replace_all(&without_punctuation, " ");
    let trimmed = collapsed.trim();
    TRAILING_DIGITS.replace(trimmed, "").trim().to_string()
}

/// Whether any whole word of `name` is a disallowed abbreviation.
pub fn contains_disallowed_abbreviation(name: &str) -> bool {
    name.to_uppercase()
        .split_whitespace()
        .any(|word| DISALLOWED_ABBREVIATIONS.contains(&word))
}

/// Accounts whose cleaned name is within `max_distance` of `cleaned`, in input order.
pub fn find_similar<'a>(cleaned: &str, accounts: &'a [Account], max_distance: usize) -> Vec<&'a Account> {
    accounts
        .iter()
        .filter(|account| levenshtein(cleaned, &clean_company_name(&account.company_name)) <= max_distance)
        .collect()
}

/// First naming rule `company_name` breaks, checked in order: length, placeholder,
/// leading `#`, abbreviations.
pub fn name_rule_violation(company_name: &str, cleaned: &str) -> Option<&'static str> {
    if company_name.trim().chars().count() < MIN_NAME_LENGTH || cleaned.is_empty() {
        return Some("Company Name must be at least 3 characters.");
    }
    if PLACEHOLDER_NAMES.contains(&cleaned) {
        return Some("Company Name Invalid.");
    }
    if cleaned.starts_with('#') {
        return Some("Company names starting with # require supporting documents.");
    }
    if contains_disallowed_abbreviation(cleaned) {
        return Some("Company name cannot contain abbreviations like INC, CORP, LTD, etc. Please use full words.");
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateStatus {
    Clear,
    Invalid,
    OwnedByYou,
    OwnedByOther,
}

/// Outcome of a duplicate check, as shown next to the company name field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateReport {
    pub status: DuplicateStatus,
    pub message: String,
    pub companies: Vec<Account>,
}

/// Check a proposed company name against existing accounts
///
/// # Arguments
/// * `company_name` - Name as typed by the user
/// * `requester` - Reference id of the user creating the account
/// * `accounts` - Existing accounts
///
/// # Returns
/// * `DuplicateReport` - `Invalid` when [`name_rule_violation`] finds a problem,
///   `OwnedByOther` if any similar account belongs to someone else, `OwnedByYou` if all
///   similar accounts belong to the requester, otherwise `Clear`
pub fn check_duplicate(company_name: &str, requester: &str, accounts: &[Account]) -> DuplicateReport {
    let cleaned = clean_company_name(company_name);
    if let Some(message) = name_rule_violation(company_name, &cleaned) {
        return DuplicateReport {
            status: DuplicateStatus::Invalid,
            message: message.to_string(),
            companies: Vec::new(),
        };
    }

    let similar: Vec<Account> = find_similar(&cleaned, accounts, DUPLICATE_DISTANCE)
        .into_iter()
        .cloned()
        .collect();

    let (status, message) = if similar.is_empty() {
        (DuplicateStatus::Clear, String::new())
    } else if let Some(other) = similar.iter().find(|a| a.owner_referenceid != requester) {
        (
            DuplicateStatus::OwnedByOther,
            format!("Duplicate company owned by another TSA (RefID: {})", other.owner_referenceid),
        )
    } else {
        (
            DuplicateStatus::OwnedByYou,
            format!("Possible duplicate detected (owned by you): \"{}\"", similar[0].company_name),
        )
    };

    DuplicateReport {
        status,
        message,
        companies: similar,
    }
}

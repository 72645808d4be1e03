//! Activity records and the rules applied before they are stored.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Separator used by the six comma-joined product fields
const LIST_SEPARATOR: &str = ",";
/// Descriptions contain commas themselves, so they are joined with `||`
const DESCRIPTION_SEPARATOR: &str = "||";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing {0}")]
    MissingField(&'static str),

    #[error("Invalid {0} format, must be string")]
    NotAString(&'static str),

    #[error("Product arrays length mismatch")]
    ProductLengthMismatch,

    #[error("{0}")]
    Rejected(String),
}

/// Activity as posted by the client, before validation
///
/// Required fields are optional here so that a missing one can be reported by name.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewActivity {
    pub activity_reference_number: Option<String>,
    pub account_reference_number: Option<String>,
    pub status: Option<String>,
    pub type_activity: Option<String>,

    #[serde(deserialize_with = "present")]
    pub product_category: Option<Value>,
    #[serde(deserialize_with = "present")]
    pub product_quantity: Option<Value>,
    #[serde(deserialize_with = "present")]
    pub product_amount: Option<Value>,
    #[serde(deserialize_with = "present")]
    pub product_description: Option<Value>,
    #[serde(deserialize_with = "present")]
    pub product_photo: Option<Value>,
    #[serde(deserialize_with = "present")]
    pub product_sku: Option<Value>,
    #[serde(deserialize_with = "present")]
    pub product_title: Option<Value>,

    #[serde(flatten)]
    pub details: ActivityDetails,
}

/// Keep an explicit `null` as `Some(Value::Null)` so it can be told apart from an absent key.
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

/// Optional fields stored as given; empty strings become `null`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityDetails {
    pub referenceid: Option<Value>,
    pub tsm: Option<Value>,
    pub manager: Option<Value>,
    pub target_quota: Option<Value>,
    pub type_client: Option<Value>,
    pub source: Option<Value>,
    pub callback: Option<Value>,
    pub call_status: Option<Value>,
    pub call_type: Option<Value>,
    pub project_type: Option<Value>,
    pub project_name: Option<Value>,
    pub quotation_number: Option<Value>,
    pub quotation_amount: Option<Value>,
    pub so_number: Option<Value>,
    pub so_amount: Option<Value>,
    pub dr_number: Option<Value>,
    pub actual_sales: Option<Value>,
    pub payment_terms: Option<Value>,
    pub delivery_date: Option<Value>,
    pub date_followup: Option<Value>,
    pub remarks: Option<Value>,
    pub start_date: Option<Value>,
    pub end_date: Option<Value>,
    pub date_created: Option<Value>,
    pub date_updated: Option<Value>,
}

/// The seven grouped product columns, each a joined list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductFields {
    pub product_category: Option<String>,
    pub product_quantity: Option<String>,
    pub product_amount: Option<String>,
    pub product_description: Option<String>,
    pub product_photo: Option<String>,
    pub product_sku: Option<String>,
    pub product_title: Option<String>,
}

/// A validated activity, ready for the history table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub activity_reference_number: String,
    pub account_reference_number: String,
    pub status: String,
    pub type_activity: String,
    #[serde(flatten)]
    pub products: ProductFields,
    #[serde(flatten)]
    pub details: ActivityDetails,
}

impl ActivityRecord {
    /// Owner key used to route change events.
    pub fn owner(&self) -> Option<&str> {
        self.details.referenceid.as_ref().and_then(Value::as_str)
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ValidationError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ValidationError::MissingField(field)),
    }
}

/// Product fields must be strings when given (`null` included); empty means absent.
fn product_string(value: Option<Value>, field: &'static str) -> Result<Option<String>, ValidationError> {
    match value {
        None => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(ValidationError::NotAString(field)),
    }
}

fn non_empty(value: Option<Value>) -> Option<Value> {
    match value {
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::Null) => None,
        other => other,
    }
}

impl ActivityDetails {
    fn normalized(self) -> Self {
        Self {
            referenceid: non_empty(self.referenceid),
            tsm: non_empty(self.tsm),
            manager: non_empty(self.manager),
            target_quota: non_empty(self.target_quota),
            type_client: non_empty(self.type_client),
            source: non_empty(self.source),
            callback: non_empty(self.callback),
            call_status: non_empty(self.call_status),
            call_type: non_empty(self.call_type),
            project_type: non_empty(self.project_type),
            project_name: non_empty(self.project_name),
            quotation_number: non_empty(self.quotation_number),
            quotation_amount: non_empty(self.quotation_amount),
            so_number: non_empty(self.so_number),
            so_amount: non_empty(self.so_amount),
            dr_number: non_empty(self.dr_number),
            actual_sales: non_empty(self.actual_sales),
            payment_terms: non_empty(self.payment_terms),
            delivery_date: non_empty(self.delivery_date),
            date_followup: non_empty(self.date_followup),
            remarks: non_empty(self.remarks),
            start_date: non_empty(self.start_date),
            end_date: non_empty(self.end_date),
            date_created: non_empty(self.date_created),
            date_updated: non_empty(self.date_updated),
        }
    }
}

impl ProductFields {
    /// Length of each joined list, when all seven are present
    ///
    /// # Returns
    /// * `None` - At least one field is absent, so nothing is checked
    /// * `Some(lengths)` - Per-field list lengths in declaration order
    pub fn list_lengths(&self) -> Option<[usize; 7]> {
        let count = |field: &Option<String>, separator: &str| field.as_ref().map(|v| v.split(separator).count());

        Some([
            count(&self.product_category, LIST_SEPARATOR)?,
            count(&self.product_quantity, LIST_SEPARATOR)?,
            count(&self.product_amount, LIST_SEPARATOR)?,
            count(&self.product_description, DESCRIPTION_SEPARATOR)?,
            count(&self.product_photo, LIST_SEPARATOR)?,
            count(&self.product_sku, LIST_SEPARATOR)?,
            count(&self.product_title, LIST_SEPARATOR)?,
        ])
    }

    fn check_lengths(&self) -> Result<(), ValidationError> {
        match self.list_lengths() {
            Some(lengths) if lengths.iter().any(|&len| len != lengths[0]) => {
                Err(ValidationError::ProductLengthMismatch)
            }
            _ => Ok(()),
        }
    }
}

impl NewActivity {
    /// Validate the posted activity
    ///
    /// Checks, in order: the four required fields, that product fields are strings, and
    /// that the product lists line up when all seven are given.
    ///
    /// # Returns
    /// * `Result<ActivityRecord, ValidationError>` - The normalized record or the first problem found
    pub fn validate(self) -> Result<ActivityRecord, ValidationError> {
        let activity_reference_number = required(self.activity_reference_number, "activity_reference_number")?;
        let account_reference_number = required(self.account_reference_number, "account_reference_number")?;
        let status = required(self.status, "status")?;
        let type_activity = required(self.type_activity, "type_activity")?;

        let products = ProductFields {
            product_category: product_string(self.product_category, "product_category")?,
            product_quantity: product_string(self.product_quantity, "product_quantity")?,
            product_amount: product_string(self.product_amount, "product_amount")?,
            product_description: product_string(self.product_description, "product_description")?,
            product_photo: product_string(self.product_photo, "product_photo")?,
            product_sku: product_string(self.product_sku, "product_sku")?,
            product_title: product_string(self.product_title, "product_title")?,
        };
        products.check_lengths()?;

        Ok(ActivityRecord {
            activity_reference_number,
            account_reference_number,
            status,
            type_activity,
            products,
            details: self.details.normalized(),
        })
    }
}

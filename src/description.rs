//! Product description parsing.
//!
//! Descriptions arrive from the sales UI as either rich-text HTML or plain text using `||`
//! as a row separator. Either way the content is a flat list of lines that alternate
//! between a label and its value:
//!
//! ```text
//! Color||Red||Wattage<br>50W   ->   Color: Red
//!                                   Wattage: 50W
//! ```

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

/// Internal marker used between normalization and splitting.
const ROW_BREAK: &str = "\n";

lazy_static! {
    static ref BR_TAG: Regex = Regex::new(r"(?i)<br\s*/?>").unwrap();
    // A tag runs to the next '>' or, if never closed, to the end of the text.
    static ref ANY_TAG: Regex = Regex::new(r"</?[^>]+(>|$)").unwrap();
    static ref ROW_BREAKS: Regex = Regex::new(r"\n+").unwrap();
    static ref ENTITIES: [(Regex, &'static str); 6] = [
        (Regex::new(r"(?i)&nbsp;").unwrap(), " "),
        (Regex::new(r"(?i)&lt;").unwrap(), "<"),
        (Regex::new(r"(?i)&gt;").unwrap(), ">"),
        (Regex::new(r"(?i)&amp;").unwrap(), "&"),
        (Regex::new(r"(?i)&quot;").unwrap(), "\""),
        (Regex::new(r"(?i)&#39;").unwrap(), "'"),
    ];
}

/// One label/value line of a parsed description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DescriptionRow {
    pub label: String,
    pub value: String,
}

impl DescriptionRow {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Decode the handful of entities rich-text editors emit.
///
/// Runs after tag stripping, so `&lt;b&gt;` survives as a literal `<b>`.
pub fn decode_entities(text: &str) -> String {
    ENTITIES
        .iter()
        .fold(text.to_string(), |acc, (pattern, replacement)| {
            pattern.replace_all(&acc, *replacement).into_owned()
        })
}

/// Parse a description into label/value rows
///
/// # Arguments
/// * `description` - Raw description text, HTML or `||`-separated
///
/// # Returns
/// * `Vec<DescriptionRow>` - `ceil(lines / 2)` rows in input order; a trailing label
///   without a value gets an empty value
///
/// # Examples
/// ```
/// use quotation_desk::description::{DescriptionRow, parse_description};
///
/// let rows = parse_description("Color||Red<br/>Size");
/// assert_eq!(rows, vec![DescriptionRow::new("Color", "Red"), DescriptionRow::new("Size", "")]);
/// ```
pub fn parse_description(description: &str) -> Vec<DescriptionRow> {
    let normalized = description.replace("||", ROW_BREAK);
    let normalized = BR_TAG.replace_all(&normalized, ROW_BREAK);
    let stripped = ANY_TAG.replace_all(&normalized, "");
    let decoded = decode_entities(&stripped);

    let lines: Vec<&str> = ROW_BREAKS
        .split(&decoded)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    lines
        .chunks(2)
        .map(|pair| DescriptionRow::new(pair[0], pair.get(1).copied().unwrap_or_default()))
        .collect()
}

/// Flatten rows into the text placed in the description cell.
pub fn render_rows(rows: &[DescriptionRow]) -> String {
    rows.iter()
        .map(|row| format!("{}: {}", row.label, row.value))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse and flatten in one step.
pub fn description_cell_text(description: &str) -> String {
    render_rows(&parse_description(description))
}

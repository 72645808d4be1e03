//! Trailer block of the quotation: VAT choice, total and the standing commercial terms.
//!
//! The text lives in `templates/quotation_trailer.hbs` so it can be reviewed and changed
//! without touching layout code. Each template line becomes one worksheet row:
//! an empty line is an empty row and a line starting with `## ` is a section heading.
//! Request values are flattened to a single line before substitution, so they can never
//! add rows or headings.

use handlebars::Handlebars;
use serde::Serialize;

const TRAILER_TEMPLATE: &str = include_str!("./templates/quotation_trailer.hbs");
const SALES_REP_TEMPLATE: &str = include_str!("./templates/quotation_sales_rep.hbs");
const HEADING_MARKER: &str = "## ";

/// VAT treatments offered on the quotation form, in display order.
pub const VAT_OPTIONS: [&str; 3] = ["VAT Inc", "VAT Exe", "Zero-Rated"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Plain,
    Heading,
}

/// One rendered trailer row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrailerLine {
    pub text: String,
    pub style: LineStyle,
}

/// Request values the trailer depends on.
#[derive(Debug, Clone, Default)]
pub struct TrailerValues<'a> {
    pub vat_type: &'a str,
    pub total_price: f64,
    pub sales_representative: &'a str,
    pub sales_email: &'a str,
    pub sales_contact: &'a str,
}

#[derive(Serialize)]
struct VatChoice<'a> {
    label: &'a str,
    selected: bool,
}

#[derive(Serialize)]
struct SalesContext {
    sales_representative: String,
    sales_email: String,
    sales_contact: String,
}

#[derive(Serialize)]
struct TrailerContext<'a> {
    vat_options: Vec<VatChoice<'a>>,
    total_price: String,
    sales_block: String,
}

/// Replace line breaks so a value always stays on its template line.
fn single_line(value: &str) -> String {
    value
        .trim()
        .chars()
        .map(|c| if matches!(c, '\n' | '\r') { ' ' } else { c })
        .collect()
}

/// Render the trailer into rows
///
/// # Arguments
/// * `values` - VAT selection, total and sales contact from the request
///
/// # Returns
/// * `Result<Vec<TrailerLine>, handlebars::RenderError>` - Rows in template order
pub fn render_trailer(values: &TrailerValues<'_>) -> Result<Vec<TrailerLine>, handlebars::RenderError> {
    let mut registry = Handlebars::new();
    registry.register_escape_fn(handlebars::no_escape);

    let sales = SalesContext {
        sales_representative: single_line(values.sales_representative),
        sales_email: single_line(values.sales_email),
        sales_contact: single_line(values.sales_contact),
    };
    // The block carries its own blank line so the layout is the same with or without it.
    let sales_block = if sales.sales_representative.is_empty()
        && sales.sales_email.is_empty()
        && sales.sales_contact.is_empty()
    {
        String::new()
    } else {
        format!("\n{}", registry.render_template(SALES_REP_TEMPLATE, &sales)?)
    };

    let selected = values.vat_type.trim();
    let context = TrailerContext {
        vat_options: VAT_OPTIONS
            .iter()
            .map(|&label| VatChoice {
                label,
                selected: label == selected,
            })
            .collect(),
        total_price: format_peso(values.total_price),
        sales_block,
    };

    let rendered = registry.render_template(TRAILER_TEMPLATE, &context)?;

    Ok(rendered.lines().map(parse_line).collect())
}

fn parse_line(line: &str) -> TrailerLine {
    match line.strip_prefix(HEADING_MARKER) {
        Some(heading) => TrailerLine {
            text: heading.to_string(),
            style: LineStyle::Heading,
        },
        None => TrailerLine {
            text: line.trim_end().to_string(),
            style: LineStyle::Plain,
        },
    }
}

/// Format an amount as pesos with thousands separators, e.g. `₱12,500.00`.
pub fn format_peso(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if amount < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{}₱{}.{}", sign, grouped, cents)
}

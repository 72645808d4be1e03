//! Quotation document builder.
//!
//! A [`QuotationRequest`] is laid out row by row into a [`QuotationSheet`], an in-memory
//! description of the worksheet. The sheet is only turned into XLSX bytes at the very end
//! by [`crate::downloader::to_xlsx`], which keeps the layout testable without reading
//! workbooks back.
//!
//! Layout, top to bottom:
//!
//! ```text
//! QUOTATION / SALES ORDER
//! Reference No / Date
//! COMPANY NAME .. SUBJECT            (six contact rows)
//! intro sentence
//! ITEM NO | QTY | REFERENCE PHOTO | PRODUCT DESCRIPTION | UNIT PRICE | TOTAL AMOUNT
//! one row per line item
//! trailer                            (see crate::terms)
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::description::{parse_description, render_rows};
use crate::downloader;
use crate::photos::{PhotoError, PhotoFetcher, PhotoOptions, fetch_all};
use crate::terms::{LineStyle, TrailerValues, render_trailer};

pub const SHEET_NAME: &str = "Quotation";
pub const TITLE: &str = "QUOTATION / SALES ORDER";
pub const INTRO: &str = "We are pleased to offer you the following products for consideration:";
pub const TABLE_HEADER: [&str; 6] = [
    "ITEM NO",
    "QTY",
    "REFERENCE PHOTO",
    "PRODUCT DESCRIPTION",
    "UNIT PRICE",
    "TOTAL AMOUNT",
];
pub const COLUMN_WIDTHS: [f64; 6] = [10.0, 5.0, 20.0, 50.0, 15.0, 15.0];
pub const CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub const COL_ITEM_NO: u16 = 0;
pub const COL_QTY: u16 = 1;
pub const COL_PHOTO: u16 = 2;
pub const COL_DESCRIPTION: u16 = 3;
pub const COL_UNIT_PRICE: u16 = 4;
pub const COL_TOTAL: u16 = 5;

const PHOTO_ROW_HEIGHT: f64 = 80.0;
const LINE_HEIGHT: f64 = 15.0;

/// Incoming quotation, as posted by the sales UI
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QuotationRequest {
    pub reference_no: String,
    pub date: String,
    pub company_name: String,
    pub address: String,
    pub tel_no: String,
    pub email: String,
    pub attention: String,
    pub subject: String,
    pub items: Vec<LineItem>,
    pub vat_type: String,
    pub total_price: f64,
    pub sales_representative: String,
    #[serde(rename = "salesemail")]
    pub sales_email: String,
    #[serde(rename = "salescontact")]
    pub sales_contact: String,
}

/// One product line of a quotation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LineItem {
    pub item_no: f64,
    pub qty: f64,
    pub unit_price: f64,
    pub total_amount: f64,
    /// URL of the product photo; fetched while building, never stored
    pub reference_photo: String,
    /// Free text or HTML, see [`crate::description`]
    pub description: String,
}

#[derive(Debug, Error)]
pub enum QuotationError {
    #[error("failed to render quotation terms: {0}")]
    Template(#[from] handlebars::RenderError),

    #[error("failed to write workbook: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Text(String),
    Number(f64),
}

/// Visual treatment of a cell; the writer maps each to one workbook format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CellStyle {
    #[default]
    Plain,
    Title,
    Heading,
    TableHeader,
    ItemNumber,
    Money,
    /// Top/left aligned with wrapping
    Description,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SheetCell {
    pub col: u16,
    pub value: CellValue,
    pub style: CellStyle,
}

impl SheetCell {
    pub fn text(col: u16, text: impl Into<String>, style: CellStyle) -> Self {
        Self {
            col,
            value: CellValue::Text(text.into()),
            style,
        }
    }

    pub fn number(col: u16, number: f64, style: CellStyle) -> Self {
        Self {
            col,
            value: CellValue::Number(number),
            style,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetRow {
    pub cells: Vec<SheetCell>,
    pub height: Option<f64>,
}

/// Image placed with its top-left corner in the given cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchoredImage {
    pub row: u32,
    pub col: u16,
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// In-memory worksheet, rows in construction order
#[derive(Debug, Clone, Default)]
pub struct QuotationSheet {
    pub name: String,
    pub rows: Vec<SheetRow>,
    pub images: Vec<AnchoredImage>,
    pub column_widths: Vec<f64>,
    /// Indices of the rows holding line items, in item order
    pub item_rows: Vec<u32>,
}

impl QuotationSheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Append a row and return its zero-based index.
    pub fn push_row(&mut self, cells: Vec<SheetCell>) -> u32 {
        self.rows.push(SheetRow { cells, height: None });
        (self.rows.len() - 1) as u32
    }

    pub fn push_text(&mut self, text: impl Into<String>, style: CellStyle) -> u32 {
        self.push_row(vec![SheetCell::text(0, text, style)])
    }

    pub fn push_blank(&mut self) -> u32 {
        self.push_row(Vec::new())
    }

    pub fn set_row_height(&mut self, row: u32, height: f64) {
        if let Some(r) = self.rows.get_mut(row as usize) {
            r.height = Some(height);
        }
    }

    pub fn cell(&self, row: u32, col: u16) -> Option<&SheetCell> {
        self.rows
            .get(row as usize)
            .and_then(|r| r.cells.iter().find(|c| c.col == col))
    }

    pub fn text(&self, row: u32, col: u16) -> Option<&str> {
        match self.cell(row, col).map(|c| &c.value) {
            Some(CellValue::Text(text)) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn number(&self, row: u32, col: u16) -> Option<f64> {
        match self.cell(row, col).map(|c| &c.value) {
            Some(CellValue::Number(n)) => Some(*n),
            _ => None,
        }
    }

    /// First row whose column A text starts with `prefix`.
    pub fn find_row(&self, prefix: &str) -> Option<u32> {
        (0..self.rows.len() as u32).find(|&r| self.text(r, 0).is_some_and(|t| t.starts_with(prefix)))
    }

    pub fn image_at(&self, row: u32) -> Option<&AnchoredImage> {
        self.images.iter().find(|img| img.row == row)
    }
}

/// Finished workbook ready to be sent as a download
#[derive(Debug, Clone)]
pub struct QuotationDocument {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Download name for a quotation; anything outside `[A-Za-z0-9._-]` becomes `_`.
pub fn quotation_filename(reference_no: &str) -> String {
    let safe: String = reference_no
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("Quotation_{}.xlsx", safe)
}

/// Builds quotation sheets; holds the photo source and its limits
#[derive(Clone)]
pub struct QuotationBuilder {
    fetcher: Arc<dyn PhotoFetcher>,
    options: PhotoOptions,
}

impl QuotationBuilder {
    pub fn new(fetcher: Arc<dyn PhotoFetcher>, options: PhotoOptions) -> Self {
        Self { fetcher, options }
    }

    /// Lay out the complete quotation
    ///
    /// Photos are fetched up front (bounded fan-out); an item whose photo cannot be
    /// fetched or decoded is still written, just without an image.
    ///
    /// # Arguments
    /// * `request` - The quotation to lay out
    ///
    /// # Returns
    /// * `Result<QuotationSheet, QuotationError>` - The sheet, or a trailer template error
    pub async fn build(&self, request: &QuotationRequest) -> Result<QuotationSheet, QuotationError> {
        let mut sheet = QuotationSheet::new(SHEET_NAME);

        write_header(&mut sheet, request);

        let urls: Vec<String> = request.items.iter().map(|i| i.reference_photo.clone()).collect();
        let photos = fetch_all(self.fetcher.as_ref(), urls, &self.options).await;

        for (item, photo) in request.items.iter().zip(photos) {
            let row = write_item(&mut sheet, item);
            match photo {
                Ok(photo) => {
                    sheet.images.push(AnchoredImage {
                        row,
                        col: COL_PHOTO,
                        png: photo.png,
                        width: photo.width,
                        height: photo.height,
                    });
                    let height = sheet.rows[row as usize].height.unwrap_or(0.0).max(PHOTO_ROW_HEIGHT);
                    sheet.set_row_height(row, height);
                }
                Err(PhotoError::Missing) => {}
                Err(e) => log::warn!("Failed to load image for item {}: {}", item.item_no, e),
            }
        }

        write_trailer(&mut sheet, request)?;

        sheet.column_widths = COLUMN_WIDTHS.to_vec();
        Ok(sheet)
    }

    /// Build the sheet and serialize it to XLSX bytes.
    pub async fn render(&self, request: &QuotationRequest) -> Result<QuotationDocument, QuotationError> {
        log::info!(
            "Building quotation {} with {} item(s)",
            request.reference_no,
            request.items.len()
        );
        let sheet = self.build(request).await?;
        let bytes = downloader::to_xlsx(&sheet)?;

        Ok(QuotationDocument {
            filename: quotation_filename(&request.reference_no),
            bytes,
        })
    }
}

fn write_header(sheet: &mut QuotationSheet, request: &QuotationRequest) {
    sheet.push_text(TITLE, CellStyle::Title);
    sheet.push_blank();
    sheet.push_row(vec![
        SheetCell::text(0, format!("Reference No: {}", request.reference_no), CellStyle::Plain),
        SheetCell::text(1, format!("Date: {}", request.date), CellStyle::Plain),
    ]);
    sheet.push_blank();

    let contact = [
        ("COMPANY NAME", &request.company_name),
        ("ADDRESS", &request.address),
        ("TEL NO", &request.tel_no),
        ("EMAIL ADDRESS", &request.email),
        ("ATTENTION", &request.attention),
        ("SUBJECT", &request.subject),
    ];
    for (label, value) in contact {
        sheet.push_text(format!("{}: {}", label, value), CellStyle::Plain);
    }

    sheet.push_blank();
    sheet.push_text(INTRO, CellStyle::Plain);
    sheet.push_blank();

    sheet.push_row(
        TABLE_HEADER
            .iter()
            .enumerate()
            .map(|(col, title)| SheetCell::text(col as u16, *title, CellStyle::TableHeader))
            .collect(),
    );
}

fn write_item(sheet: &mut QuotationSheet, item: &LineItem) -> u32 {
    let rows = parse_description(&item.description);
    let row = sheet.push_row(vec![
        SheetCell::number(COL_ITEM_NO, item.item_no, CellStyle::ItemNumber),
        SheetCell::number(COL_QTY, item.qty, CellStyle::ItemNumber),
        SheetCell::text(COL_PHOTO, "", CellStyle::Description),
        SheetCell::text(COL_DESCRIPTION, render_rows(&rows), CellStyle::Description),
        SheetCell::number(COL_UNIT_PRICE, item.unit_price, CellStyle::Money),
        SheetCell::number(COL_TOTAL, item.total_amount, CellStyle::Money),
    ]);

    if rows.len() > 1 {
        sheet.set_row_height(row, rows.len() as f64 * LINE_HEIGHT);
    }
    sheet.item_rows.push(row);
    row
}

fn write_trailer(sheet: &mut QuotationSheet, request: &QuotationRequest) -> Result<(), QuotationError> {
    let lines = render_trailer(&TrailerValues {
        vat_type: &request.vat_type,
        total_price: request.total_price,
        sales_representative: &request.sales_representative,
        sales_email: &request.sales_email,
        sales_contact: &request.sales_contact,
    })?;

    for line in lines {
        if line.text.is_empty() {
            sheet.push_blank();
            continue;
        }
        let style = match line.style {
            LineStyle::Heading => CellStyle::Heading,
            LineStyle::Plain => CellStyle::Plain,
        };
        sheet.push_text(line.text, style);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_keeps_reference_and_replaces_unsafe_characters() {
        assert_eq!(quotation_filename("Q-100"), "Quotation_Q-100.xlsx");
        assert_eq!(quotation_filename("Q 100/2"), "Quotation_Q_100_2.xlsx");
    }

    #[test]
    fn request_reads_camel_case_json_with_defaults() {
        let json = r#"{
            "referenceNo": "Q-7",
            "telNo": "123",
            "salesemail": "rep@example.com",
            "items": [{"itemNo": 1, "qty": 2, "unitPrice": 5.5, "description": "A||B"}]
        }"#;
        let request: QuotationRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.reference_no, "Q-7");
        assert_eq!(request.tel_no, "123");
        assert_eq!(request.sales_email, "rep@example.com");
        assert_eq!(request.total_price, 0.0);
        assert_eq!(request.items[0].unit_price, 5.5);
        assert_eq!(request.items[0].reference_photo, "");
    }

    #[test]
    fn find_row_matches_column_a_prefix() {
        let mut sheet = QuotationSheet::new("t");
        sheet.push_blank();
        let row = sheet.push_text("Total Price: ₱1.00", CellStyle::Heading);
        assert_eq!(sheet.find_row("Total Price"), Some(row));
        assert_eq!(sheet.find_row("Missing"), None);
    }
}

use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Image, Workbook, XlsxError};
use std::collections::HashMap;

use crate::quotation::{CellStyle, CellValue, QuotationSheet};

/// Workbook format for each cell style
fn style_formats() -> HashMap<CellStyle, Format> {
    let boxed = Format::new().set_border(FormatBorder::Thin);

    HashMap::from([
        (CellStyle::Plain, Format::new()),
        (CellStyle::Title, Format::new().set_bold().set_font_size(14)),
        (CellStyle::Heading, Format::new().set_bold()),
        (
            CellStyle::TableHeader,
            boxed
                .clone()
                .set_bold()
                .set_align(FormatAlign::Center)
                .set_align(FormatAlign::VerticalCenter)
                .set_text_wrap(),
        ),
        (
            CellStyle::ItemNumber,
            boxed.clone().set_align(FormatAlign::Center).set_align(FormatAlign::Top),
        ),
        (
            CellStyle::Money,
            boxed.clone().set_num_format("#,##0.00").set_align(FormatAlign::Top),
        ),
        (
            CellStyle::Description,
            boxed
                .set_align(FormatAlign::Top)
                .set_align(FormatAlign::Left)
                .set_text_wrap(),
        ),
    ])
}

/// Convert a quotation sheet to XLSX format
///
/// Writes every row in order with its style, anchors the embedded photos, then applies the
/// column widths once at the end.
///
/// # Arguments
/// * `sheet` - The laid-out quotation
///
/// # Returns
/// * `Result<Vec<u8>, XlsxError>` - XLSX file content as bytes or an error
///
/// # Examples
/// ```
/// use quotation_desk::downloader::to_xlsx;
/// use quotation_desk::quotation::{CellStyle, QuotationSheet};
///
/// let mut sheet = QuotationSheet::new("Quotation");
/// sheet.push_text("QUOTATION / SALES ORDER", CellStyle::Title);
/// let bytes = to_xlsx(&sheet).unwrap();
/// assert!(bytes.starts_with(b"PK"));
/// ```
pub fn to_xlsx(sheet: &QuotationSheet) -> Result<Vec<u8>, XlsxError> {
    let formats = style_formats();
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(&sheet.name)?;

    for (r, row) in sheet.rows.iter().enumerate() {
        let r = r as u32;
        for cell in &row.cells {
            let format = &formats[&cell.style];
            match &cell.value {
                CellValue::Text(text) => {
                    worksheet.write_string_with_format(r, cell.col, text, format)?;
                }
                CellValue::Number(number) => {
                    worksheet.write_number_with_format(r, cell.col, *number, format)?;
                }
            }
        }
        if let Some(height) = row.height {
            worksheet.set_row_height(r, height)?;
        }
    }

    for anchored in &sheet.images {
        let image = Image::new_from_buffer(&anchored.png)?;
        worksheet.insert_image(anchored.row, anchored.col, &image)?;
    }

    for (col, width) in sheet.column_widths.iter().enumerate() {
        worksheet.set_column_width(col as u16, *width)?;
    }

    // Save to memory buffer
    let buffer = workbook.save_to_buffer()?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quotation::SheetCell;

    #[test]
    fn every_style_has_a_format() {
        let formats = style_formats();
        for style in [
            CellStyle::Plain,
            CellStyle::Title,
            CellStyle::Heading,
            CellStyle::TableHeader,
            CellStyle::ItemNumber,
            CellStyle::Money,
            CellStyle::Description,
        ] {
            assert!(formats.contains_key(&style), "missing format for {:?}", style);
        }
    }

    #[test]
    fn rejects_invalid_sheet_name() {
        let mut sheet = QuotationSheet::new("bad[name]");
        sheet.push_row(vec![SheetCell::number(0, 1.0, CellStyle::ItemNumber)]);
        assert!(to_xlsx(&sheet).is_err());
    }

    #[test]
    fn rejects_corrupt_image_bytes() {
        let mut sheet = QuotationSheet::new("Quotation");
        let row = sheet.push_blank();
        sheet.images.push(crate::quotation::AnchoredImage {
            row,
            col: 2,
            png: b"not an image".to_vec(),
            width: 1,
            height: 1,
        });
        assert!(to_xlsx(&sheet).is_err());
    }
}

use quotation_desk::photos::{NoPhotoFetcher, PhotoOptions};
use quotation_desk::quotation::{LineItem, QuotationBuilder, QuotationRequest};
use std::env;
use std::sync::Arc;

// Writes a sample quotation so the layout can be checked in a spreadsheet application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let request = QuotationRequest {
        reference_no: "Q-DEMO-001".to_string(),
        date: "October 19, 2026".to_string(),
        company_name: "Northwind Traders".to_string(),
        address: "12 Sample St., Pasig City".to_string(),
        tel_no: "(02) 8123 4567".to_string(),
        email: "purchasing@northwind.example".to_string(),
        attention: "Procurement Team".to_string(),
        subject: "Street lighting supply".to_string(),
        items: vec![
            LineItem {
                item_no: 1.0,
                qty: 10.0,
                unit_price: 2500.0,
                total_amount: 25000.0,
                reference_photo: String::new(),
                description: "Wattage<br>100W<br>Color Temp<br>6500K".to_string(),
            },
            LineItem {
                item_no: 2.0,
                qty: 10.0,
                unit_price: 4800.0,
                total_amount: 48000.0,
                reference_photo: String::new(),
                description: "Height||6m||Material||Galvanized steel".to_string(),
            },
        ],
        vat_type: "VAT Inc".to_string(),
        total_price: 73000.0,
        sales_representative: "Sales Desk".to_string(),
        sales_email: "sales@example.com".to_string(),
        sales_contact: "0917 000 0000".to_string(),
    };

    let builder = QuotationBuilder::new(Arc::new(NoPhotoFetcher), PhotoOptions::default());
    let document = builder.render(&request).await?;

    let path = args.get(1).cloned().unwrap_or_else(|| document.filename.clone());
    std::fs::write(&path, &document.bytes)?;
    println!("✓ Wrote {} ({} bytes)", path, document.bytes.len());

    Ok(())
}

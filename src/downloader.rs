#![cfg(not(tarpaulin_include))]

use crate::models::Order;

const HEADERS: [&str; 9] = [
    "Date",
    "Commande",
    "Statut",
    "Paiement",
    "Table",
    "Articles",
    "Quantité",
    "Total (FCFA)",
    "Servi par",
];

/// One export row per order, in the column order of [`HEADERS`]
fn order_row(order: &Order) -> [String; 9] {
    let articles = order
        .items
        .iter()
        .map(|item| format!("{} x{}", item.name, item.quantity))
        .collect::<Vec<_>>()
        .join(" | ");
    let quantity: u32 = order.items.iter().map(|item| item.quantity).sum();

    [
        order.created_at.format("%Y-%m-%d %H:%M").to_string(),
        crate::orders::short_ref(&order.id),
        order.status.to_string(),
        order.payment_method.as_str().to_string(),
        order.table_id.clone().unwrap_or_default(),
        articles,
        quantity.to_string(),
        order.total.to_string(),
        order.served_by.clone().unwrap_or_default(),
    ]
}

/// Convert orders to CSV format
///
/// The first line holds the column headers. Values containing commas,
/// quotes or newlines are quoted, with inner quotes doubled.
///
/// # Arguments
/// * `orders` - Orders to export, in the order they should appear
///
/// # Returns
/// * `String` - CSV content
pub fn orders_to_csv(orders: &[Order]) -> String {
    let mut csv_content = HEADERS.join(",");
    csv_content.push('\n');

    for order in orders {
        let row = order_row(order);
        for (c, value) in row.iter().enumerate() {
            if c > 0 {
                csv_content.push(',');
            }
            if value.contains(',') || value.contains('"') || value.contains('\n') {
                let escaped = value.replace('"', "\"\"");
                csv_content.push_str(&format!("\"{}\"", escaped));
            } else {
                csv_content.push_str(value);
            }
        }
        csv_content.push('\n');
    }

    csv_content
}

/// Convert orders to XLSX format
///
/// Totals and quantities are written as numbers so they can be summed in
/// a spreadsheet application.
///
/// # Arguments
/// * `orders` - Orders to export
///
/// # Returns
/// * `Result<Vec<u8>, Box<dyn Error>>` - XLSX file content as bytes or an error
#[cfg(feature = "web")]
pub fn orders_to_xlsx(orders: &[Order]) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    use rust_xlsxwriter::{Format, Workbook, Worksheet};

    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();
    worksheet.set_name("Ventes")?;

    let bold = Format::new().set_bold();
    for (c, header) in HEADERS.iter().enumerate() {
        worksheet.write_string_with_format(0, c as u16, *header, &bold)?;
    }

    for (r, order) in orders.iter().enumerate() {
        let row = (r + 1) as u32;
        for (c, value) in order_row(order).iter().enumerate() {
            match c {
                6 | 7 => {
                    let number: f64 = value.parse().unwrap_or(0.0);
                    worksheet.write_number(row, c as u16, number)?;
                }
                _ => {
                    worksheet.write_string(row, c as u16, value.as_str())?;
                }
            }
        }
    }

    workbook.push_worksheet(worksheet);
    let buffer = workbook.save_to_buffer()?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderItem, OrderStatus, PaymentMethod};
    use chrono::{TimeZone, Utc};

    fn order() -> Order {
        let at = Utc.with_ymd_and_hms(2024, 5, 4, 21, 30, 0).unwrap();
        Order {
            id: "abcdef12-3456".to_string(),
            establishment_id: "bar".to_string(),
            table_id: Some("Terrasse, 2".to_string()),
            customer_id: None,
            items: vec![
                OrderItem {
                    product_id: "p1".to_string(),
                    name: "Regab".to_string(),
                    unit_price: 1_000,
                    quantity: 2,
                },
                OrderItem {
                    product_id: "p2".to_string(),
                    name: "Jus \"maison\"".to_string(),
                    unit_price: 500,
                    quantity: 1,
                },
            ],
            total: 2_500,
            payment_method: PaymentMethod::MoovMoney,
            status: OrderStatus::Sent,
            served_by: None,
            note: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn csv_escapes_values() {
        let csv = orders_to_csv(&[order()]);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Date,Commande,Statut"));
        assert_eq!(
            lines[1],
            "2024-05-04 21:30,ABCDEF12,sent,moov_money,\"Terrasse, 2\",\"Regab x2 | Jus \"\"maison\"\" x1\",3,2500,"
        );
    }

    #[cfg(feature = "web")]
    #[test]
    fn xlsx_is_a_zip_archive() {
        let bytes = orders_to_xlsx(&[order()]).unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }
}

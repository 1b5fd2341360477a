//! Dashboard figures computed from the order history

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::{Order, OrderStatus, PaymentMethod};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductSales {
    pub product_id: String,
    pub name: String,
    pub quantity: u64,
    pub revenue: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyRevenue {
    pub date: NaiveDate,
    pub orders: usize,
    pub revenue: i64,
}

/// Sales over a period; only sent orders count as revenue
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesSummary {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub orders_sent: usize,
    pub orders_cancelled: usize,
    pub orders_pending: usize,
    pub revenue: i64,
    pub average_ticket: i64,
    pub by_payment_method: BTreeMap<PaymentMethod, i64>,
    /// Best sellers by revenue
    pub top_products: Vec<ProductSales>,
    /// One entry per day with at least one sent order, oldest first
    pub daily: Vec<DailyRevenue>,
}

/// Amount as printed on receipts and menus
///
/// # Examples
/// ```
/// use nack::reports::format_fcfa;
///
/// assert_eq!(format_fcfa(12500), "12 500 FCFA");
/// assert_eq!(format_fcfa(-800), "-800 FCFA");
/// ```
pub fn format_fcfa(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(c);
    }
    if amount < 0 {
        grouped.insert(0, '-');
    }
    format!("{} FCFA", grouped)
}

/// Number of best sellers kept in a summary
pub const TOP_PRODUCTS: usize = 5;

/// Summarize the orders created in `[from, to)`
pub fn summarize(orders: &[Order], from: DateTime<Utc>, to: DateTime<Utc>) -> SalesSummary {
    let in_period = orders
        .iter()
        .filter(|o| o.created_at >= from && o.created_at < to);

    let mut orders_sent = 0;
    let mut orders_cancelled = 0;
    let mut orders_pending = 0;
    let mut revenue = 0;
    let mut by_payment_method = BTreeMap::new();
    let mut products: BTreeMap<&str, ProductSales> = BTreeMap::new();
    let mut daily: BTreeMap<NaiveDate, DailyRevenue> = BTreeMap::new();

    for order in in_period {
        match order.status {
            OrderStatus::Pending => orders_pending += 1,
            OrderStatus::Cancelled => orders_cancelled += 1,
            OrderStatus::Sent => {
                orders_sent += 1;
                revenue += order.total;
                *by_payment_method.entry(order.payment_method).or_insert(0) += order.total;

                let date = order.created_at.date_naive();
                let day = daily.entry(date).or_insert(DailyRevenue {
                    date,
                    orders: 0,
                    revenue: 0,
                });
                day.orders += 1;
                day.revenue += order.total;

                for item in &order.items {
                    let entry = products
                        .entry(item.product_id.as_str())
                        .or_insert_with(|| ProductSales {
                            product_id: item.product_id.clone(),
                            name: item.name.clone(),
                            quantity: 0,
                            revenue: 0,
                        });
                    entry.quantity += u64::from(item.quantity);
                    entry.revenue += item.line_total();
                }
            }
        }
    }

    let mut top_products: Vec<ProductSales> = products.into_values().collect();
    top_products.sort_by(|a, b| {
        b.revenue
            .cmp(&a.revenue)
            .then_with(|| b.quantity.cmp(&a.quantity))
            .then_with(|| a.name.cmp(&b.name))
    });
    top_products.truncate(TOP_PRODUCTS);

    SalesSummary {
        from,
        to,
        orders_sent,
        orders_cancelled,
        orders_pending,
        revenue,
        average_ticket: if orders_sent > 0 {
            revenue / orders_sent as i64
        } else {
            0
        },
        by_payment_method,
        top_products,
        daily: daily.into_values().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderItem;
    use chrono::{Duration, TimeZone};

    fn order(at: DateTime<Utc>, status: OrderStatus, method: PaymentMethod, items: &[(&str, i64, u32)]) -> Order {
        let items: Vec<OrderItem> = items
            .iter()
            .map(|(name, price, qty)| OrderItem {
                product_id: format!("p-{}", name),
                name: name.to_string(),
                unit_price: *price,
                quantity: *qty,
            })
            .collect();
        Order {
            id: crate::models::new_id(),
            establishment_id: "bar".to_string(),
            table_id: None,
            customer_id: None,
            total: items.iter().map(OrderItem::line_total).sum(),
            items,
            payment_method: method,
            status,
            served_by: None,
            note: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn only_sent_orders_make_revenue() {
        let day = Utc.with_ymd_and_hms(2024, 3, 1, 20, 0, 0).unwrap();
        let orders = vec![
            order(day, OrderStatus::Sent, PaymentMethod::Cash, &[("Regab", 1_000, 3)]),
            order(day, OrderStatus::Sent, PaymentMethod::AirtelMoney, &[("Castel", 1_200, 1), ("Regab", 1_000, 1)]),
            order(day + Duration::days(1), OrderStatus::Sent, PaymentMethod::Cash, &[("Brochettes", 2_000, 2)]),
            order(day, OrderStatus::Cancelled, PaymentMethod::Cash, &[("Regab", 1_000, 10)]),
            order(day, OrderStatus::Pending, PaymentMethod::Card, &[("Regab", 1_000, 1)]),
            order(day - Duration::days(10), OrderStatus::Sent, PaymentMethod::Cash, &[("Regab", 1_000, 50)]),
        ];

        let s = summarize(&orders, day - Duration::days(1), day + Duration::days(2));
        assert_eq!(s.orders_sent, 3);
        assert_eq!(s.orders_cancelled, 1);
        assert_eq!(s.orders_pending, 1);
        assert_eq!(s.revenue, 9_200);
        assert_eq!(s.average_ticket, 3_066);
        assert_eq!(s.by_payment_method[&PaymentMethod::Cash], 7_000);
        assert_eq!(s.by_payment_method[&PaymentMethod::AirtelMoney], 2_200);
        assert_eq!(s.top_products[0].name, "Regab");
        assert_eq!(s.top_products[0].quantity, 4);
        assert_eq!(s.daily.len(), 2);
        assert_eq!(s.daily[1].revenue, 4_000);
    }

    #[test]
    fn empty_period() {
        let now = Utc::now();
        let s = summarize(&[], now - Duration::days(7), now);
        assert_eq!(s.revenue, 0);
        assert_eq!(s.average_ticket, 0);
        assert!(s.daily.is_empty());
    }
}

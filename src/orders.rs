use chrono::{DateTime, Utc};
use log::info;
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::error::{NackError, Result};
use crate::inventory::adjust_stock;
use crate::loyalty::{LoyaltyRules, record_purchase};
use crate::models::{
    Customer, Order, OrderItem, OrderStatus, PaymentMethod, Product, Table, new_id,
};
use crate::store::Store;
use crate::validation::{require_positive, require_text};

#[derive(Debug, Clone, Deserialize)]
pub struct NewOrderItem {
    pub product_id: String,
    pub quantity: u32,
}

/// Order as submitted by the point of sale
#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
    pub items: Vec<NewOrderItem>,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub table_id: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Record a pending order priced from the current catalogue
///
/// Lines for the same product are merged. Stock is not touched until the
/// order is sent.
pub fn create_order(
    store: &Store,
    establishment_id: &str,
    new_order: NewOrder,
    served_by: Option<String>,
    now: DateTime<Utc>,
) -> Result<Order> {
    if new_order.items.is_empty() {
        return Err(NackError::invalid("an order needs at least one item"));
    }

    let mut quantities: BTreeMap<String, u32> = BTreeMap::new();
    let mut ordering: Vec<String> = Vec::new();
    for item in &new_order.items {
        require_positive("quantity", item.quantity)?;
        if !quantities.contains_key(&item.product_id) {
            ordering.push(item.product_id.clone());
        }
        let merged = quantities.entry(item.product_id.clone()).or_insert(0);
        *merged = merged
            .checked_add(item.quantity)
            .ok_or_else(|| NackError::invalid("quantity is too large"))?;
    }

    store.transaction(|tx| {
        if let Some(table_id) = &new_order.table_id {
            tx.require::<Table>(establishment_id, table_id)?;
        }
        if let Some(customer_id) = &new_order.customer_id {
            tx.require::<Customer>(establishment_id, customer_id)?;
        }

        let mut items = Vec::with_capacity(ordering.len());
        for product_id in &ordering {
            let product = tx.require::<Product>(establishment_id, product_id)?;
            if !product.available {
                return Err(NackError::invalid(format!(
                    "{} is not available for sale",
                    product.name
                )));
            }
            items.push(OrderItem {
                product_id: product.id.clone(),
                name: product.name.clone(),
                unit_price: product.price,
                quantity: quantities[product_id],
            });
        }

        let order = Order {
            id: new_id(),
            establishment_id: establishment_id.to_string(),
            table_id: new_order.table_id.clone(),
            customer_id: new_order.customer_id.clone(),
            total: order_total(&items)?,
            items,
            payment_method: new_order.payment_method,
            status: OrderStatus::Pending,
            served_by,
            note: new_order
                .note
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
            created_at: now,
            updated_at: now,
        };
        tx.put(order.clone());
        Ok(order)
    })
}

fn order_total(items: &[OrderItem]) -> Result<i64> {
    items
        .iter()
        .try_fold(0i64, |total, item| {
            item.checked_line_total()
                .and_then(|line| total.checked_add(line))
        })
        .ok_or_else(|| NackError::invalid("order total is too large"))
}

/// Only pending orders move, and only once
pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
    matches!(
        (from, to),
        (OrderStatus::Pending, OrderStatus::Sent) | (OrderStatus::Pending, OrderStatus::Cancelled)
    )
}

/// Move an order to `status`
///
/// Sending takes every line out of stock and credits the attached customer.
/// If any product is short, nothing is written.
pub fn update_status(
    store: &Store,
    establishment_id: &str,
    order_id: &str,
    status: OrderStatus,
    rules: &LoyaltyRules,
    now: DateTime<Utc>,
) -> Result<Order> {
    let order = store.transaction(|tx| {
        let mut order = tx.require::<Order>(establishment_id, order_id)?.clone();
        if !can_transition(order.status, status) {
            return Err(NackError::InvalidTransition {
                from: order.status.to_string(),
                to: status.to_string(),
            });
        }

        if status == OrderStatus::Sent {
            for item in &order.items {
                let mut product = tx.require::<Product>(establishment_id, &item.product_id)?.clone();
                adjust_stock(&mut product, -i64::from(item.quantity))?;
                product.updated_at = now;
                tx.put(product);
            }

            if let Some(customer_id) = &order.customer_id {
                if let Some(customer) = tx.get::<Customer>(establishment_id, customer_id) {
                    let mut customer = customer.clone();
                    let description = format!("Commande {}", short_ref(&order.id));
                    record_purchase(&mut customer, order.total, rules, &description, now);
                    tx.put(customer);
                }
            }
        }

        order.status = status;
        order.updated_at = now;
        tx.put(order.clone());
        Ok(order)
    })?;

    info!(
        "Order {} of {} is now {} ({} FCFA)",
        order.id, establishment_id, order.status, order.total
    );
    Ok(order)
}

/// Fields accepted when creating or editing a table
#[derive(Debug, Clone, Deserialize)]
pub struct TableInput {
    pub name: String,
    #[serde(default)]
    pub seats: u32,
    #[serde(default)]
    pub zone: Option<String>,
}

fn clean_zone(zone: Option<String>) -> Option<String> {
    zone.map(|z| z.trim().to_string()).filter(|z| !z.is_empty())
}

/// Table names are unique within an establishment
pub fn create_table(
    store: &Store,
    establishment_id: &str,
    input: TableInput,
    now: DateTime<Utc>,
) -> Result<Table> {
    let name = require_text("name", &input.name)?;
    store.transaction(|tx| {
        if tx
            .list::<Table>(establishment_id)
            .iter()
            .any(|t| t.name.eq_ignore_ascii_case(&name))
        {
            return Err(NackError::Conflict(format!("a table named {} already exists", name)));
        }
        let table = Table {
            id: new_id(),
            establishment_id: establishment_id.to_string(),
            name,
            seats: input.seats,
            zone: clean_zone(input.zone),
            created_at: now,
        };
        tx.put(table.clone());
        Ok(table)
    })
}

pub fn update_table(
    store: &Store,
    establishment_id: &str,
    table_id: &str,
    input: TableInput,
) -> Result<Table> {
    let name = require_text("name", &input.name)?;
    store.transaction(|tx| {
        if tx
            .list::<Table>(establishment_id)
            .iter()
            .any(|t| t.id != table_id && t.name.eq_ignore_ascii_case(&name))
        {
            return Err(NackError::Conflict(format!("a table named {} already exists", name)));
        }
        let mut table = tx.require::<Table>(establishment_id, table_id)?.clone();
        table.name = name;
        table.seats = input.seats;
        table.zone = clean_zone(input.zone);
        tx.put(table.clone());
        Ok(table)
    })
}

/// A table with pending orders cannot be removed
pub fn delete_table(store: &Store, establishment_id: &str, table_id: &str) -> Result<Table> {
    store.transaction(|tx| {
        let busy = tx.list::<Order>(establishment_id).iter().any(|o| {
            o.status == OrderStatus::Pending && o.table_id.as_deref() == Some(table_id)
        });
        if busy {
            return Err(NackError::Conflict(
                "this table still has pending orders".to_string(),
            ));
        }
        tx.delete::<Table>(establishment_id, table_id)
    })
}

/// First characters of an id, as printed on receipts
pub fn short_ref(id: &str) -> String {
    id.chars().take(8).collect::<String>().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loyalty::add_customer;

    fn product(store: &Store, name: &str, price: i64, quantity: i64) -> Product {
        let now = Utc::now();
        store
            .put(Product {
                id: new_id(),
                establishment_id: "bar".to_string(),
                name: name.to_string(),
                category: "Bières".to_string(),
                price,
                cost: 0,
                quantity,
                low_stock_threshold: 0,
                food_cost: None,
                image: None,
                available: true,
                created_at: now,
                updated_at: now,
            })
            .unwrap()
    }

    fn line(product: &Product, quantity: u32) -> NewOrderItem {
        NewOrderItem {
            product_id: product.id.clone(),
            quantity,
        }
    }

    fn order(items: Vec<NewOrderItem>) -> NewOrder {
        NewOrder {
            items,
            payment_method: PaymentMethod::Cash,
            table_id: None,
            customer_id: None,
            note: None,
        }
    }

    #[test]
    fn lines_are_priced_and_merged() {
        let store = Store::in_memory();
        let regab = product(&store, "Regab", 1_000, 10);
        let castel = product(&store, "Castel", 1_200, 10);

        let o = create_order(
            &store,
            "bar",
            order(vec![line(&regab, 2), line(&castel, 1), line(&regab, 1)]),
            None,
            Utc::now(),
        )
        .unwrap();

        assert_eq!(o.items.len(), 2);
        assert_eq!(o.items[0].name, "Regab");
        assert_eq!(o.items[0].quantity, 3);
        assert_eq!(o.total, 4_200);
        assert_eq!(o.status, OrderStatus::Pending);
        assert_eq!(store.require::<Product>("bar", &regab.id).unwrap().quantity, 10);
    }

    #[test]
    fn bad_orders_are_rejected() {
        let store = Store::in_memory();
        let regab = product(&store, "Regab", 1_000, 10);
        let now = Utc::now();

        assert!(create_order(&store, "bar", order(vec![]), None, now).is_err());
        assert!(create_order(&store, "bar", order(vec![line(&regab, 0)]), None, now).is_err());
        assert!(matches!(
            create_order(&store, "other", order(vec![line(&regab, 1)]), None, now),
            Err(NackError::NotFound("Product"))
        ));

        let mut with_table = order(vec![line(&regab, 1)]);
        with_table.table_id = Some("missing".to_string());
        assert!(matches!(
            create_order(&store, "bar", with_table, None, now),
            Err(NackError::NotFound("Table"))
        ));
        assert!(store.list::<Order>("bar").is_empty());
    }

    #[test]
    fn sending_decrements_stock_once() {
        let store = Store::in_memory();
        let rules = LoyaltyRules::default();
        let regab = product(&store, "Regab", 1_000, 5);
        let now = Utc::now();
        let o = create_order(&store, "bar", order(vec![line(&regab, 2)]), None, now).unwrap();

        let sent = update_status(&store, "bar", &o.id, OrderStatus::Sent, &rules, now).unwrap();
        assert_eq!(sent.status, OrderStatus::Sent);
        assert_eq!(store.require::<Product>("bar", &regab.id).unwrap().quantity, 3);

        assert!(matches!(
            update_status(&store, "bar", &o.id, OrderStatus::Sent, &rules, now),
            Err(NackError::InvalidTransition { .. })
        ));
        assert!(update_status(&store, "bar", &o.id, OrderStatus::Cancelled, &rules, now).is_err());
        assert_eq!(store.require::<Product>("bar", &regab.id).unwrap().quantity, 3);
    }

    #[test]
    fn short_stock_leaves_everything_untouched() {
        let store = Store::in_memory();
        let rules = LoyaltyRules::default();
        let regab = product(&store, "Regab", 1_000, 5);
        let castel = product(&store, "Castel", 1_200, 1);
        let now = Utc::now();
        let o = create_order(
            &store,
            "bar",
            order(vec![line(&regab, 2), line(&castel, 2)]),
            None,
            now,
        )
        .unwrap();

        assert!(matches!(
            update_status(&store, "bar", &o.id, OrderStatus::Sent, &rules, now),
            Err(NackError::InsufficientStock { available: 1, requested: 2, .. })
        ));
        assert_eq!(store.require::<Product>("bar", &regab.id).unwrap().quantity, 5);
        assert_eq!(store.require::<Product>("bar", &castel.id).unwrap().quantity, 1);
        assert_eq!(
            store.require::<Order>("bar", &o.id).unwrap().status,
            OrderStatus::Pending
        );
    }

    #[test]
    fn cancelling_keeps_stock() {
        let store = Store::in_memory();
        let rules = LoyaltyRules::default();
        let regab = product(&store, "Regab", 1_000, 5);
        let now = Utc::now();
        let o = create_order(&store, "bar", order(vec![line(&regab, 2)]), None, now).unwrap();

        update_status(&store, "bar", &o.id, OrderStatus::Cancelled, &rules, now).unwrap();
        assert_eq!(store.require::<Product>("bar", &regab.id).unwrap().quantity, 5);
        assert!(update_status(&store, "bar", &o.id, OrderStatus::Sent, &rules, now).is_err());
    }

    #[test]
    fn sending_credits_the_customer() {
        let store = Store::in_memory();
        let rules = LoyaltyRules::default();
        let now = Utc::now();
        let regab = product(&store, "Regab", 1_000, 10);
        let customer = add_customer(&store, "bar", "Ines", "+24107112233", now).unwrap();

        let mut new_order = order(vec![line(&regab, 3)]);
        new_order.customer_id = Some(customer.id.clone());
        let o = create_order(&store, "bar", new_order, None, now).unwrap();
        update_status(&store, "bar", &o.id, OrderStatus::Sent, &rules, now).unwrap();

        let customer = store.require::<Customer>("bar", &customer.id).unwrap();
        assert_eq!(customer.points, 3);
        assert_eq!(customer.total_spent, 3_000);
        assert_eq!(customer.visits, 1);
    }

    #[test]
    fn transitions() {
        use OrderStatus::*;
        assert!(can_transition(Pending, Sent));
        assert!(can_transition(Pending, Cancelled));
        assert!(!can_transition(Pending, Pending));
        assert!(!can_transition(Sent, Cancelled));
        assert!(!can_transition(Cancelled, Sent));
    }

    #[test]
    fn tables_have_unique_names_and_stay_while_busy() {
        let store = Store::in_memory();
        let now = Utc::now();
        let input = |name: &str| TableInput {
            name: name.to_string(),
            seats: 4,
            zone: Some(" Terrasse ".to_string()),
        };
        let table = create_table(&store, "bar", input("T1"), now).unwrap();
        assert_eq!(table.zone.as_deref(), Some("Terrasse"));
        assert!(matches!(
            create_table(&store, "bar", input("t1"), now),
            Err(NackError::Conflict(_))
        ));
        let other = create_table(&store, "bar", input("T2"), now).unwrap();
        assert!(update_table(&store, "bar", &other.id, input("T1")).is_err());
        assert_eq!(update_table(&store, "bar", &other.id, input("T3")).unwrap().name, "T3");

        let regab = product(&store, "Regab", 1_000, 10);
        let mut new_order = order(vec![line(&regab, 1)]);
        new_order.table_id = Some(table.id.clone());
        let pending = create_order(&store, "bar", new_order, None, now).unwrap();
        assert!(matches!(
            delete_table(&store, "bar", &table.id),
            Err(NackError::Conflict(_))
        ));

        update_status(&store, "bar", &pending.id, OrderStatus::Sent, &LoyaltyRules::default(), now)
            .unwrap();
        delete_table(&store, "bar", &table.id).unwrap();
        assert!(store.get::<Table>("bar", &table.id).is_none());
    }

    #[test]
    fn oversized_orders_are_refused() {
        let store = Store::in_memory();
        let regab = product(&store, "Regab", 1_000, 10);
        let now = Utc::now();

        assert!(matches!(
            create_order(&store, "bar", order(vec![line(&regab, u32::MAX), line(&regab, 2)]), None, now),
            Err(NackError::Validation(_))
        ));

        let pricey = product(&store, "Champagne", i64::MAX / 2, 10);
        assert!(matches!(
            create_order(&store, "bar", order(vec![line(&pricey, 3)]), None, now),
            Err(NackError::Validation(_))
        ));
        assert!(store.list::<Order>("bar").is_empty());
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{NackError, Result};
use crate::models::{FoodCost, HostedImage, Product, new_id};
use crate::store::Store;
use crate::validation::{require_non_negative, require_text};

/// Fields accepted when creating or editing a product
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub name: String,
    #[serde(default)]
    pub category: String,
    pub price: i64,
    #[serde(default)]
    pub cost: i64,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub low_stock_threshold: i64,
    #[serde(default)]
    pub food_cost: Option<FoodCost>,
    #[serde(default)]
    pub image: Option<HostedImage>,
    #[serde(default)]
    pub available: Option<bool>,
}

impl ProductInput {
    fn validate(&self) -> Result<String> {
        let name = require_text("name", &self.name)?;
        require_non_negative("price", self.price)?;
        require_non_negative("cost", self.cost)?;
        require_non_negative("quantity", self.quantity)?;
        require_non_negative("low stock threshold", self.low_stock_threshold)?;
        if let Some(food_cost) = &self.food_cost {
            for ingredient in &food_cost.ingredients {
                require_text("ingredient name", &ingredient.name)?;
                require_non_negative("ingredient cost", ingredient.unit_cost)?;
                if !(ingredient.quantity >= 0.0) {
                    return Err(NackError::invalid("ingredient quantity cannot be negative"));
                }
            }
        }
        Ok(name)
    }
}

pub fn create_product(
    store: &Store,
    establishment_id: &str,
    input: ProductInput,
    now: DateTime<Utc>,
) -> Result<Product> {
    let name = input.validate()?;
    store.put(Product {
        id: new_id(),
        establishment_id: establishment_id.to_string(),
        name,
        category: input.category.trim().to_string(),
        price: input.price,
        cost: input.cost,
        quantity: input.quantity,
        low_stock_threshold: input.low_stock_threshold,
        food_cost: input.food_cost,
        image: input.image,
        available: input.available.unwrap_or(true),
        created_at: now,
        updated_at: now,
    })
}

pub fn update_product(
    store: &Store,
    establishment_id: &str,
    product_id: &str,
    input: ProductInput,
    now: DateTime<Utc>,
) -> Result<Product> {
    let name = input.validate()?;
    store.update::<Product, _>(establishment_id, product_id, |product| {
        product.name = name;
        product.category = input.category.trim().to_string();
        product.price = input.price;
        product.cost = input.cost;
        product.quantity = input.quantity;
        product.low_stock_threshold = input.low_stock_threshold;
        product.food_cost = input.food_cost;
        product.image = input.image;
        if let Some(available) = input.available {
            product.available = available;
        }
        product.updated_at = now;
        Ok(())
    })
}

/// Add `delta` to the stock; the result may not drop below zero
pub fn adjust_stock(product: &mut Product, delta: i64) -> Result<()> {
    let quantity = product
        .quantity
        .checked_add(delta)
        .ok_or_else(|| NackError::invalid("stock quantity is too large"))?;
    if quantity < 0 {
        return Err(NackError::InsufficientStock {
            product: product.name.clone(),
            available: product.quantity,
            requested: delta.saturating_neg(),
        });
    }
    product.quantity = quantity;
    Ok(())
}

pub fn restock(
    store: &Store,
    establishment_id: &str,
    product_id: &str,
    delta: i64,
    now: DateTime<Utc>,
) -> Result<Product> {
    store.update::<Product, _>(establishment_id, product_id, |product| {
        adjust_stock(product, delta)?;
        product.updated_at = now;
        Ok(())
    })
}

/// Total cost of the ingredients, rounded to the franc
pub fn food_cost_total(food_cost: &FoodCost) -> i64 {
    food_cost
        .ingredients
        .iter()
        .map(|i| i.quantity * i.unit_cost as f64)
        .sum::<f64>()
        .round() as i64
}

/// Profitability of one product
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Margin {
    pub price: i64,
    pub cost: i64,
    pub margin: i64,
    /// Cost as a percentage of the selling price
    pub food_cost_percent: f64,
}

/// The breakdown, when there is one, is authoritative over the flat cost
pub fn margin(product: &Product) -> Margin {
    let cost = product
        .food_cost
        .as_ref()
        .filter(|fc| !fc.ingredients.is_empty())
        .map(food_cost_total)
        .unwrap_or(product.cost);

    let food_cost_percent = if product.price > 0 {
        ((cost as f64 / product.price as f64) * 10_000.0).round() / 100.0
    } else {
        0.0
    };

    Margin {
        price: product.price,
        cost,
        margin: product.price - cost,
        food_cost_percent,
    }
}

/// Products at or below their alert threshold, lowest stock first
pub fn low_stock(products: &[Product]) -> Vec<Product> {
    let mut low: Vec<Product> = products
        .iter()
        .filter(|p| p.quantity <= p.low_stock_threshold)
        .cloned()
        .collect();
    low.sort_by(|a, b| a.quantity.cmp(&b.quantity).then_with(|| a.name.cmp(&b.name)));
    low
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Ingredient;

    fn input(name: &str, price: i64, quantity: i64) -> ProductInput {
        ProductInput {
            name: name.to_string(),
            category: "Bières".to_string(),
            price,
            cost: 400,
            quantity,
            low_stock_threshold: 5,
            food_cost: None,
            image: None,
            available: None,
        }
    }

    #[test]
    fn stock_never_goes_negative() {
        let store = Store::in_memory();
        let now = Utc::now();
        let p = create_product(&store, "bar", input("Regab", 1_000, 3), now).unwrap();

        assert!(matches!(
            restock(&store, "bar", &p.id, -4, now),
            Err(NackError::InsufficientStock { available: 3, requested: 4, .. })
        ));
        assert_eq!(store.require::<Product>("bar", &p.id).unwrap().quantity, 3);
        assert_eq!(restock(&store, "bar", &p.id, -3, now).unwrap().quantity, 0);
        assert_eq!(restock(&store, "bar", &p.id, 24, now).unwrap().quantity, 24);
    }

    #[test]
    fn huge_restock_is_refused() {
        let store = Store::in_memory();
        let now = Utc::now();
        let p = create_product(&store, "bar", input("Regab", 1_000, 3), now).unwrap();

        assert!(matches!(
            restock(&store, "bar", &p.id, i64::MAX, now),
            Err(NackError::Validation(_))
        ));
        assert!(matches!(
            restock(&store, "bar", &p.id, i64::MIN, now),
            Err(NackError::InsufficientStock { requested: i64::MAX, .. })
        ));
        assert_eq!(store.require::<Product>("bar", &p.id).unwrap().quantity, 3);
    }

    #[test]
    fn invalid_products_are_rejected() {
        let store = Store::in_memory();
        let now = Utc::now();
        assert!(create_product(&store, "bar", input(" ", 1_000, 1), now).is_err());
        assert!(create_product(&store, "bar", input("Regab", -1, 1), now).is_err());
        assert!(create_product(&store, "bar", input("Regab", 1_000, -1), now).is_err());
        assert!(store.list::<Product>("bar").is_empty());
    }

    #[test]
    fn margin_uses_the_breakdown() {
        let store = Store::in_memory();
        let now = Utc::now();
        let mut brochettes = input("Brochettes", 2_000, 10);
        brochettes.food_cost = Some(FoodCost {
            ingredients: vec![
                Ingredient {
                    name: "Boeuf".to_string(),
                    quantity: 0.25,
                    unit: "kg".to_string(),
                    unit_cost: 4_000,
                },
                Ingredient {
                    name: "Piment".to_string(),
                    quantity: 2.0,
                    unit: "pièce".to_string(),
                    unit_cost: 50,
                },
            ],
        });
        let p = create_product(&store, "bar", brochettes, now).unwrap();

        let m = margin(&p);
        assert_eq!(m.cost, 1_100);
        assert_eq!(m.margin, 900);
        assert_eq!(m.food_cost_percent, 55.0);

        let flat = create_product(&store, "bar", input("Regab", 1_000, 10), now).unwrap();
        assert_eq!(margin(&flat).cost, 400);
    }

    #[test]
    fn low_stock_is_sorted() {
        let store = Store::in_memory();
        let now = Utc::now();
        create_product(&store, "bar", input("Castel", 1_000, 5), now).unwrap();
        create_product(&store, "bar", input("Regab", 1_000, 2), now).unwrap();
        create_product(&store, "bar", input("Guinness", 1_500, 30), now).unwrap();

        let names: Vec<String> = low_stock(&store.list::<Product>("bar"))
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Regab", "Castel"]);
    }
}

//! Public digital menu

use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::{Product, Profile};
use crate::reports::format_fcfa;

/// Heading for products filed under no category
const OTHER_CATEGORY: &str = "Autres";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MenuItem {
    pub id: String,
    pub name: String,
    pub price: i64,
    pub price_label: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MenuSection {
    pub category: String,
    pub items: Vec<MenuItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Menu {
    pub establishment_id: String,
    pub establishment_name: String,
    pub address: Option<String>,
    pub logo_url: Option<String>,
    pub sections: Vec<MenuSection>,
}

/// Group the products on sale by category
///
/// Hidden and out-of-stock products are left out. Categories are sorted by
/// name with uncategorized products last; items are sorted by name.
pub fn build_menu(profile: &Profile, products: &[Product]) -> Menu {
    let mut categories: BTreeMap<String, Vec<MenuItem>> = BTreeMap::new();
    let mut others = Vec::new();

    for product in products
        .iter()
        .filter(|p| p.establishment_id == profile.id && p.available && p.quantity > 0)
    {
        let item = MenuItem {
            id: product.id.clone(),
            name: product.name.clone(),
            price: product.price,
            price_label: format_fcfa(product.price),
            image_url: product.image.as_ref().map(|i| i.url.clone()),
        };
        let category = product.category.trim();
        if category.is_empty() {
            others.push(item);
        } else {
            categories.entry(category.to_string()).or_default().push(item);
        }
    }

    let mut sections: Vec<MenuSection> = categories
        .into_iter()
        .map(|(category, items)| MenuSection { category, items })
        .collect();
    if !others.is_empty() {
        sections.push(MenuSection {
            category: OTHER_CATEGORY.to_string(),
            items: others,
        });
    }
    for section in sections.iter_mut() {
        section
            .items
            .sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    }

    Menu {
        establishment_id: profile.id.clone(),
        establishment_name: profile.establishment_name.clone(),
        address: profile.address.clone(),
        logo_url: profile.logo.as_ref().map(|l| l.url.clone()),
        sections,
    }
}

#[cfg(feature = "web")]
pub fn menu_html(menu: &Menu) -> crate::error::Result<String> {
    crate::templates::render("menu", menu)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::new_id;
    use chrono::Utc;

    fn product(est: &str, name: &str, category: &str, quantity: i64, available: bool) -> Product {
        let now = Utc::now();
        Product {
            id: new_id(),
            establishment_id: est.to_string(),
            name: name.to_string(),
            category: category.to_string(),
            price: 1_500,
            cost: 0,
            quantity,
            low_stock_threshold: 0,
            food_cost: None,
            image: None,
            available,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn groups_and_filters() {
        let profile = Profile::new("Chez Max", "Max", "max@bar.ga", "+24106123456", "h", Utc::now());
        let id = profile.id.clone();
        let products = vec![
            product(&id, "Regab", "Bières", 10, true),
            product(&id, "Castel", "Bières", 10, true),
            product(&id, "Poulet DG", "Plats", 3, true),
            product(&id, "Coca", "", 5, true),
            product(&id, "Guinness", "Bières", 0, true),
            product(&id, "Secret", "Plats", 5, false),
            product("other", "Ailleurs", "Bières", 5, true),
        ];

        let menu = build_menu(&profile, &products);
        let categories: Vec<&str> = menu.sections.iter().map(|s| s.category.as_str()).collect();
        assert_eq!(categories, vec!["Bières", "Plats", "Autres"]);

        let beers: Vec<&str> = menu.sections[0].items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(beers, vec!["Castel", "Regab"]);
        assert_eq!(menu.sections[1].items.len(), 1);
        assert_eq!(menu.sections[0].items[0].price_label, "1 500 FCFA");
    }

    #[cfg(feature = "web")]
    #[test]
    fn renders_html() {
        let profile = Profile::new("Chez Max", "Max", "max@bar.ga", "+24106123456", "h", Utc::now());
        let products = vec![product(&profile.id, "Regab", "Bières", 10, true)];
        let html = menu_html(&build_menu(&profile, &products)).unwrap();
        assert!(html.contains("Chez Max"));
        assert!(html.contains("Regab"));
        assert!(html.contains("1 500 FCFA"));
    }
}

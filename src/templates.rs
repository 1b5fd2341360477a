#![cfg(feature = "web")]
//! Server-rendered HTML pages

use handlebars::Handlebars;
use lazy_static::lazy_static;
use serde::Serialize;

use crate::error::{NackError, Result};

lazy_static! {
    static ref TEMPLATES: Handlebars<'static> = {
        let mut registry = Handlebars::new();
        registry
            .register_template_string("menu", include_str!("./templates/menu.hbs"))
            .unwrap();
        registry
            .register_template_string("receipt", include_str!("./templates/receipt.hbs"))
            .unwrap();
        registry
            .register_template_string("ticket", include_str!("./templates/ticket.hbs"))
            .unwrap();
        registry
    };
}

/// Render one of the bundled templates with `data`
pub fn render<T: Serialize>(template: &str, data: &T) -> Result<String> {
    TEMPLATES
        .render(template, data)
        .map_err(|e| NackError::Internal(format!("cannot render {}: {}", template, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn values_are_escaped() {
        let html = render(
            "menu",
            &json!({
                "establishment_name": "<script>alert(1)</script>",
                "sections": []
            }),
        )
        .unwrap();
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("Le menu est vide"));
    }

    #[test]
    fn unknown_template_is_an_error() {
        assert!(render("invoice", &json!({})).is_err());
    }
}

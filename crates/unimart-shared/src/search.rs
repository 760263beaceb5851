use crate::types::Product;

/// Feed search: name or description contain the query (case-insensitive),
/// or the contact number contains it verbatim. A blank query keeps every
/// product.
pub fn filter_products<'a>(products: &'a [Product], query: &str) -> Vec<&'a Product> {
    if query.trim().is_empty() {
        return products.iter().collect();
    }
    let needle = query.to_lowercase();
    products
        .iter()
        .filter(|p| {
            p.name.to_lowercase().contains(&needle)
                || p.description.to_lowercase().contains(&needle)
                || p.contact.contains(query)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(name: &str, description: &str, contact: &str) -> Product {
        Product {
            name: name.into(),
            description: description.into(),
            contact: contact.into(),
            price: 1.0,
            ..Default::default()
        }
    }

    #[test]
    fn blank_query_keeps_everything() {
        let products = vec![product("Bike", "", ""), product("Lamp", "", "")];
        assert_eq!(filter_products(&products, "   ").len(), 2);
    }

    #[test]
    fn matches_name_description_and_contact() {
        let products = vec![
            product("Mountain BIKE", "", "0700000001"),
            product("Lamp", "fits a bike rack", "0700000002"),
            product("Chair", "wooden", "0799999999"),
        ];
        let names: Vec<_> = filter_products(&products, "bike").iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Mountain BIKE", "Lamp"]);

        let by_contact = filter_products(&products, "79999");
        assert_eq!(by_contact.len(), 1);
        assert_eq!(by_contact[0].name, "Chair");
    }
}

use crate::catalog::{Product, ProductVariation};
use serde::{Deserialize, Serialize};

/// CartLine — one line of a customer's cart as stored by the cart subsystem.
///
/// This subsystem only reads cart lines and deletes them after a successful
/// checkout; adding and updating lines is external.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CartLine {
    pub id: i64,
    #[serde(rename = "customer_id")]
    pub customer_id: i64,
    #[serde(rename = "product_id")]
    pub product_id: i64,
    #[serde(rename = "variation_id")]
    pub variation_id: Option<i64>,
    pub quantity: i32,
    /// Price captured when the line was added, in minor units. This is the
    /// price the order snapshot uses.
    #[serde(rename = "unit_price")]
    pub unit_price: i64,
}

/// ResolvedCartLine — a cart line joined to its product and, when selected,
/// its variation. Produced by the cart repository for the checkout path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolvedCartLine {
    pub line: CartLine,
    pub product: Product,
    pub variation: Option<ProductVariation>,
}

impl ResolvedCartLine {
    /// The vendor whose order this line belongs to.
    pub fn vendor_id(&self) -> i64 {
        self.product.vendor_id
    }

    /// Snapshot name for the order item: product name, suffixed with the
    /// variation name when a variation was selected.
    pub fn snapshot_name(&self) -> String {
        match &self.variation {
            Some(v) => format!("{} - {}", self.product.name, v.name),
            None => self.product.name.clone(),
        }
    }

    /// Snapshot SKU: the variation SKU wins over the product SKU.
    pub fn snapshot_sku(&self) -> &str {
        match &self.variation {
            Some(v) => &v.sku,
            None => &self.product.sku,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_with_variation(variation: Option<ProductVariation>) -> ResolvedCartLine {
        ResolvedCartLine {
            line: CartLine {
                id: 1,
                customer_id: 7,
                product_id: 10,
                variation_id: variation.as_ref().map(|v| v.id),
                quantity: 2,
                unit_price: 1000,
            },
            product: Product {
                id: 10,
                vendor_id: 3,
                name: "Basmati Rice".into(),
                sku: "RICE-01".into(),
                price: 1000,
                stock_quantity: 50,
                track_stock: true,
            },
            variation,
        }
    }

    #[test]
    fn test_snapshot_without_variation() {
        let line = line_with_variation(None);
        assert_eq!(line.snapshot_name(), "Basmati Rice");
        assert_eq!(line.snapshot_sku(), "RICE-01");
    }

    #[test]
    fn test_snapshot_with_variation() {
        let line = line_with_variation(Some(ProductVariation {
            id: 99,
            product_id: 10,
            name: "5kg".into(),
            sku: "RICE-01-5KG".into(),
            price: 4500,
            stock_quantity: 12,
        }));
        assert_eq!(line.snapshot_name(), "Basmati Rice - 5kg");
        assert_eq!(line.snapshot_sku(), "RICE-01-5KG");
    }
}

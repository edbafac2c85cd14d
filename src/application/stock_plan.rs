use std::collections::BTreeMap;

use crate::domain::errors::OrderError;
use crate::domain::order::{OrderItem, StockAdjustment};

/// An order line priced during the read phase, with the stock observed then.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedLine {
    pub item: OrderItem,
    pub available: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PlannedProduct {
    requested: i32,
    available: i32,
}

/// The consolidated stock movement of one order: one entry per distinct product.
#[derive(Debug, Clone, Default)]
pub struct StockPlan {
    products: BTreeMap<String, PlannedProduct>,
}

impl StockPlan {
    pub fn from_lines(lines: &[PricedLine]) -> Result<Self, OrderError> {
        let mut products: BTreeMap<String, PlannedProduct> = BTreeMap::new();
        for line in lines {
            let entry = products
                .entry(line.item.product_id.clone())
                .or_insert(PlannedProduct {
                    requested: 0,
                    available: line.available,
                });
            entry.requested = entry
                .requested
                .checked_add(line.item.quantity)
                .ok_or_else(|| {
                    OrderError::InvalidInput(format!(
                        "total quantity for product {} is too large",
                        line.item.product_id
                    ))
                })?;
            entry.available = entry.available.min(line.available);
        }
        Ok(Self { products })
    }

    /// Rejects products whose summed quantity exceeds the observed stock.
    pub fn ensure_available(&self) -> Result<(), OrderError> {
        match self
            .products
            .iter()
            .find(|(_, planned)| planned.requested > planned.available)
        {
            Some((product_id, planned)) => Err(OrderError::InsufficientStockForOrder {
                product_id: product_id.clone(),
                requested: planned.requested,
                available: planned.available,
            }),
            None => Ok(()),
        }
    }

    pub fn adjustments(&self) -> Vec<StockAdjustment> {
        self.products
            .iter()
            .map(|(product_id, planned)| StockAdjustment {
                product_id: product_id.clone(),
                delta: -planned.requested,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use bigdecimal::BigDecimal;

    use super::*;

    fn line(product_id: &str, quantity: i32, available: i32) -> PricedLine {
        PricedLine {
            item: OrderItem {
                product_id: product_id.to_string(),
                quantity,
                price_at_purchase: BigDecimal::from(1),
            },
            available,
        }
    }

    #[test]
    fn duplicate_products_collapse_into_one_delta() {
        let plan =
            StockPlan::from_lines(&[line("p1", 2, 10), line("p2", 1, 10), line("p1", 3, 10)])
                .expect("plan");

        let mut adjustments = plan.adjustments();
        adjustments.sort_by(|a, b| a.product_id.cmp(&b.product_id));

        assert_eq!(
            adjustments,
            vec![
                StockAdjustment {
                    product_id: "p1".into(),
                    delta: -5
                },
                StockAdjustment {
                    product_id: "p2".into(),
                    delta: -1
                },
            ]
        );
    }

    #[test]
    fn summed_quantity_is_checked_against_observed_stock() {
        let plan = StockPlan::from_lines(&[line("p1", 3, 5), line("p1", 3, 5)]).expect("plan");

        match plan.ensure_available() {
            Err(OrderError::InsufficientStockForOrder {
                product_id,
                requested,
                available,
            }) => {
                assert_eq!(product_id, "p1");
                assert_eq!(requested, 6);
                assert_eq!(available, 5);
            }
            other => panic!("expected InsufficientStockForOrder, got {other:?}"),
        }
    }

    #[test]
    fn lowest_observed_stock_wins() {
        let plan = StockPlan::from_lines(&[line("p1", 2, 9), line("p1", 2, 3)]).expect("plan");
        assert!(plan.ensure_available().is_err());
    }

    #[test]
    fn overflowing_quantity_is_invalid_input() {
        let result = StockPlan::from_lines(&[line("p1", i32::MAX, i32::MAX), line("p1", 1, i32::MAX)]);
        assert!(matches!(result, Err(OrderError::InvalidInput(_))));
    }
}

use std::sync::Arc;

use crates::domain::value_objects::{payments::PriceQuoteDto, pricing::PriceTable};

/// Public price list, computed from the same table checkout charges from.
pub struct PlanCatalogUseCase {
    price_table: Arc<PriceTable>,
}

impl PlanCatalogUseCase {
    pub fn new(price_table: Arc<PriceTable>) -> Self {
        Self { price_table }
    }

    pub fn list_plans(&self) -> Vec<PriceQuoteDto> {
        let discount_percent = self.price_table.discount_percent();
        self.price_table
            .quotes()
            .into_iter()
            .map(|quote| PriceQuoteDto::from_quote(quote, discount_percent))
            .collect()
    }
}

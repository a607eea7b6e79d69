use std::sync::Arc;

use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};
use crates::domain::value_objects::pricing::PriceTable;

use crate::usecases::plans::PlanCatalogUseCase;

pub fn routes(price_table: Arc<PriceTable>) -> Router {
    Router::new()
        .route("/api/plans", get(list_plans))
        .with_state(Arc::new(PlanCatalogUseCase::new(price_table)))
}

pub async fn list_plans(State(usecase): State<Arc<PlanCatalogUseCase>>) -> impl IntoResponse {
    Json(usecase.list_plans())
}

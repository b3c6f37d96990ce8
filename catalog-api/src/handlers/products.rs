use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use catalog_core::{Product, ProductId};
use catalog_telemetry::{
    aggregators::{AggregateStats, InventoryThresholds},
    correlation::RequestContext,
    events::BusinessEvent,
};
use tracing::debug;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::*,
    error::{ApiError, ApiResult},
    observability::Correlated,
    AppState,
};

/// True when `stock` is under the alert threshold and was not already under it.
fn crossed_low_stock(thresholds: &InventoryThresholds, previous: Option<i32>, stock: i32) -> bool {
    let threshold = thresholds.low_stock_threshold;
    stock < threshold && previous.map_or(true, |before| before >= threshold)
}

fn alert_on_low_stock(state: &AppState, ctx: &RequestContext, previous: Option<i32>, product: &Product) {
    let thresholds = state.telemetry.thresholds();
    if crossed_low_stock(thresholds, previous, product.stock) {
        let event = BusinessEvent::low_stock_alert(ctx, product, thresholds.low_stock_threshold);
        state.telemetry.events.emit(ctx, &event);
    }
}

async fn find(state: &AppState, id: Uuid) -> ApiResult<Product> {
    state
        .store
        .get(&ProductId::from(id))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Product {} not found", id)))
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListProductsQuery>,
) -> ApiResult<Json<Vec<ProductResponse>>> {
    let products = match query.category.as_deref() {
        Some(category) => state.store.list_by_category(category).await?,
        None => {
            let products = state.store.list().await?;
            state.telemetry.aggregator.observe(&products);
            products
        }
    };

    debug!(count = products.len(), "Listed products");

    Ok(Json(products.into_iter().map(ProductResponse::from).collect()))
}

pub async fn stats(State(state): State<AppState>) -> ApiResult<Json<AggregateStats>> {
    let products = state.store.list().await?;
    let stats = state.telemetry.aggregator.observe(&products);

    Ok(Json(stats.as_ref().clone()))
}

pub async fn get(
    State(state): State<AppState>,
    Correlated(ctx): Correlated,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ProductResponse>> {
    let product = find(&state, id).await?;

    let thresholds = state.telemetry.thresholds();
    if thresholds.is_high_value(&product) {
        let event = BusinessEvent::high_value_access(&ctx, &product, thresholds.high_value_threshold);
        state.telemetry.events.emit(&ctx, &event);
    }

    Ok(Json(ProductResponse::from(product)))
}

pub async fn create(
    State(state): State<AppState>,
    Correlated(ctx): Correlated,
    Json(payload): Json<CreateProductRequest>,
) -> ApiResult<(StatusCode, Json<ProductResponse>)> {
    payload.validate()?;

    let created = state.store.create(Product::from(payload)).await?;

    state
        .telemetry
        .events
        .emit(&ctx, &BusinessEvent::created(&ctx, &created));
    alert_on_low_stock(&state, &ctx, None, &created);

    Ok((StatusCode::CREATED, Json(ProductResponse::from(created))))
}

pub async fn update(
    State(state): State<AppState>,
    Correlated(ctx): Correlated,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> ApiResult<Json<ProductResponse>> {
    payload.validate()?;

    let existing = find(&state, id).await?;
    let mut changed = existing.clone();
    changed.apply(payload.into());
    changed.validate()?;

    let updated = state.store.update(changed).await?;

    state
        .telemetry
        .events
        .emit(&ctx, &BusinessEvent::updated(&ctx, &existing, &updated));
    alert_on_low_stock(&state, &ctx, Some(existing.stock), &updated);

    Ok(Json(ProductResponse::from(updated)))
}

pub async fn delete(
    State(state): State<AppState>,
    Correlated(ctx): Correlated,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let existing = find(&state, id).await?;

    if !state.store.delete(&existing.id).await? {
        return Err(ApiError::NotFound(format!("Product {} not found", id)));
    }

    state
        .telemetry
        .events
        .emit(&ctx, &BusinessEvent::deleted(&ctx, &existing));

    Ok(StatusCode::NO_CONTENT)
}

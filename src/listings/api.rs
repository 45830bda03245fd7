//! Listing API Endpoints
//! Mission: Browse, search and manage rental listings
//!
//! Every route here sits behind the access gate. Mutations and
//! `my-listings` additionally sit behind the owner role gate; update and
//! delete then check ownership of the specific listing.

use crate::api::error::ApiError;
use crate::auth::{middleware::CurrentUser, models::User};
use crate::listings::{
    models::{CreateListingRequest, Listing, ListingView, UpdateListingRequest},
    query::{ListingFilters, ListingQuery, ListingQueryParams, ListingScope},
    store::ListingStore,
};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

const NOT_FOUND: &str = "House not found";

#[derive(Debug, Serialize)]
pub struct ListingsResponse {
    pub success: bool,
    pub count: usize,
    pub data: Vec<ListingView>,
}

#[derive(Debug, Serialize)]
pub struct ListingResponse {
    pub success: bool,
    pub data: ListingView,
}

#[derive(Debug, Serialize)]
pub struct LocationsResponse {
    pub success: bool,
    pub data: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub success: bool,
    pub message: String,
}

impl ListingsResponse {
    fn new(data: Vec<ListingView>) -> Self {
        Self {
            success: true,
            count: data.len(),
            data,
        }
    }
}

/// Browse available listings - GET /api/houses
pub async fn list_listings(
    State(store): State<Arc<ListingStore>>,
    Query(params): Query<ListingQueryParams>,
) -> Result<Json<ListingsResponse>, ApiError> {
    let filters = ListingFilters::from_params(params).map_err(ApiError::Validation)?;
    let query = ListingQuery::build(ListingScope::Browse, filters);
    debug!(clauses = query.clauses().len(), "Browsing listings");

    Ok(Json(ListingsResponse::new(store.find(&query)?)))
}

/// Caller's own listings, available or not - GET /api/houses/my-listings
pub async fn my_listings(
    State(store): State<Arc<ListingStore>>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<ListingQueryParams>,
) -> Result<Json<ListingsResponse>, ApiError> {
    let filters = ListingFilters::from_params(params).map_err(ApiError::Validation)?;
    let query = ListingQuery::build(ListingScope::OwnedBy(user.id), filters);

    Ok(Json(ListingsResponse::new(store.find(&query)?)))
}

/// Single listing - GET /api/houses/:id
pub async fn get_listing(
    State(store): State<Arc<ListingStore>>,
    Path(id): Path<String>,
) -> Result<Json<ListingResponse>, ApiError> {
    let id = parse_listing_id(&id)?;
    let listing = store
        .get(&id)?
        .ok_or_else(|| ApiError::NotFound(NOT_FOUND.to_string()))?;

    Ok(Json(ListingResponse {
        success: true,
        data: listing,
    }))
}

/// Create listing - POST /api/houses (owner only)
pub async fn create_listing(
    State(store): State<Arc<ListingStore>>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<CreateListingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ListingResponse>), ApiError> {
    let Json(payload) = payload?;
    let new_listing = payload.validate().map_err(ApiError::Validation)?;

    let created = store.create(&user.id, new_listing)?;
    let view = store
        .get(&created.id)?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("listing {} vanished", created.id)))?;

    Ok((
        StatusCode::CREATED,
        Json(ListingResponse {
            success: true,
            data: view,
        }),
    ))
}

/// Update listing - PUT /api/houses/:id (owner only, own listings)
pub async fn update_listing(
    State(store): State<Arc<ListingStore>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    payload: Result<Json<UpdateListingRequest>, JsonRejection>,
) -> Result<Json<ListingResponse>, ApiError> {
    let id = parse_listing_id(&id)?;
    let mut listing = load_owned(&store, &id, &user, "update")?;

    // Existence and ownership are settled before the body is looked at
    let Json(payload) = payload?;
    payload
        .apply_to(&mut listing)
        .map_err(ApiError::Validation)?;
    store.update(&listing)?;

    let view = store
        .get(&id)?
        .ok_or_else(|| ApiError::NotFound(NOT_FOUND.to_string()))?;

    Ok(Json(ListingResponse {
        success: true,
        data: view,
    }))
}

/// Delete listing - DELETE /api/houses/:id (owner only, own listings)
pub async fn delete_listing(
    State(store): State<Arc<ListingStore>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let id = parse_listing_id(&id)?;

    load_owned(&store, &id, &user, "delete")?;
    if !store.delete(&id)? {
        return Err(ApiError::NotFound(NOT_FOUND.to_string()));
    }

    Ok(Json(DeletedResponse {
        success: true,
        message: "House listing deleted successfully".to_string(),
    }))
}

/// Locations with at least one available listing - GET /api/houses/locations/available
pub async fn available_locations(
    State(store): State<Arc<ListingStore>>,
) -> Result<Json<LocationsResponse>, ApiError> {
    Ok(Json(LocationsResponse {
        success: true,
        data: store.available_locations()?,
    }))
}

/// Ids that are not UUIDs cannot name a listing, so they are "not found"
fn parse_listing_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound(NOT_FOUND.to_string()))
}

/// Load a listing for mutation: `NotFound` if absent, `Forbidden` if the
/// caller is not its owner
fn load_owned(
    store: &ListingStore,
    id: &Uuid,
    user: &User,
    action: &str,
) -> Result<Listing, ApiError> {
    let listing = store
        .get_listing(id)?
        .ok_or_else(|| ApiError::NotFound(NOT_FOUND.to_string()))?;

    ensure_owner(&listing, user, action)?;
    Ok(listing)
}

pub fn ensure_owner(listing: &Listing, user: &User, action: &str) -> Result<(), ApiError> {
    if listing.owner != user.id {
        warn!(
            listing_id = %listing.id,
            user_id = %user.id,
            action,
            "Ownership check failed"
        );
        return Err(ApiError::Forbidden(format!(
            "Not authorized to {} this listing",
            action
        )));
    }
    Ok(())
}

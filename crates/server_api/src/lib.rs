use std::time::{Duration, Instant};

use bucket_sort::BucketSorter;
use serde::de::DeserializeOwned;
use shared::{
    domain::{ArrayData, ArrayId},
    error::{ApiError, ErrorCode},
    protocol::{
        ArrayPayload, CreateArrayRequest, Page, PatchArrayRequest, SortRequest, SortResponse,
        UpdateArrayRequest,
    },
};
use storage::{Storage, StoredArray};
use tracing::{debug, info};

pub const DEFAULT_PAGE_SIZE: u32 = 50;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub sorter: BucketSorter,
    pub page_size: u32,
}

impl ApiContext {
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            sorter: BucketSorter::default(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

pub fn arrays_route() -> &'static str {
    "/api/arrays/"
}

pub fn array_route(array_id: ArrayId) -> String {
    format!("{}{}/", arrays_route(), array_id.0)
}

pub fn sort_route() -> &'static str {
    "/api/sort/"
}

/// Decodes a JSON request body. Both unparseable JSON and JSON of the wrong
/// shape are validation errors.
pub fn parse_json_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| {
        ApiError::new(
            ErrorCode::Validation,
            format!("invalid JSON in request body: {e}"),
        )
    })
}

/// Lists arrays ordered by id, one page at a time.
///
/// `page` is the raw `?page=` query value: absent or empty means the first
/// page, `last` means the final page. Anything else must be a page number
/// within range, except that the first page of an empty table is always valid.
pub async fn list_arrays(
    ctx: &ApiContext,
    page: Option<&str>,
) -> Result<Page<ArrayPayload>, ApiError> {
    let page_size = i64::from(ctx.page_size.max(1));
    let count = ctx.storage.count_arrays().await.map_err(internal)?;
    let num_pages = ((count + page_size - 1) / page_size).max(1);
    let page = resolve_page(page, num_pages)?;

    let arrays = ctx
        .storage
        .list_arrays((page - 1) * page_size, page_size)
        .await
        .map_err(internal)?;

    Ok(Page {
        count,
        next: (page < num_pages).then(|| page_link(page + 1)),
        previous: (page > 1).then(|| page_link(page - 1)),
        results: arrays.into_iter().map(payload).collect(),
    })
}

pub async fn create_array(
    ctx: &ApiContext,
    request: CreateArrayRequest,
) -> Result<ArrayPayload, ApiError> {
    let created = ctx
        .storage
        .create_array(&request.data, request.is_sorted)
        .await
        .map_err(internal)?;
    debug!(array_id = created.array_id.0, len = created.data.len(), "created array");
    Ok(payload(created))
}

pub async fn retrieve_array(ctx: &ApiContext, array_id: ArrayId) -> Result<ArrayPayload, ApiError> {
    load_array(ctx, array_id).await.map(payload)
}

pub async fn update_array(
    ctx: &ApiContext,
    array_id: ArrayId,
    request: UpdateArrayRequest,
) -> Result<ArrayPayload, ApiError> {
    store_update(ctx, array_id, Some(&request.data), request.is_sorted).await
}

pub async fn partial_update_array(
    ctx: &ApiContext,
    array_id: ArrayId,
    request: PatchArrayRequest,
) -> Result<ArrayPayload, ApiError> {
    store_update(ctx, array_id, request.data.as_ref(), request.is_sorted).await
}

pub async fn delete_array(ctx: &ApiContext, array_id: ArrayId) -> Result<(), ApiError> {
    let removed = ctx
        .storage
        .delete_array(array_id)
        .await
        .map_err(internal)?;
    if !removed {
        return Err(array_not_found());
    }
    debug!(array_id = array_id.0, "deleted array");
    Ok(())
}

/// Bucket-sorts a stored array, marks it sorted and persists the result.
///
/// `execution_time` covers only the sort itself, in milliseconds.
pub async fn sort_array(ctx: &ApiContext, request: SortRequest) -> Result<SortResponse, ApiError> {
    let array_id = request.id.ok_or_else(array_not_found)?;
    let mut data = load_array(ctx, array_id).await?.data;

    let started = Instant::now();
    sort_data(&ctx.sorter, &mut data);
    let execution_time = round_millis(started.elapsed());

    let stored = ctx
        .storage
        .update_array(array_id, Some(&data), Some(true))
        .await
        .map_err(internal)?
        .ok_or_else(array_not_found)?;

    info!(
        array_id = array_id.0,
        len = stored.data.len(),
        buckets = ctx.sorter.buckets(),
        execution_time,
        "sorted array"
    );
    Ok(SortResponse {
        data: stored.data,
        execution_time,
    })
}

pub fn sort_data(sorter: &BucketSorter, data: &mut ArrayData) {
    match data {
        ArrayData::Integers(values) => {
            sorter.sort(values);
        }
        ArrayData::Mixed(values) => {
            sorter.sort(values);
        }
    }
}

async fn load_array(ctx: &ApiContext, array_id: ArrayId) -> Result<StoredArray, ApiError> {
    ctx.storage
        .load_array(array_id)
        .await
        .map_err(internal)?
        .ok_or_else(array_not_found)
}

async fn store_update(
    ctx: &ApiContext,
    array_id: ArrayId,
    data: Option<&ArrayData>,
    is_sorted: Option<bool>,
) -> Result<ArrayPayload, ApiError> {
    ctx.storage
        .update_array(array_id, data, is_sorted)
        .await
        .map_err(internal)?
        .map(payload)
        .ok_or_else(array_not_found)
}

fn resolve_page(raw: Option<&str>, num_pages: i64) -> Result<i64, ApiError> {
    let page = match raw.map(str::trim) {
        None | Some("") => 1,
        Some("last") => num_pages,
        Some(value) => value.parse::<i64>().map_err(|_| invalid_page())?,
    };
    if page < 1 || page > num_pages {
        return Err(invalid_page());
    }
    Ok(page)
}

fn page_link(page: i64) -> String {
    if page == 1 {
        arrays_route().to_string()
    } else {
        format!("{}?page={page}", arrays_route())
    }
}

fn round_millis(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 1000.0 * 10_000.0).round() / 10_000.0
}

fn payload(array: StoredArray) -> ArrayPayload {
    ArrayPayload {
        id: array.array_id,
        data: array.data,
        is_sorted: array.is_sorted,
        creation_date: array.creation_date,
        update_date: array.update_date,
    }
}

fn array_not_found() -> ApiError {
    ApiError::new(ErrorCode::NotFound, "array not found")
}

fn invalid_page() -> ApiError {
    ApiError::new(ErrorCode::NotFound, "invalid page")
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, err.to_string())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

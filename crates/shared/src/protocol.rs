use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ArrayData, ArrayId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrayPayload {
    pub id: ArrayId,
    pub data: ArrayData,
    pub is_sorted: bool,
    pub creation_date: DateTime<Utc>,
    pub update_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateArrayRequest {
    pub data: ArrayData,
    #[serde(default)]
    pub is_sorted: bool,
}

/// Full replacement. `is_sorted` keeps its stored value when omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateArrayRequest {
    pub data: ArrayData,
    #[serde(default)]
    pub is_sorted: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatchArrayRequest {
    #[serde(default)]
    pub data: Option<ArrayData>,
    #[serde(default)]
    pub is_sorted: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SortRequest {
    #[serde(default)]
    pub id: Option<ArrayId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortResponse {
    pub data: ArrayData,
    /// Milliseconds spent inside the sort, rounded to four decimals.
    pub execution_time: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

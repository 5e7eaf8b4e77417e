use axum::{http::StatusCode, Json};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub success: bool,
    pub data: T,
}

/// Unpaginated list, as returned by nested and radius routes.
#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub success: bool,
    pub count: usize,
    pub data: Vec<T>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub success: bool,
    pub token: String,
}

pub fn ok<T: Serialize>(data: T) -> Json<DataResponse<T>> {
    Json(DataResponse { success: true, data })
}

pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<DataResponse<T>>) {
    (StatusCode::CREATED, ok(data))
}

pub fn list<T: Serialize>(data: Vec<T>) -> Json<ListResponse<T>> {
    Json(ListResponse {
        success: true,
        count: data.len(),
        data,
    })
}

/// `data: {}` for deletions and logout.
pub fn empty() -> Json<DataResponse<Value>> {
    ok(Value::Object(Default::default()))
}

use axum::extract::Path;
use axum::http::StatusCode;

/// Echo the request body back.
pub async fn echo(body: String) -> String {
    body
}

pub async fn item(Path(id): Path<u64>) -> String {
    format!("item {id}")
}

/// Always fails; exercises the error counter.
pub async fn fail() -> (StatusCode, &'static str) {
    (StatusCode::INTERNAL_SERVER_ERROR, "failed")
}

use axum::{extract::Request, http::HeaderMap, middleware::Next, response::Response};

use crate::error::AppError;

/// Caller identity resolved by the upstream authentication layer. The
/// gateway in front of this service validates the token and forwards the
/// result as headers; nothing in this service inspects credentials.
#[derive(Debug, Clone)]
pub struct CallerIdentity {
    pub id: String,
    pub name: String,
    pub role: String,
}

pub async fn identity_middleware(mut request: Request, next: Next) -> Result<Response, AppError> {
    let headers = request.headers();
    let id = header_value(headers, "x-user-id").ok_or(AppError::Unauthorized)?;
    let name = header_value(headers, "x-user-name").unwrap_or_else(|| id.clone());
    let role = header_value(headers, "x-user-role").unwrap_or_else(|| "student".to_string());

    request
        .extensions_mut()
        .insert(CallerIdentity { id, name, role });

    Ok(next.run(request).await)
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

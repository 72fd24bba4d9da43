use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use pagetrace_store::Website;

use crate::{error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct CreateWebsiteRequest {
    pub domain: String,
}

/// Embed snippet for a provisioned website, rendered against the public
/// base URL so it can be pasted straight into a page head.
fn script_snippet(public_url: &str, domain: &str, site_id: &str) -> String {
    format!(
        r#"<script data-domain="{domain}" data-site-id="{site_id}" src="{public_url}/trace.js" defer></script>"#
    )
}

/// `POST /api/websites` — register a domain and mint its site token.
pub async fn create_website(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateWebsiteRequest>,
) -> Result<impl IntoResponse, AppError> {
    // Trimmed once up front: the duplicate lookup and the stored row must
    // agree on the domain, or padded input slips past the conflict check.
    let domain = req.domain.trim();
    if domain.is_empty() {
        return Err(AppError::BadRequest("domain is required".to_string()));
    }

    if state
        .websites
        .find_website_by_domain(domain)
        .await
        .map_err(AppError::Internal)?
        .is_some()
    {
        return Err(AppError::DomainTaken);
    }

    let website = Website::new(domain, "admin");
    state
        .websites
        .create_website(website.clone())
        .await
        .map_err(AppError::Internal)?;

    let snippet = script_snippet(&state.config.public_url, &website.domain, &website.site_id);
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "website": website,
            "snippet": snippet,
        })),
    ))
}

/// `GET /api/websites` — all registered websites, newest first.
pub async fn list_websites(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let websites = state
        .websites
        .list_websites()
        .await
        .map_err(AppError::Internal)?;
    Ok(Json(json!({ "websites": websites })))
}

/// `DELETE /api/websites/{id}` — drop a website registration.
///
/// Session rows are a site-lifecycle concern handled elsewhere; this only
/// removes the registry entry, so the collector starts rejecting the
/// domain's events with 404.
pub async fn delete_website(
    State(state): State<Arc<AppState>>,
    Path(website_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let deleted = state
        .websites
        .delete_website(&website_id)
        .await
        .map_err(AppError::Internal)?;
    if !deleted {
        return Err(AppError::NotFound("Website not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_carries_domain_and_token() {
        let snippet = script_snippet("https://stats.example.com", "example.com", "P-ABC123");
        assert!(snippet.contains(r#"data-domain="example.com""#));
        assert!(snippet.contains(r#"data-site-id="P-ABC123""#));
        assert!(snippet.contains("https://stats.example.com/trace.js"));
    }
}

//! REST implementation of the remote cart service.

use std::sync::Arc;

use marketplace_core::{CartLine, UserId};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{Response, StatusCode};
use serde::Serialize;
use tracing::{debug, error, instrument};
use url::Url;

use super::payload::normalize_cart;
use super::{AddLineRequest, CartService, RemoveLineRequest, UpdateLineRequest};
use crate::config::CartConfig;
use crate::error::{CartError, Result};

/// Maximum number of response body characters kept in error messages.
const ERROR_BODY_LIMIT: usize = 200;

/// Client for the remote cart service.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct RestCartService {
    inner: Arc<RestCartServiceInner>,
}

struct RestCartServiceInner {
    client: reqwest::Client,
    base_url: Url,
}

impl RestCartService {
    /// Create a new cart service client.
    ///
    /// # Errors
    ///
    /// Returns an error if the bearer token is not a valid header value or
    /// the HTTP client fails to build.
    pub fn new(config: &CartConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();

        if let Some(token) = config.bearer_token() {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| CartError::Parse(format!("Invalid API token format: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            inner: Arc::new(RestCartServiceInner {
                client: builder.build()?,
                base_url: config.base_url.clone(),
            }),
        })
    }

    /// Build `cart/{user}` or `cart/{user}/{action}` against the base URL.
    fn cart_url(&self, user: &UserId, action: Option<&str>) -> Result<Url> {
        let user = urlencoding::encode(user.as_str());
        let path = match action {
            Some(action) => format!("cart/{user}/{action}"),
            None => format!("cart/{user}"),
        };
        Ok(self.inner.base_url.join(&path)?)
    }

    async fn post_json<B: Serialize + Sync>(&self, url: Url, body: &B) -> Result<()> {
        let response = self.inner.client.post(url).json(body).send().await?;
        check_status(response).await?;
        Ok(())
    }
}

impl CartService for RestCartService {
    #[instrument(skip(self), fields(user = %user))]
    async fn fetch_cart(&self, user: &UserId) -> Result<Vec<CartLine>> {
        let url = self.cart_url(user, None)?;
        let response = self.inner.client.get(url).send().await?;
        let response = check_status(response).await?;

        let text = response.text().await?;
        let body = if text.trim().is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_str(&text).map_err(|e| {
                error!(
                    error = %e,
                    body = %truncate(&text, 500),
                    "Failed to parse cart response"
                );
                CartError::Parse(e.to_string())
            })?
        };

        let lines = normalize_cart(body)?;
        debug!(count = lines.len(), "Fetched cart");
        Ok(lines)
    }

    #[instrument(skip(self, request), fields(user = %user, product = %request.product_id, sku = %request.sku))]
    async fn add_line(&self, user: &UserId, request: &AddLineRequest) -> Result<()> {
        // The service echoes the updated record; the store merges locally instead.
        self.post_json(self.cart_url(user, Some("add"))?, request)
            .await
    }

    #[instrument(skip(self, request), fields(user = %user, product = %request.product_id, sku = %request.sku))]
    async fn update_quantity(&self, user: &UserId, request: &UpdateLineRequest) -> Result<()> {
        self.post_json(self.cart_url(user, Some("update"))?, request)
            .await
    }

    #[instrument(skip(self, request), fields(user = %user, product = %request.product_id, sku = %request.sku))]
    async fn remove_line(&self, user: &UserId, request: &RemoveLineRequest) -> Result<()> {
        self.post_json(self.cart_url(user, Some("remove"))?, request)
            .await
    }

    #[instrument(skip(self), fields(user = %user))]
    async fn clear_cart(&self, user: &UserId) -> Result<()> {
        let url = self.cart_url(user, Some("clear"))?;
        let response = self.inner.client.delete(url).send().await?;
        check_status(response).await?;
        Ok(())
    }
}

/// Map rate limiting and non-success statuses to errors.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(1);
        return Err(CartError::RateLimited(retry_after));
    }

    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(CartError::Api {
            status: status.as_u16(),
            message: truncate(&message, ERROR_BODY_LIMIT),
        });
    }

    Ok(response)
}

fn truncate(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn service(base: &str) -> RestCartService {
        RestCartService::new(&CartConfig::new(base).unwrap()).unwrap()
    }

    #[test]
    fn test_cart_url_paths() {
        let svc = service("https://api.example.com/v2");
        let user = UserId::new("u1").unwrap();

        assert_eq!(
            svc.cart_url(&user, None).unwrap().as_str(),
            "https://api.example.com/v2/cart/u1"
        );
        assert_eq!(
            svc.cart_url(&user, Some("clear")).unwrap().as_str(),
            "https://api.example.com/v2/cart/u1/clear"
        );
    }

    #[test]
    fn test_cart_url_encodes_user() {
        let svc = service("http://localhost:8080");
        let user = UserId::new("a/b c").unwrap();

        assert_eq!(
            svc.cart_url(&user, Some("add")).unwrap().as_str(),
            "http://localhost:8080/cart/a%2Fb%20c/add"
        );
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("hi", 10), "hi");
    }
}

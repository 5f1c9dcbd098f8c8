//! Integration tests for the marketplace cart.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p marketplace-integration-tests
//! ```
//!
//! Tests run against [`MockCartServer`], an in-process axum app that speaks
//! the remote cart service's REST contract. It returns records with the
//! product populated as `{ "_id": ... }` so the client's normalization is
//! exercised on every fetch.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use marketplace_cart::{AddLineRequest, RemoveLineRequest, UpdateLineRequest};
use rust_decimal::Decimal;
use serde_json::{Value, json};

/// A line as the mock backend stores it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerLine {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub image: Option<String>,
    pub price: Decimal,
    pub quantity: u32,
    pub variant: Option<Value>,
}

impl ServerLine {
    fn to_record(&self) -> Value {
        json!({
            "product": {"_id": self.product_id, "name": self.name},
            "sku": self.sku,
            "image": self.image,
            "price": self.price.to_string(),
            "quantity": self.quantity,
            "variant": self.variant,
        })
    }
}

/// Failure the server injects into every request until cleared.
#[derive(Debug, Clone, Copy)]
pub enum Failure {
    Status(StatusCode),
    RateLimited { retry_after: u64 },
}

#[derive(Default)]
struct ServerState {
    carts: HashMap<String, Vec<ServerLine>>,
    catalog: HashMap<String, String>,
    failure: Option<Failure>,
    requests: Vec<String>,
    authorization: Option<String>,
}

/// In-process cart backend.
#[derive(Clone, Default)]
pub struct MockCartServer {
    state: Arc<Mutex<ServerState>>,
}

impl MockCartServer {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve on an ephemeral localhost port and return the base URL.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn spawn(&self) -> String {
        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .expect("Failed to bind mock cart server");
        let addr = listener.local_addr().expect("Listener has no address");
        let app = self.router();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Mock cart server failed");
        });

        format!("http://{addr}")
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/cart/{user}", get(fetch_cart))
            .route("/cart/{user}/add", post(add_line))
            .route("/cart/{user}/update", post(update_line))
            .route("/cart/{user}/remove", post(remove_line))
            .route("/cart/{user}/clear", delete(clear_cart))
            .with_state(self.clone())
    }

    fn lock(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().expect("Mock server state poisoned")
    }

    /// Seed a user's cart.
    pub fn seed(&self, user: &str, lines: Vec<ServerLine>) {
        self.lock().carts.insert(user.to_string(), lines);
    }

    /// Register a product name; added lines pick it up like a populated
    /// product reference would.
    pub fn register_product(&self, product_id: &str, name: &str) {
        self.lock()
            .catalog
            .insert(product_id.to_string(), name.to_string());
    }

    /// Server-side contents of a user's cart.
    #[must_use]
    pub fn cart(&self, user: &str) -> Vec<ServerLine> {
        self.lock().carts.get(user).cloned().unwrap_or_default()
    }

    /// Fail every request until [`recover`](Self::recover) is called.
    pub fn fail_with(&self, failure: Failure) {
        self.lock().failure = Some(failure);
    }

    /// Stop injecting failures.
    pub fn recover(&self) {
        self.lock().failure = None;
    }

    /// `METHOD path` of every request received, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.lock().requests.clone()
    }

    /// `Authorization` header of the most recent request.
    #[must_use]
    pub fn last_authorization(&self) -> Option<String> {
        self.lock().authorization.clone()
    }

    /// Record a request and return the injected failure, if any.
    fn enter(&self, request: String, headers: &HeaderMap) -> Option<Response> {
        let mut state = self.lock();
        state.requests.push(request);
        state.authorization = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        state.failure.map(|failure| match failure {
            Failure::Status(status) => (status, "injected failure").into_response(),
            Failure::RateLimited { retry_after } => {
                let mut response = (StatusCode::TOO_MANY_REQUESTS, "slow down").into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
                response
            }
        })
    }
}

async fn fetch_cart(
    State(server): State<MockCartServer>,
    Path(user): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Some(failure) = server.enter(format!("GET /cart/{user}"), &headers) {
        return failure;
    }
    let records: Vec<Value> = server.cart(&user).iter().map(ServerLine::to_record).collect();
    Json(records).into_response()
}

async fn add_line(
    State(server): State<MockCartServer>,
    Path(user): Path<String>,
    headers: HeaderMap,
    Json(request): Json<AddLineRequest>,
) -> Response {
    if let Some(failure) = server.enter(format!("POST /cart/{user}/add"), &headers) {
        return failure;
    }

    let mut state = server.lock();
    let product_id = request.product_id.to_string();
    let sku = request.sku.to_string();
    let name = state.catalog.get(&product_id).cloned().unwrap_or_default();
    let cart = state.carts.entry(user).or_default();

    let index = match cart
        .iter()
        .position(|l| l.product_id == product_id && l.sku == sku)
    {
        Some(index) => index,
        None => {
            cart.push(ServerLine {
                product_id,
                sku,
                name,
                image: request.image.clone(),
                price: request.price,
                quantity: 0,
                variant: request
                    .variant
                    .as_ref()
                    .and_then(|v| serde_json::to_value(v).ok()),
            });
            cart.len() - 1
        }
    };

    let Some(line) = cart.get_mut(index) else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };
    line.quantity += request.quantity.get();
    Json(line.to_record()).into_response()
}

async fn update_line(
    State(server): State<MockCartServer>,
    Path(user): Path<String>,
    headers: HeaderMap,
    Json(request): Json<UpdateLineRequest>,
) -> Response {
    if let Some(failure) = server.enter(format!("POST /cart/{user}/update"), &headers) {
        return failure;
    }

    let mut state = server.lock();
    let line = state.carts.get_mut(&user).and_then(|cart| {
        cart.iter_mut().find(|l| {
            l.product_id == request.product_id.as_str() && l.sku == request.sku.as_str()
        })
    });
    match line {
        Some(line) => {
            line.quantity = request.quantity.get();
            StatusCode::OK.into_response()
        }
        None => (StatusCode::NOT_FOUND, "line not found").into_response(),
    }
}

async fn remove_line(
    State(server): State<MockCartServer>,
    Path(user): Path<String>,
    headers: HeaderMap,
    Json(request): Json<RemoveLineRequest>,
) -> Response {
    if let Some(failure) = server.enter(format!("POST /cart/{user}/remove"), &headers) {
        return failure;
    }

    if let Some(cart) = server.lock().carts.get_mut(&user) {
        cart.retain(|l| {
            !(l.product_id == request.product_id.as_str() && l.sku == request.sku.as_str())
        });
    }
    StatusCode::OK.into_response()
}

async fn clear_cart(
    State(server): State<MockCartServer>,
    Path(user): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Some(failure) = server.enter(format!("DELETE /cart/{user}/clear"), &headers) {
        return failure;
    }

    server.lock().carts.remove(&user);
    StatusCode::NO_CONTENT.into_response()
}

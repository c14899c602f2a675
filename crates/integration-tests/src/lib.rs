//! End-to-end tests for the Shopfront client.
//!
//! [`FakeBackend`] is an in-process stand-in for the REST backend built on
//! `wiremock`: it keeps users, tokens, carts and orders in memory and answers
//! the same routes with the same JSON shapes, so the stores can be exercised
//! through whole flows (login, add to cart, checkout) without a server.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p shopfront-integration-tests
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::{Value, json};
use shopfront_client::ClientConfig;
use shopfront_core::ProductId;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// A registered account.
#[derive(Debug, Clone)]
struct Account {
    id: i64,
    email: String,
    username: String,
    full_name: Option<String>,
    password: String,
}

impl Account {
    fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "email": self.email,
            "username": self.username,
            "full_name": self.full_name,
            "is_active": true,
            "created_at": "2025-01-01T00:00:00"
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct Line {
    id: i64,
    user_id: i64,
    product_id: i64,
    quantity: i64,
}

#[derive(Debug, Default)]
struct BackendState {
    accounts: Vec<Account>,
    tokens: HashMap<String, i64>,
    products: Vec<Value>,
    lines: Vec<Line>,
    orders: Vec<(i64, Value)>,
    next_id: i64,
}

impl BackendState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn product(&self, id: i64) -> Option<&Value> {
        self.products.iter().find(|p| p["id"] == id)
    }

    fn line_json(&self, line: &Line) -> Value {
        json!({
            "id": line.id,
            "user_id": line.user_id,
            "product_id": line.product_id,
            "quantity": line.quantity,
            "product": self.product(line.product_id).cloned().unwrap_or(Value::Null),
            "created_at": "2025-01-01T00:00:00"
        })
    }

    fn cart_json(&self, user_id: i64) -> Value {
        Value::Array(
            self.lines
                .iter()
                .filter(|l| l.user_id == user_id)
                .map(|l| self.line_json(l))
                .collect(),
        )
    }

    /// Resolve the bearer token to a user, or the backend's 401.
    fn authenticate(&self, request: &Request) -> Result<i64, ResponseTemplate> {
        request
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .and_then(|token| self.tokens.get(token).copied())
            .ok_or_else(|| detail(401, "Could not validate credentials"))
    }
}

fn detail(status: u16, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({ "detail": message }))
}

fn ok(body: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

/// Trailing numeric path segment, e.g. the `7` of `/api/cart/7`.
fn path_id(request: &Request) -> Option<i64> {
    request
        .url
        .path_segments()?
        .rfind(|s| !s.is_empty())?
        .parse()
        .ok()
}

fn query_value(request: &Request, key: &str) -> Option<String> {
    request
        .url
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// In-memory fake of the storefront backend.
pub struct FakeBackend {
    server: MockServer,
    state: Arc<Mutex<BackendState>>,
}

impl FakeBackend {
    /// Start the fake with an empty catalog and no accounts.
    pub async fn start() -> Self {
        let backend = Self {
            server: MockServer::start().await,
            state: Arc::new(Mutex::new(BackendState::default())),
        };
        backend.mount_auth().await;
        backend.mount_products().await;
        backend.mount_cart().await;
        backend.mount_orders().await;

        Mock::given(method("GET"))
            .and(path("/api/health"))
            .respond_with(ok(json!({"status": "healthy"})))
            .mount(&backend.server)
            .await;

        backend
    }

    /// Base URL clients should use.
    #[must_use]
    pub fn api_url(&self) -> String {
        format!("{}/api", self.server.uri())
    }

    /// Client configuration pointing at the fake.
    ///
    /// # Panics
    ///
    /// Never in practice: the mock server URI is always a valid URL.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn config(&self) -> ClientConfig {
        ClientConfig::for_api_url(&self.api_url()).expect("mock server URL is valid")
    }

    /// Requests received so far, for asserting on traffic.
    pub async fn received_requests(&self) -> Vec<Request> {
        self.server.received_requests().await.unwrap_or_default()
    }

    /// Create an account directly, as if registered earlier.
    pub fn create_account(&self, username: &str, password: &str) -> i64 {
        let mut state = self.lock();
        let id = state.next_id();
        state.accounts.push(Account {
            id,
            email: format!("{username}@shop.test"),
            username: username.to_string(),
            full_name: None,
            password: password.to_string(),
        });
        id
    }

    /// Add a product to the catalog.
    pub fn add_product(&self, id: i64, name: &str, price: f64, category: &str) -> ProductId {
        self.lock().products.push(json!({
            "id": id,
            "name": name,
            "description": format!("{name} from the fake catalog"),
            "price": price,
            "image_url": null,
            "category": category,
            "stock": 10,
            "rating": 4.5,
            "review_count": 3,
            "created_at": "2025-01-01T00:00:00"
        }));
        ProductId::new(id)
    }

    /// Invalidate every issued token, as a server-side expiry would.
    pub fn expire_tokens(&self) {
        self.lock().tokens.clear();
    }

    /// Number of cart lines the backend holds for `user_id`.
    #[must_use]
    pub fn server_cart_len(&self, user_id: i64) -> usize {
        self.lock()
            .lines
            .iter()
            .filter(|l| l.user_id == user_id)
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mount a route whose handler gets the locked state.
    async fn route<F>(&self, verb: &str, matcher: RouteMatcher, handler: F)
    where
        F: Fn(&mut BackendState, &Request) -> ResponseTemplate + Send + Sync + 'static,
    {
        let state = Arc::clone(&self.state);
        let responder = move |request: &Request| {
            let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
            handler(&mut state, request)
        };
        let mock = match matcher {
            RouteMatcher::Exact(p) => Mock::given(method(verb)).and(path(p)),
            RouteMatcher::Regex(r) => Mock::given(method(verb)).and(path_regex(r)),
        };
        mock.respond_with(responder).mount(&self.server).await;
    }

    async fn mount_auth(&self) {
        self.route("POST", RouteMatcher::Exact("/api/auth/register"), |state, request| {
            let Ok(body) = request.body_json::<Value>() else {
                return detail(422, "Invalid body");
            };
            let email = body["email"].as_str().unwrap_or_default().to_string();
            let username = body["username"].as_str().unwrap_or_default().to_string();
            if state.accounts.iter().any(|a| a.email == email) {
                return detail(400, "Email already registered");
            }
            if state.accounts.iter().any(|a| a.username == username) {
                return detail(400, "Username already taken");
            }
            let id = state.next_id();
            let account = Account {
                id,
                email,
                username,
                full_name: body["full_name"].as_str().map(str::to_string),
                password: body["password"].as_str().unwrap_or_default().to_string(),
            };
            let response = ok(account.to_json());
            state.accounts.push(account);
            response
        })
        .await;

        self.route("POST", RouteMatcher::Exact("/api/auth/login"), |state, request| {
            let form: HashMap<String, String> = url::form_urlencoded::parse(&request.body)
                .into_owned()
                .collect();
            let account = state.accounts.iter().find(|a| {
                Some(&a.username) == form.get("username")
                    && Some(&a.password) == form.get("password")
            });
            let Some(user_id) = account.map(|a| a.id) else {
                return detail(401, "Incorrect username or password");
            };
            let token = format!("token-{user_id}-{}", state.next_id());
            state.tokens.insert(token.clone(), user_id);
            ok(json!({"access_token": token, "token_type": "bearer"}))
        })
        .await;

        self.route("GET", RouteMatcher::Exact("/api/auth/me"), |state, request| {
            match state.authenticate(request) {
                Ok(user_id) => state
                    .accounts
                    .iter()
                    .find(|a| a.id == user_id)
                    .map_or_else(|| detail(404, "User not found"), |a| ok(a.to_json())),
                Err(rejection) => rejection,
            }
        })
        .await;
    }

    async fn mount_products(&self) {
        self.route("GET", RouteMatcher::Exact("/api/products/categories/list"), |state, _| {
            let mut categories: Vec<&str> = state
                .products
                .iter()
                .filter_map(|p| p["category"].as_str())
                .collect();
            categories.sort_unstable();
            categories.dedup();
            ok(json!(categories))
        })
        .await;

        self.route("GET", RouteMatcher::Exact("/api/products/"), |state, request| {
            let category = query_value(request, "category");
            let search = query_value(request, "search").map(|s| s.to_lowercase());
            let products: Vec<&Value> = state
                .products
                .iter()
                .filter(|p| category.as_deref().is_none_or(|c| p["category"] == c))
                .filter(|p| {
                    search.as_deref().is_none_or(|s| {
                        p["name"]
                            .as_str()
                            .is_some_and(|n| n.to_lowercase().contains(s))
                    })
                })
                .collect();
            ok(json!(products))
        })
        .await;

        self.route("GET", RouteMatcher::Regex(r"^/api/products/\d+$"), |state, request| {
            path_id(request)
                .and_then(|id| state.product(id))
                .map_or_else(|| detail(404, "Product not found"), |p| ok(p.clone()))
        })
        .await;
    }

    async fn mount_cart(&self) {
        self.route("GET", RouteMatcher::Exact("/api/cart/"), |state, request| {
            match state.authenticate(request) {
                Ok(user_id) => ok(state.cart_json(user_id)),
                Err(rejection) => rejection,
            }
        })
        .await;

        self.route("POST", RouteMatcher::Exact("/api/cart/"), |state, request| {
            let user_id = match state.authenticate(request) {
                Ok(user_id) => user_id,
                Err(rejection) => return rejection,
            };
            let Ok(body) = request.body_json::<Value>() else {
                return detail(422, "Invalid body");
            };
            let product_id = body["product_id"].as_i64().unwrap_or_default();
            let quantity = body["quantity"].as_i64().unwrap_or(1);
            if state.product(product_id).is_none() {
                return detail(404, "Product not found");
            }

            let existing = state
                .lines
                .iter_mut()
                .find(|l| l.user_id == user_id && l.product_id == product_id);
            let line = if let Some(line) = existing {
                line.quantity += quantity;
                *line
            } else {
                let line = Line {
                    id: state.next_id(),
                    user_id,
                    product_id,
                    quantity,
                };
                state.lines.push(line);
                line
            };
            ok(state.line_json(&line))
        })
        .await;

        self.route("DELETE", RouteMatcher::Exact("/api/cart/"), |state, request| {
            match state.authenticate(request) {
                Ok(user_id) => {
                    state.lines.retain(|l| l.user_id != user_id);
                    ok(json!({"message": "Cart cleared"}))
                }
                Err(rejection) => rejection,
            }
        })
        .await;

        self.route("PUT", RouteMatcher::Regex(r"^/api/cart/\d+$"), |state, request| {
            let user_id = match state.authenticate(request) {
                Ok(user_id) => user_id,
                Err(rejection) => return rejection,
            };
            let Some(quantity) = query_value(request, "quantity").and_then(|q| q.parse().ok())
            else {
                return detail(422, "quantity is required");
            };
            let id = path_id(request);
            let Some(line) = state
                .lines
                .iter_mut()
                .find(|l| Some(l.id) == id && l.user_id == user_id)
            else {
                return detail(404, "Cart item not found");
            };
            line.quantity = quantity;
            let line = *line;
            ok(state.line_json(&line))
        })
        .await;

        self.route("DELETE", RouteMatcher::Regex(r"^/api/cart/\d+$"), |state, request| {
            let user_id = match state.authenticate(request) {
                Ok(user_id) => user_id,
                Err(rejection) => return rejection,
            };
            let id = path_id(request);
            let before = state.lines.len();
            state
                .lines
                .retain(|l| !(Some(l.id) == id && l.user_id == user_id));
            if state.lines.len() == before {
                return detail(404, "Cart item not found");
            }
            ok(json!({"message": "Item removed from cart"}))
        })
        .await;
    }

    async fn mount_orders(&self) {
        self.route("POST", RouteMatcher::Exact("/api/orders/"), |state, request| {
            let user_id = match state.authenticate(request) {
                Ok(user_id) => user_id,
                Err(rejection) => return rejection,
            };
            let Ok(body) = request.body_json::<Value>() else {
                return detail(422, "Invalid body");
            };
            let lines: Vec<Line> = state
                .lines
                .iter()
                .filter(|l| l.user_id == user_id)
                .copied()
                .collect();
            if lines.is_empty() {
                return detail(400, "Cart is empty");
            }

            let order_id = state.next_id();
            let mut total = 0.0;
            let mut items = Vec::with_capacity(lines.len());
            for line in &lines {
                let product = state.product(line.product_id).cloned().unwrap_or(Value::Null);
                let price = product["price"].as_f64().unwrap_or_default();
                #[allow(clippy::cast_precision_loss)]
                let line_total = price * line.quantity as f64;
                total += line_total;
                items.push(json!({
                    "id": state.next_id(),
                    "product_id": line.product_id,
                    "quantity": line.quantity,
                    "price": price,
                    "product": product
                }));
            }

            let order = json!({
                "id": order_id,
                "user_id": user_id,
                "total_amount": total,
                "status": "pending",
                "shipping_address": body["shipping_address"],
                "created_at": "2025-01-02T00:00:00",
                "order_items": items
            });
            state.lines.retain(|l| l.user_id != user_id);
            state.orders.push((user_id, order.clone()));
            ok(order)
        })
        .await;

        self.route("GET", RouteMatcher::Exact("/api/orders/"), |state, request| {
            match state.authenticate(request) {
                Ok(user_id) => ok(Value::Array(
                    state
                        .orders
                        .iter()
                        .filter(|(owner, _)| *owner == user_id)
                        .map(|(_, order)| order.clone())
                        .collect(),
                )),
                Err(rejection) => rejection,
            }
        })
        .await;

        self.route("GET", RouteMatcher::Regex(r"^/api/orders/\d+$"), |state, request| {
            let user_id = match state.authenticate(request) {
                Ok(user_id) => user_id,
                Err(rejection) => return rejection,
            };
            let id = path_id(request);
            state
                .orders
                .iter()
                .find(|(owner, order)| *owner == user_id && order["id"].as_i64() == id)
                .map_or_else(|| detail(404, "Order not found"), |(_, order)| ok(order.clone()))
        })
        .await;
    }
}

enum RouteMatcher {
    Exact(&'static str),
    Regex(&'static str),
}

use std::{
    collections::HashMap,
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::Mutex;
use uuid::Uuid;
use wbnt_core::{support::Actor, Role, UserStatus};

use crate::api::{map_db_error, ApiError, AppState};

/// Header carrying the caller's user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Newtype wrapping a request ID string, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// The authenticated caller, inserted by the identity gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: i64,
    pub role: Role,
}

impl CurrentUser {
    #[must_use]
    pub fn actor(self) -> Actor {
        Actor {
            id: self.id,
            role: self.role,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gate {
    Customer,
    Staff,
    Admin,
}

#[derive(Debug, Clone)]
struct RateLimitWindow {
    started_at: Instant,
    count: usize,
}

/// Fixed-window limiter keyed by client IP.
///
/// Requests without a known peer address (no `ConnectInfo`) share one window.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    max_requests: usize,
    window: Duration,
    clients: Arc<Mutex<HashMap<Option<IpAddr>, RateLimitWindow>>>,
}

impl RateLimitState {
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            clients: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Count one request for `client`; `false` once its window is spent.
    async fn try_acquire(&self, client: Option<IpAddr>) -> bool {
        let now = Instant::now();
        let mut clients = self.clients.lock().await;
        clients.retain(|_, w| now.duration_since(w.started_at) < self.window);

        let window = clients.entry(client).or_insert(RateLimitWindow {
            started_at: now,
            count: 0,
        });
        if window.count >= self.max_requests {
            return false;
        }
        window.count += 1;
        true
    }
}

fn client_ip(req: &Request) -> Option<IpAddr> {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

pub(crate) fn request_id_of(req: &Request) -> String {
    req.extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default()
}

/// Axum middleware that extracts or generates a request ID.
///
/// If the incoming request has an `x-request-id` header, that value is used.
/// Otherwise a new `UUIDv4` is generated. The ID is:
/// - Inserted into request extensions as [`RequestId`]
/// - Set on the response as the `x-request-id` header
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;

    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert("x-request-id", val);
    }

    res
}

/// Middleware enforcing a fixed request-per-window limit per client IP.
pub async fn enforce_rate_limit(
    State(rate_limit): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    let client = client_ip(&req);
    if !rate_limit.try_acquire(client).await {
        tracing::warn!(client = ?client, "auth rate limit exceeded");
        return ApiError::new(request_id_of(&req), "rate_limited", "rate limit exceeded")
            .into_response();
    }

    next.run(req).await
}

/// Any signed-in account in good standing.
pub async fn require_customer(state: State<AppState>, req: Request, next: Next) -> Response {
    gate(state, req, next, Gate::Customer).await
}

/// Admin or moderator.
pub async fn require_staff(state: State<AppState>, req: Request, next: Next) -> Response {
    gate(state, req, next, Gate::Staff).await
}

/// The admin account only.
pub async fn require_admin(state: State<AppState>, req: Request, next: Next) -> Response {
    gate(state, req, next, Gate::Admin).await
}

async fn gate(State(state): State<AppState>, mut req: Request, next: Next, gate: Gate) -> Response {
    let rid = request_id_of(&req);
    match authenticate(&state, req.headers(), &rid, gate).await {
        Ok(user) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Err(e) => e.into_response(),
    }
}

async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
    rid: &str,
    gate: Gate,
) -> Result<CurrentUser, ApiError> {
    let Some(raw) = headers.get(USER_ID_HEADER) else {
        return Err(ApiError::new(rid, "unauthorized", "Unauthorized"));
    };
    let Some(user_id) = parse_user_id(raw) else {
        return Err(ApiError::new(rid, "unauthorized", "User not found"));
    };

    let user = wbnt_db::get_user(&state.pool, user_id)
        .await
        .map_err(|e| map_db_error(rid.to_owned(), &e))?
        .ok_or_else(|| ApiError::new(rid, "unauthorized", "User not found"))?;

    let status = user
        .status
        .parse::<UserStatus>()
        .unwrap_or(UserStatus::Banned);
    if !status.is_active() {
        return Err(ApiError::new(
            rid,
            "forbidden",
            format!("Account is {status}"),
        ));
    }

    let Ok(role) = user.role.parse::<Role>() else {
        return Err(ApiError::new(rid, "forbidden", "Unknown account role"));
    };

    match gate {
        Gate::Customer => {}
        Gate::Staff if role.is_staff() => {}
        Gate::Staff => {
            return Err(ApiError::new(
                rid,
                "forbidden",
                "Admin or moderator access required",
            ))
        }
        Gate::Admin if role == Role::Admin => {}
        Gate::Admin => return Err(ApiError::new(rid, "forbidden", "Admin access required")),
    }

    Ok(CurrentUser { id: user.id, role })
}

fn parse_user_id(value: &HeaderValue) -> Option<i64> {
    value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|id| *id > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_user_id_accepts_positive_integers() {
        assert_eq!(parse_user_id(&HeaderValue::from_static("42")), Some(42));
        assert_eq!(parse_user_id(&HeaderValue::from_static(" 7 ")), Some(7));
    }

    #[test]
    fn parse_user_id_rejects_garbage() {
        assert_eq!(parse_user_id(&HeaderValue::from_static("abc")), None);
        assert_eq!(parse_user_id(&HeaderValue::from_static("0")), None);
        assert_eq!(parse_user_id(&HeaderValue::from_static("-3")), None);
    }

    #[tokio::test]
    async fn rate_limit_windows_are_per_client() {
        let limiter = RateLimitState::new(2, Duration::from_secs(60));
        let alice = Some(IpAddr::from([10, 0, 0, 1]));
        let bob = Some(IpAddr::from([10, 0, 0, 2]));

        assert!(limiter.try_acquire(alice).await);
        assert!(limiter.try_acquire(alice).await);
        assert!(!limiter.try_acquire(alice).await);

        assert!(limiter.try_acquire(bob).await);
        assert!(limiter.try_acquire(None).await);
    }

    #[tokio::test]
    async fn rate_limit_window_resets_after_expiry() {
        let limiter = RateLimitState::new(1, Duration::from_millis(20));
        let client = Some(IpAddr::from([127, 0, 0, 1]));
        assert!(limiter.try_acquire(client).await);
        assert!(!limiter.try_acquire(client).await);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(limiter.try_acquire(client).await);
    }

    #[test]
    fn current_user_converts_to_actor() {
        let user = CurrentUser {
            id: 5,
            role: Role::Mod,
        };
        assert_eq!(
            user.actor(),
            Actor {
                id: 5,
                role: Role::Mod
            }
        );
    }
}

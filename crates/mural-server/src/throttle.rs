//! Write throttling.
//!
//! Reads are never metered. Every other request is charged to its caller:
//! the user behind a live bearer token when there is one, otherwise the
//! connecting address. A caller's allowance refills continuously up to the
//! configured burst.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::Mutex;
use tracing::warn;

use crate::api::AppState;
use crate::error::ServerError;

/// Who a write is charged to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Caller {
    User(String),
    Addr(IpAddr),
}

#[derive(Debug)]
struct Allowance {
    remaining: f64,
    updated: Instant,
}

#[derive(Clone)]
pub struct WriteThrottle {
    allowances: Arc<Mutex<HashMap<Caller, Allowance>>>,
    per_sec: f64,
    burst: f64,
}

impl WriteThrottle {
    pub fn new(per_min: f64, burst: f64) -> Self {
        Self {
            allowances: Arc::new(Mutex::new(HashMap::new())),
            per_sec: per_min / 60.0,
            burst,
        }
    }

    /// Charge one write to `caller`; `false` when its allowance is spent.
    pub async fn admit(&self, caller: &Caller) -> bool {
        let now = Instant::now();
        let mut allowances = self.allowances.lock().await;
        let allowance = allowances.entry(caller.clone()).or_insert(Allowance {
            remaining: self.burst,
            updated: now,
        });

        let refill = now.duration_since(allowance.updated).as_secs_f64() * self.per_sec;
        allowance.remaining = (allowance.remaining + refill).min(self.burst);
        allowance.updated = now;

        if allowance.remaining < 1.0 {
            return false;
        }
        allowance.remaining -= 1.0;
        true
    }

    /// Forget callers that have not written for `idle`.
    pub async fn forget_idle(&self, idle: Duration) {
        let now = Instant::now();
        self.allowances
            .lock()
            .await
            .retain(|_, a| now.duration_since(a.updated) < idle);
    }
}

pub async fn throttle_writes(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if matches!(*req.method(), Method::GET | Method::HEAD | Method::OPTIONS) {
        return next.run(req).await;
    }

    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let headers = req.headers().clone();
    let caller = match state.sessions.authenticate(&headers).await {
        Ok(user_id) => Some(Caller::User(user_id)),
        Err(_) => peer.map(Caller::Addr),
    };

    if let Some(caller) = caller {
        if !state.throttle.admit(&caller).await {
            warn!(?caller, path = %req.uri().path(), "Write rate exceeded");
            return ServerError::RateLimited.into_response();
        }
    }

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allowance_refills_over_time() {
        // 6000 per minute is one write every 10 ms.
        let throttle = WriteThrottle::new(6000.0, 1.0);
        let ana = Caller::User("u1".into());

        assert!(throttle.admit(&ana).await);
        assert!(!throttle.admit(&ana).await);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(throttle.admit(&ana).await);
    }

    #[tokio::test]
    async fn users_and_addresses_are_charged_separately() {
        let throttle = WriteThrottle::new(1.0, 1.0);
        let user = Caller::User("u1".into());
        let addr = Caller::Addr("198.51.100.4".parse().unwrap());

        assert!(throttle.admit(&user).await);
        assert!(!throttle.admit(&user).await);
        assert!(throttle.admit(&addr).await);
    }

    #[tokio::test]
    async fn idle_callers_are_forgotten() {
        let throttle = WriteThrottle::new(1.0, 1.0);
        let user = Caller::User("u1".into());
        assert!(throttle.admit(&user).await);

        throttle.forget_idle(Duration::ZERO).await;
        assert!(throttle.allowances.lock().await.is_empty());
        // A forgotten caller starts again from a full burst.
        assert!(throttle.admit(&user).await);
    }
}

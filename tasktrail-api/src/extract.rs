//! Request extractors
//!
//! - [`Db`]: the database bound to a per-request execution scope
//! - [`ClientMeta`]: actor and client details recorded in audit entries
//! - [`ValidJson`], [`ApiJson`], [`ApiPath`] and [`ApiQuery`]: the stock extractors with
//!   rejections rendered as [`ApiError`] envelopes

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::ops::Deref;
use std::str::FromStr;

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequest, FromRequestParts, Request},
    http::{header, request::Parts, HeaderMap},
    Json,
};
use serde::de::DeserializeOwned;
use tasktrail_shared::db::{Database, ExecScope};
use tasktrail_shared::models::RequestMeta;
use validator::Validate;

use crate::{app::AppState, error::ApiError, middleware::auth::AuthContext};

/// Database handle whose statements share the request deadline
#[derive(Debug, Clone)]
pub struct Db(pub Database);

impl Deref for Db {
    type Target = Database;

    fn deref(&self) -> &Database {
        &self.0
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Db {
    type Rejection = Infallible;

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let scope = ExecScope::with_timeout(state.config.server.request_timeout);
        Ok(Db(state.db.with_scope(scope)))
    }
}

/// Who made the request and from where
#[derive(Debug, Clone, Default)]
pub struct ClientMeta(pub RequestMeta);

impl ClientMeta {
    pub fn from_parts(parts: &Parts) -> Self {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        ClientMeta(RequestMeta {
            actor_id: parts.extensions.get::<AuthContext>().map(|auth| auth.user_id),
            ip_address: client_ip(&parts.headers).or(peer),
            user_agent: parts
                .headers
                .get(header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        })
    }
}

/// First hop of `X-Forwarded-For`, else `X-Real-IP`
///
/// Values that do not parse as an IP address are ignored, and the parsed
/// address is stored in its canonical form.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = || {
        headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(parse_ip)
    };

    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_ip)
    };

    forwarded().or_else(real_ip).map(|ip| ip.to_string())
}

fn parse_ip(value: &str) -> Option<IpAddr> {
    IpAddr::from_str(value.trim()).ok()
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ClientMeta {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientMeta::from_parts(parts))
    }
}

/// JSON body that must pass its `validator` rules
#[derive(Debug, Clone)]
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(ValidJson(value))
    }
}

/// `Json` with an enveloped rejection, for bodies validated elsewhere
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `Path` with an enveloped rejection
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// `Query` with an enveloped rejection
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

// gateway/src/api/sessions.rs
use actix_web::cookie::time::{Duration as CookieDuration, OffsetDateTime};
use actix_web::cookie::{Cookie, SameSite};
use actix_web::http::header::{self, HeaderValue};
use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{CredentialError, Viewer};
use crate::error::GatewayError;
use crate::state::Gateway;

/// Cookie carrying the session token
pub const AUTH_COOKIE: &str = "authToken";

#[derive(Debug, Default, Deserialize)]
struct AuthRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    token: String,
}

#[derive(Debug, Serialize)]
struct AuthResponse {
    token: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    email: String,
}

pub fn session_cookie(token: &str, max_age_secs: i64) -> Cookie<'static> {
    Cookie::build(AUTH_COOKIE, token.to_string())
        .path("/")
        .http_only(true)
        .secure(false)
        .same_site(SameSite::Strict)
        .max_age(CookieDuration::seconds(max_age_secs))
        .finish()
}

pub fn expired_cookie() -> Cookie<'static> {
    Cookie::build(AUTH_COOKIE, "deleted")
        .path("/")
        .max_age(CookieDuration::ZERO)
        .expires(OffsetDateTime::now_utc() - CookieDuration::days(365))
        .finish()
}

/// Bearer header first, then the session cookie
pub fn extract_token(req: &HttpRequest) -> Option<String> {
    if let Some(value) = req.headers().get(header::AUTHORIZATION) {
        let value = value.to_str().ok()?;
        let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
        return Some(token.to_string()).filter(|t| !t.is_empty());
    }
    req.cookie(AUTH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
}

/// Require a valid session token on the request
pub fn authorize(req: &HttpRequest, gateway: &Gateway) -> Result<(String, Viewer), GatewayError> {
    let token = extract_token(req).ok_or(GatewayError::Unauthorized)?;
    match gateway.sessions.validate(&token) {
        Ok(viewer) => Ok((token, viewer)),
        Err(e) => {
            tracing::debug!("Auth validity check: {}", e);
            Err(GatewayError::Unauthorized)
        },
    }
}

/// Refresh the session cookie and echo the token as a bearer header
pub fn set_auth(response: &mut HttpResponse, token: &str, max_age_secs: i64) {
    if let Err(e) = response.add_cookie(&session_cookie(token, max_age_secs)) {
        tracing::error!("Unable to set session cookie: {}", e);
    }
    match HeaderValue::from_str(&format!("Bearer {}", token)) {
        Ok(value) => {
            response.headers_mut().insert(header::AUTHORIZATION, value);
        },
        Err(e) => tracing::error!("Unable to set authorization header: {}", e),
    }
}

pub fn unset_auth(response: &mut HttpResponse) {
    if let Err(e) = response.add_cookie(&expired_cookie()) {
        tracing::error!("Unable to clear session cookie: {}", e);
    }
}

/// `POST /auth`: either `{token}` to revalidate or `{email, password}` to log in
pub async fn auth(body: web::Bytes, gateway: web::Data<Gateway>) -> Result<HttpResponse, GatewayError> {
    let params: AuthRequest = serde_json::from_slice(&body)
        .map_err(|_| GatewayError::BadRequest("Can't deserialize auth request.".to_string()))?;

    let by_token = !params.token.is_empty();
    let by_password = !params.email.is_empty() || !params.password.is_empty();

    let reply = match (by_token, by_password) {
        (true, false) => {
            let viewer = gateway.sessions.validate(&params.token).map_err(|e| {
                tracing::info!("Auth validity check: {}", e);
                GatewayError::Unauthorized
            })?;
            AuthResponse {
                token: params.token,
                email: viewer.email,
            }
        },
        (false, true) => {
            let store = gateway.clone();
            let (email, password) = (params.email.clone(), params.password);
            let user = web::block(move || store.credentials.find_user(&email, &password))
                .await
                .map_err(|e| GatewayError::Internal(e.to_string()))?
                .map_err(|e| match e {
                    CredentialError::NotFound => GatewayError::Unauthorized,
                    other => GatewayError::Internal(other.to_string()),
                })?;

            let token = gateway
                .sessions
                .issue(&user)
                .map_err(|_| GatewayError::Internal("Can't construct token.".to_string()))?;
            tracing::info!("- auth.login: [{}]", user.email);
            AuthResponse {
                token,
                email: params.email,
            }
        },
        _ => {
            return Err(GatewayError::BadRequest(
                "Expected either a token or an email and password.".to_string(),
            ))
        },
    };

    let mut response = HttpResponse::Ok().json(&reply);
    set_auth(&mut response, &reply.token, gateway.cookie_max_age);
    Ok(response)
}

/// `/logout`: drop the cookie and go home. Tokens stay valid until they expire.
pub async fn logout() -> HttpResponse {
    let mut response = HttpResponse::TemporaryRedirect()
        .insert_header((header::LOCATION, "/"))
        .finish();
    unset_auth(&mut response);
    response
}

use axum::{
    extract::{Extension, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::error_response;
use crate::calendar::GoogleCalendar;
use crate::crypto::{generate_api_key, hash_api_key};
use crate::models::User;
use crate::notify::escape_html;
use crate::server::middleware::AuthenticatedUser;
use crate::server::AppState;

#[derive(Deserialize)]
pub struct GoogleRedirectQuery {
    /// CLI callback URL for redirecting after auth (e.g., http://localhost:8899)
    pub cli_callback: Option<String>,
}

/// Redirect to Google OAuth
pub async fn google_redirect(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GoogleRedirectQuery>,
) -> Response {
    if state.google_client_id.is_empty() {
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Google OAuth not configured",
        );
    }

    let redirect_uri = format!("{}/auth/callback", state.server_url);
    let url = GoogleCalendar::authorization_url(
        &state.google_client_id,
        &redirect_uri,
        query.cli_callback.as_deref().unwrap_or_default(),
    );

    Redirect::temporary(&url).into_response()
}

#[derive(Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub error: Option<String>,
    /// CLI callback URL to redirect to after auth (for CLI login flow)
    pub state: Option<String>,
}

/// Send the error back to the CLI if it is waiting, otherwise render it
fn login_failed(cli_callback: Option<&str>, status: StatusCode, error: &str) -> Response {
    if let Some(callback) = cli_callback {
        return Redirect::temporary(&format!(
            "{}?error={}",
            callback,
            urlencoding::encode(error)
        ))
        .into_response();
    }
    (status, Html(failure_page(error))).into_response()
}

/// Handle Google OAuth callback
pub async fn google_callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let cli_callback = query.state.as_deref().filter(|s| !s.is_empty());

    if let Some(error) = query.error {
        return login_failed(cli_callback, StatusCode::BAD_REQUEST, &error);
    }

    let Some(code) = query.code else {
        return login_failed(
            cli_callback,
            StatusCode::BAD_REQUEST,
            "Missing authorization code",
        );
    };

    let redirect_uri = format!("{}/auth/callback", state.server_url);
    let tokens = match GoogleCalendar::exchange_code(
        &state.google_client_id,
        &state.google_client_secret,
        &code,
        &redirect_uri,
    )
    .await
    {
        Ok(t) => t,
        Err(e) => {
            tracing::warn!(error = %format!("{:#}", e), "OAuth code exchange failed");
            return login_failed(
                cli_callback,
                StatusCode::BAD_GATEWAY,
                &format!("{:#}", e),
            );
        }
    };

    let email = match GoogleCalendar::get_user_email(&tokens.access_token).await {
        Ok(e) => e,
        Err(e) => {
            return login_failed(
                cli_callback,
                StatusCode::BAD_GATEWAY,
                &format!("Failed to get user email: {:#}", e),
            );
        }
    };

    let (user_id, api_key) =
        match register_user_internal(&state, &email, tokens.refresh_token.as_deref()) {
            Ok(registered) => registered,
            Err(e) => {
                tracing::error!(%email, error = %format!("{:#}", e), "User registration failed");
                return login_failed(
                    cli_callback,
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &format!("{:#}", e),
                );
            }
        };

    tracing::info!(%user_id, %email, "User signed in");

    if let Some(callback) = cli_callback {
        return Redirect::temporary(&format!(
            "{}?api_key={}&email={}&user_id={}",
            callback,
            urlencoding::encode(&api_key),
            urlencoding::encode(&email),
            urlencoding::encode(&user_id)
        ))
        .into_response();
    }

    Html(success_page(&state.server_url, &email, &api_key, &user_id)).into_response()
}

/// Create the user or refresh an existing one. Either way a fresh API key
/// is issued and returned once, in the clear.
///
/// Google only sends a refresh token on first consent, so an existing
/// token is kept when the callback carries none.
pub(crate) fn register_user_internal(
    state: &AppState,
    email: &str,
    refresh_token: Option<&str>,
) -> anyhow::Result<(String, String)> {
    let api_key = generate_api_key();
    let api_key_hash = hash_api_key(&api_key)?;

    if let Some(existing) = state.db.get_user_by_email(email)? {
        state
            .db
            .update_user_api_key_hash(&existing.id, &api_key_hash)?;
        if let Some(token) = refresh_token.filter(|t| !t.is_empty()) {
            state.db.update_user_refresh_token(&existing.id, Some(token))?;
        }
        return Ok((existing.id, api_key));
    }

    let user_id = Uuid::new_v4().to_string();
    let user = User {
        id: user_id.clone(),
        email: email.to_string(),
        google_refresh_token: refresh_token.map(str::to_string),
        api_key_hash,
        webhook_url: None,
        webhook_secret: None,
        created_at: Utc::now().timestamp(),
    };
    state.db.create_user(&user)?;

    Ok((user_id, api_key))
}

#[derive(Serialize)]
pub struct RotateKeyResponse {
    pub api_key: String,
}

/// Rotate API key
pub async fn rotate_api_key(
    State(state): State<Arc<AppState>>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
) -> Response {
    let api_key = generate_api_key();
    let api_key_hash = match hash_api_key(&api_key) {
        Ok(h) => h,
        Err(e) => return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    if let Err(e) = state.db.update_user_api_key_hash(&user.id, &api_key_hash) {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    }

    tracing::info!(user_id = %user.id, "API key rotated");
    Json(RotateKeyResponse { api_key }).into_response()
}

fn success_page(server_url: &str, email: &str, api_key: &str, user_id: &str) -> String {
    let email = escape_html(email);
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>dayplan - Login Successful</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <style>
        * {{ box-sizing: border-box; }}
        body {{ font-family: -apple-system, system-ui, sans-serif; background: #f0f4f8; min-height: 100vh; padding: 40px 20px; margin: 0; }}
        .container {{ background: white; border-radius: 16px; padding: 40px; max-width: 560px; margin: 0 auto; box-shadow: 0 10px 40px rgba(0,0,0,0.12); }}
        h1 {{ color: #1a1a1a; margin: 0 0 8px; font-size: 24px; text-align: center; }}
        .email {{ color: #666; margin: 0 0 32px; text-align: center; }}
        .field {{ margin-bottom: 20px; }}
        .label {{ font-size: 11px; color: #888; text-transform: uppercase; letter-spacing: 0.5px; margin-bottom: 8px; font-weight: 600; }}
        .value {{ background: #f5f5f5; padding: 14px 16px; border-radius: 8px; font-family: 'SF Mono', Monaco, monospace; font-size: 14px; word-break: break-all; border: 1px solid #e5e5e5; }}
        .code-block {{ background: #1a1a1a; color: #e5e5e5; padding: 12px 14px; border-radius: 8px; font-family: 'SF Mono', Monaco, monospace; font-size: 12px; overflow-x: auto; white-space: nowrap; }}
    </style>
</head>
<body>
    <div class="container">
        <h1>Login Successful</h1>
        <p class="email">{email}</p>

        <div class="field">
            <div class="label">Your API Key</div>
            <div class="value">{api_key}</div>
        </div>

        <div class="field">
            <div class="label">User ID</div>
            <div class="value">{user_id}</div>
        </div>

        <div class="field">
            <div class="label">Today's plan</div>
            <div class="code-block">curl {server_url}/v1/dashboard -H "Authorization: Bearer {api_key}"</div>
        </div>
    </div>
</body>
</html>"#
    )
}

fn failure_page(error: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>dayplan - Login Failed</title>
    <style>
        body {{ font-family: -apple-system, system-ui, sans-serif; background: #f5f5f5; padding: 40px; text-align: center; }}
        .container {{ background: white; border-radius: 12px; padding: 40px; max-width: 500px; margin: 0 auto; box-shadow: 0 4px 20px rgba(0,0,0,0.1); }}
        h1 {{ color: #ef4444; }}
        .error {{ color: #666; margin-bottom: 24px; }}
    </style>
</head>
<body>
    <div class="container">
        <h1>Login Failed</h1>
        <p class="error">{}</p>
        <p><a href="/auth/google">Try again</a></p>
    </div>
</body>
</html>"#,
        escape_html(error)
    )
}

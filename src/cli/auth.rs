use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

use super::OutputFormat;
use crate::models::LocalConfig;
use crate::notify::escape_html;

const LOGIN_TIMEOUT_SECS: u64 = 300;

/// Response from login command
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub email: String,
    pub api_key: String,
    pub user_id: String,
}

impl std::fmt::Display for LoginResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Logged in as {}", self.email)?;
        writeln!(f, "Your API key: {}", self.api_key)?;
        writeln!(f, "User ID: {}", self.user_id)
    }
}

type ResultSender = Arc<Mutex<Option<oneshot::Sender<Result<LoginResponse>>>>>;

/// Run the login command using server-side OAuth
pub async fn run_login(server_url: &str, format: OutputFormat) -> Result<()> {
    let server_url = server_url.trim_end_matches('/');

    // Local port the server redirects back to
    let listener = TcpListener::bind("127.0.0.1:0").context("Failed to bind local server")?;
    listener.set_nonblocking(true)?;
    let port = listener.local_addr()?.port();
    let callback_url = format!("http://localhost:{}", port);

    let auth_url = format!(
        "{}/auth/google?cli_callback={}",
        server_url,
        urlencoding::encode(&callback_url)
    );

    println!("Opening browser for authentication...");
    println!("If it doesn't open automatically, visit: {}", auth_url);

    if let Err(e) = open::that(&auth_url) {
        eprintln!("Failed to open browser: {}. Please open the URL manually.", e);
    }

    let (tx, rx) = oneshot::channel::<Result<LoginResponse>>();
    let tx: ResultSender = Arc::new(Mutex::new(Some(tx)));

    let listener = tokio::net::TcpListener::from_std(listener)?;

    println!("Waiting for authentication...");

    // Handle exactly one request
    let handle = tokio::spawn(async move {
        if let Ok((stream, _)) = listener.accept().await {
            handle_callback(stream, tx).await;
        }
    });

    let result = tokio::time::timeout(std::time::Duration::from_secs(LOGIN_TIMEOUT_SECS), rx)
        .await
        .context("Authentication timed out")?
        .context("Failed to receive authentication result")??;

    handle.abort();

    let mut config = LocalConfig::load().unwrap_or_default();
    config.api_key = Some(result.api_key.clone());
    config.server_url = Some(server_url.to_string());
    config.email = Some(result.email.clone());
    config.user_id = Some(result.user_id.clone());
    config.save().context("Failed to save config")?;

    format.print(&result)
}

async fn handle_callback(mut stream: tokio::net::TcpStream, tx: ResultSender) {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let mut buffer = [0u8; 4096];
    let n = match stream.read(&mut buffer).await {
        Ok(n) => n,
        Err(_) => return,
    };

    let request = String::from_utf8_lossy(&buffer[..n]);
    let result = parse_callback_request(&request);

    let (status, heading, message) = match &result {
        Ok(login) => (
            "200 OK",
            "Login Successful",
            format!(
                "Welcome, {}! You can close this window and return to the terminal.",
                login.email
            ),
        ),
        Err(e) => (
            "400 Bad Request",
            "Login Failed",
            format!("{}. Please close this window and try again.", e),
        ),
    };
    let body = format!(
        r#"<!DOCTYPE html>
<html>
<head><title>dayplan - {heading}</title>
<style>
body {{ font-family: -apple-system, system-ui, sans-serif; text-align: center; padding: 50px; background: #f5f5f5; }}
.container {{ background: white; border-radius: 8px; padding: 40px; max-width: 400px; margin: 0 auto; box-shadow: 0 2px 10px rgba(0,0,0,0.1); }}
p {{ color: #666; }}
</style>
</head>
<body>
<div class="container">
<h1>{heading}</h1>
<p>{message}</p>
</div>
</body>
</html>"#,
        heading = heading,
        message = escape_html(&message)
    );

    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );

    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.flush().await;

    let sender = tx.lock().ok().and_then(|mut guard| guard.take());
    if let Some(sender) = sender {
        let _ = sender.send(result);
    }
}

/// Pull the credentials (or the error) out of the redirect's request line
fn parse_callback_request(request: &str) -> Result<LoginResponse> {
    let first_line = request.lines().next().unwrap_or("");
    let path = first_line.split_whitespace().nth(1).unwrap_or("/");

    let query = path.split_once('?').map(|(_, q)| q).unwrap_or("");
    let mut params: HashMap<String, String> = url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();

    if let Some(error) = params.get("error") {
        anyhow::bail!("{}", error);
    }

    let mut take = |key: &str| {
        params
            .remove(key)
            .ok_or_else(|| anyhow::anyhow!("Missing {} in callback", key))
    };

    Ok(LoginResponse {
        api_key: take("api_key")?,
        email: take("email")?,
        user_id: take("user_id")?,
    })
}

/// Run the logout command
pub fn run_logout(format: OutputFormat) -> Result<()> {
    let config_path = LocalConfig::config_path();
    if config_path.exists() {
        std::fs::remove_file(&config_path).context("Failed to remove config file")?;
    }

    format.print(&super::SuccessResponse {
        message: "Logged out successfully".to_string(),
    })
}

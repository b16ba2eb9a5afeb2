use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use chat_api::auth::tokens::AccessTokenClaims;
use chat_api::config::Config;
use chat_api::db::users::{MemoryUserStore, UserProfile};
use chat_api::socket::rooms::RoomRegistry;
use chat_api::AppState;

pub const TEST_SECRET: &str = "socket-test-secret";

/// Build an `AppState` backed by an in-memory user store.
pub fn test_state() -> (AppState, Arc<MemoryUserStore>) {
    let users = Arc::new(MemoryUserStore::new());
    let state = AppState {
        config: Arc::new(Config {
            access_token_secret: TEST_SECRET.to_string(),
            port: 0,
        }),
        users: users.clone(),
        rooms: Arc::new(RoomRegistry::new()),
    };
    (state, users)
}

/// Start an actual TCP server for WebSocket testing. The server runs in the
/// background; returns the bound address plus the state and store handles.
pub async fn start_ws_server() -> (SocketAddr, AppState, Arc<MemoryUserStore>) {
    let (state, users) = test_state();
    let app = chat_api::routes::router().with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state, users)
}

/// Seed a user into the in-memory store and return its profile.
pub fn seed_user(users: &MemoryUserStore, id: &str, username: &str) -> UserProfile {
    let profile = UserProfile {
        id: id.to_string(),
        username: username.to_string(),
        email: format!("{username}@example.com"),
        avatar_url: None,
        created_at: Utc::now(),
    };
    users.insert(profile.clone());
    profile
}

/// Mint an HS256 access token for a user, expiring `ttl_secs` from now
/// (negative for an already-expired token).
pub fn mint_token(user_id: &str, ttl_secs: i64) -> String {
    let claims = AccessTokenClaims {
        sub: user_id.to_string(),
        exp: Utc::now().timestamp() + ttl_secs,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .expect("mint token")
}

/// Open a WebSocket connection, presenting the token via the cookie header,
/// the query parameter, both, or neither.
pub async fn connect(
    addr: SocketAddr,
    cookie_token: Option<&str>,
    query_token: Option<&str>,
) -> WebSocketStream<MaybeTlsStream<TcpStream>> {
    let mut url = format!("ws://{addr}/ws");
    if let Some(token) = query_token {
        url.push_str(&format!("?token={token}"));
    }

    let mut request = url.into_client_request().expect("client request");
    if let Some(token) = cookie_token {
        request.headers_mut().insert(
            http::header::COOKIE,
            http::HeaderValue::from_str(&format!("accessToken={token}")).unwrap(),
        );
    }

    let (ws_stream, _) = tokio_tungstenite::connect_async(request)
        .await
        .expect("ws connect");
    ws_stream
}

/// Poll until `cond` holds, panicking after two seconds.
pub async fn wait_until(mut cond: impl FnMut() -> bool, what: &str) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

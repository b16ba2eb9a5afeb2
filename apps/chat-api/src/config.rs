/// Chat API configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Secret used to verify access-token signatures at socket handshake.
    pub access_token_secret: String,
    /// Port the HTTP server binds to.
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Panics with a descriptive message if a required variable is missing.
    pub fn from_env() -> Self {
        Self {
            access_token_secret: required_var("ACCESS_TOKEN_SECRET"),
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
        }
    }
}

fn required_var(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| panic!("{name} env var is required"))
}

use ulid::Ulid;

/// Prefix for socket connection ids handed out at handshake time.
pub const CONNECTION_PREFIX: &str = "conn";

/// Build a unique id of the form `<prefix>_<ulid>`.
pub fn prefixed_ulid(prefix: &str) -> String {
    format!("{}_{}", prefix, Ulid::new().to_string())
}

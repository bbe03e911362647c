use rand::{distributions::Alphanumeric, thread_rng, Rng};

/// Lifetime of a moderation login.
pub const SESSION_TTL_SECS: i64 = 86_400;

/// Generate the random value stored in the `session` cookie.
pub fn generate_session_token() -> String {
    random_alphanumeric(64)
}

/// Generate the bearer token the moderation client sends with post requests.
pub fn generate_client_token() -> String {
    random_alphanumeric(16)
}

fn random_alphanumeric(len: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

use super::*;

fn limiter() -> RateLimiter {
    RateLimiter::with_config(RateLimitConfig::default())
}

#[test]
fn per_client_allows_up_to_limit() {
    let rl = limiter();
    let now = Instant::now();

    for i in 0..DEFAULT_PER_CLIENT_LIMIT {
        assert!(rl.check_and_record_at("198.51.100.7_contact", now).is_ok(), "request {i} should succeed");
    }
    assert!(matches!(
        rl.check_and_record_at("198.51.100.7_contact", now),
        Err(RateLimitError::PerClientExceeded { limit: DEFAULT_PER_CLIENT_LIMIT, .. })
    ));
}

#[test]
fn global_allows_up_to_limit() {
    let rl = limiter();
    let now = Instant::now();

    // Use distinct keys to avoid hitting the per-client limit first.
    for i in 0..DEFAULT_GLOBAL_LIMIT {
        let key = format!("10.0.0.{i}_subscribe");
        assert!(rl.check_and_record_at(&key, now).is_ok(), "request {i} should succeed");
    }
    assert!(matches!(
        rl.check_and_record_at("10.9.9.9_subscribe", now),
        Err(RateLimitError::GlobalExceeded { .. })
    ));
}

#[test]
fn window_expiry_allows_new_requests() {
    let rl = limiter();
    let start = Instant::now();

    for _ in 0..DEFAULT_PER_CLIENT_LIMIT {
        rl.check_and_record_at("a_contact", start).unwrap();
    }
    assert!(rl.check_and_record_at("a_contact", start).is_err());

    let after_window = start + Duration::from_secs(DEFAULT_PER_CLIENT_WINDOW_SECS) + Duration::from_millis(1);
    assert!(rl.check_and_record_at("a_contact", after_window).is_ok());
}

#[test]
fn endpoints_are_limited_independently() {
    let rl = limiter();
    let now = Instant::now();

    for _ in 0..DEFAULT_PER_CLIENT_LIMIT {
        rl.check_and_record_at("203.0.113.5_contact", now).unwrap();
    }
    assert!(rl.check_and_record_at("203.0.113.5_contact", now).is_err());
    assert!(rl.check_and_record_at("203.0.113.5_subscribe", now).is_ok());
}

#[test]
fn rejected_requests_are_not_recorded() {
    let rl = RateLimiter::with_config(RateLimitConfig {
        per_client_limit: 1,
        per_client_window: Duration::from_secs(10),
        global_limit: 10,
        global_window: Duration::from_secs(10),
    });
    let start = Instant::now();

    rl.check_and_record_at("k", start).unwrap();
    for _ in 0..5 {
        assert!(rl.check_and_record_at("k", start + Duration::from_secs(1)).is_err());
    }
    // Only the first request counts, so the window reopens 10s after it.
    assert!(rl.check_and_record_at("k", start + Duration::from_secs(11)).is_ok());
}

#[test]
fn drained_keys_are_evicted() {
    let rl = limiter();
    let start = Instant::now();

    rl.check_and_record_at("old", start).unwrap();
    let later = start + Duration::from_secs(DEFAULT_PER_CLIENT_WINDOW_SECS * 2);
    rl.check_and_record_at("new", later).unwrap();

    let inner = rl.inner.lock().unwrap();
    assert!(!inner.client_requests.contains_key("old"));
    assert!(inner.client_requests.contains_key("new"));
}

#[test]
fn error_messages_name_the_limit() {
    let err = RateLimitError::PerClientExceeded { limit: 5, window_secs: 60 };
    assert_eq!(err.to_string(), "per-client rate limit exceeded (max 5 requests/60s)");
}

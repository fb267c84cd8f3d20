use super::*;

const SITE_VARS: &[&str] = &[
    "PORT",
    "SITE_DIR",
    "PARTIAL_ORIGIN",
    "BLOG_MANIFEST",
    "CONTACT_FORM_URL",
    "SUBSCRIBE_FORM_URL",
    "RECAPTCHA_SECRET_KEY",
    "RECAPTCHA_SITE_KEY",
    "RECAPTCHA_MIN_SCORE",
    "RECAPTCHA_VERIFY_URL",
    "RELAY_TIMEOUT_SECS",
    "TRUST_FORWARDED_FOR",
    "RATE_LIMIT_PER_CLIENT",
    "RATE_LIMIT_PER_CLIENT_WINDOW_SECS",
    "RATE_LIMIT_GLOBAL",
    "RATE_LIMIT_GLOBAL_WINDOW_SECS",
];

/// Serializes tests that touch process-wide environment variables.
static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

fn lock_env() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// # Safety
/// Callers must hold [`lock_env`].
unsafe fn clear_site_env() {
    for key in SITE_VARS {
        unsafe { std::env::remove_var(key) };
    }
}

#[test]
fn from_env_defaults() {
    let _guard = lock_env();
    unsafe { clear_site_env() };

    let cfg = SiteConfig::from_env().unwrap();
    assert_eq!(cfg.port, DEFAULT_PORT);
    assert_eq!(cfg.site_dir, PathBuf::from(DEFAULT_SITE_DIR));
    assert_eq!(cfg.partial_origin, None);
    assert_eq!(cfg.blog_manifest, DEFAULT_BLOG_MANIFEST);
    assert_eq!(cfg.contact_form_url, None);
    assert_eq!(cfg.subscribe_form_url, None);
    assert_eq!(cfg.recaptcha.secret_key, None);
    assert_eq!(cfg.recaptcha.site_key, None);
    assert!((cfg.recaptcha.min_score - DEFAULT_RECAPTCHA_MIN_SCORE).abs() < f64::EPSILON);
    assert_eq!(cfg.recaptcha.verify_url, DEFAULT_RECAPTCHA_VERIFY_URL);
    assert_eq!(cfg.relay_timeout, Duration::from_secs(DEFAULT_RELAY_TIMEOUT_SECS));
    assert!(!cfg.trust_forwarded_for);
    assert_eq!(cfg.rate_limit, RateLimitConfig::default());
}

#[test]
fn from_env_parses_overrides() {
    let _guard = lock_env();
    unsafe {
        clear_site_env();
        std::env::set_var("PORT", "8080");
        std::env::set_var("SITE_DIR", "/srv/site");
        std::env::set_var("PARTIAL_ORIGIN", "https://cdn.example.test/");
        std::env::set_var("BLOG_MANIFEST", "/posts/index.json");
        std::env::set_var("CONTACT_FORM_URL", "https://forms.example.test/contact");
        std::env::set_var("RECAPTCHA_SECRET_KEY", "secret");
        std::env::set_var("RECAPTCHA_MIN_SCORE", "0.7");
        std::env::set_var("RELAY_TIMEOUT_SECS", "3");
        std::env::set_var("TRUST_FORWARDED_FOR", "yes");
        std::env::set_var("RATE_LIMIT_PER_CLIENT", "3");
        std::env::set_var("RATE_LIMIT_GLOBAL_WINDOW_SECS", "300");
    }

    let cfg = SiteConfig::from_env().unwrap();
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.site_dir, PathBuf::from("/srv/site"));
    assert_eq!(cfg.partial_origin.as_deref(), Some("https://cdn.example.test"));
    assert_eq!(cfg.blog_manifest, "posts/index.json");
    assert_eq!(cfg.contact_form_url.as_deref(), Some("https://forms.example.test/contact"));
    assert_eq!(cfg.recaptcha.secret_key.as_deref(), Some("secret"));
    assert!((cfg.recaptcha.min_score - 0.7).abs() < f64::EPSILON);
    assert_eq!(cfg.relay_timeout, Duration::from_secs(3));
    assert!(cfg.trust_forwarded_for);
    assert_eq!(cfg.rate_limit.per_client_limit, 3);
    assert_eq!(cfg.rate_limit.global_window, Duration::from_secs(300));
    assert_eq!(cfg.rate_limit.global_limit, RateLimitConfig::default().global_limit);

    unsafe { clear_site_env() };
}

#[test]
fn from_env_blank_values_fall_back_to_defaults() {
    let _guard = lock_env();
    unsafe {
        clear_site_env();
        std::env::set_var("CONTACT_FORM_URL", "   ");
        std::env::set_var("PORT", "");
    }

    let cfg = SiteConfig::from_env().unwrap();
    assert_eq!(cfg.contact_form_url, None);
    assert_eq!(cfg.port, DEFAULT_PORT);

    unsafe { clear_site_env() };
}

#[test]
fn from_env_invalid_port_errors() {
    let _guard = lock_env();
    unsafe {
        clear_site_env();
        std::env::set_var("PORT", "eighty");
    }

    let err = SiteConfig::from_env().unwrap_err().to_string();
    assert!(err.contains("PORT"));

    unsafe { clear_site_env() };
}

#[test]
fn from_env_score_out_of_range_errors() {
    let _guard = lock_env();
    unsafe {
        clear_site_env();
        std::env::set_var("RECAPTCHA_MIN_SCORE", "1.5");
    }

    assert!(matches!(SiteConfig::from_env(), Err(ConfigError::ScoreOutOfRange { .. })));

    unsafe { clear_site_env() };
}

#[test]
fn from_env_invalid_bool_errors() {
    let _guard = lock_env();
    unsafe {
        clear_site_env();
        std::env::set_var("TRUST_FORWARDED_FOR", "maybe");
    }

    assert!(matches!(
        SiteConfig::from_env(),
        Err(ConfigError::InvalidValue { key: "TRUST_FORWARDED_FOR", .. })
    ));

    unsafe { clear_site_env() };
}

#[test]
fn from_env_invalid_rate_limit_errors() {
    let _guard = lock_env();
    unsafe {
        clear_site_env();
        std::env::set_var("RATE_LIMIT_PER_CLIENT", "five");
    }

    assert!(matches!(
        SiteConfig::from_env(),
        Err(ConfigError::InvalidValue { key: "RATE_LIMIT_PER_CLIENT", .. })
    ));

    unsafe { clear_site_env() };
}

#[test]
fn from_env_zero_rate_limits_error() {
    let _guard = lock_env();
    for key in ["RATE_LIMIT_PER_CLIENT", "RATE_LIMIT_PER_CLIENT_WINDOW_SECS", "RATE_LIMIT_GLOBAL", "RATE_LIMIT_GLOBAL_WINDOW_SECS"] {
        unsafe {
            clear_site_env();
            std::env::set_var(key, "0");
        }
        assert!(
            matches!(SiteConfig::from_env(), Err(ConfigError::Zero { key: k }) if k == key),
            "expected {key}=0 to be rejected"
        );
    }

    unsafe { clear_site_env() };
}

#[test]
fn parse_bool_variants() {
    for raw in ["1", "true", "YES", " on "] {
        assert_eq!(parse_bool(raw), Some(true), "expected true for {raw:?}");
    }
    for raw in ["0", "False", "no", "off"] {
        assert_eq!(parse_bool(raw), Some(false), "expected false for {raw:?}");
    }
    assert_eq!(parse_bool(""), None);
    assert_eq!(parse_bool("maybe"), None);
}

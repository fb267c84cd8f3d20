//! Blog rendering and the form relay.

pub mod blog;
pub mod recaptcha;
pub mod relay;
pub mod validate;

//! Contact section partial.
//!
//! Besides injecting the form, hydration binds it to the relay endpoint and
//! asks for the reCAPTCHA v3 script in the page head. The script is added
//! once per page no matter how many contact sections the page holds.

use super::{Attrs, ErrorNotice, Extract, HeadScript, HydrateError, Hydrated, PartialLoader, PostHydrate, rewrite_elements};

pub const RECAPTCHA_SCRIPT_MARKER: &str = "data-recaptcha-script";
pub const RECAPTCHA_SCRIPT_URL: &str = "https://www.google.com/recaptcha/api.js";
pub const DEFAULT_SUBMIT_ENDPOINT: &str = "/api/submit";

const FORM_SELECTOR: &str = "form.contact-form";
const FALLBACK_ID: &str = "contact";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactOptions {
    /// Public reCAPTCHA site key; without it no script is requested.
    pub site_key: Option<String>,
    /// Where the contact form posts.
    pub endpoint: String,
}

impl Default for ContactOptions {
    fn default() -> Self {
        Self { site_key: None, endpoint: DEFAULT_SUBMIT_ENDPOINT.to_owned() }
    }
}

pub struct ContactHook {
    options: ContactOptions,
}

impl ContactHook {
    #[must_use]
    pub fn new(options: ContactOptions) -> Self {
        Self { options }
    }
}

impl PostHydrate for ContactHook {
    fn apply(&self, _container: &Attrs, hydrated: &mut Hydrated) -> Result<(), HydrateError> {
        hydrated.id = Some(
            hydrated
                .section_id
                .clone()
                .unwrap_or_else(|| FALLBACK_ID.to_owned()),
        );
        hydrated.html = rewrite_elements(&hydrated.html, FORM_SELECTOR, |el| {
            el.set_attribute("action", &self.options.endpoint)?;
            el.set_attribute("method", "post")?;
            if let Some(key) = &self.options.site_key {
                el.set_attribute("data-recaptcha-site-key", key)?;
            }
            Ok(())
        })?;
        Ok(())
    }

    fn head_script(&self) -> Option<HeadScript> {
        self.options.site_key.as_ref().map(|key| HeadScript {
            marker: RECAPTCHA_SCRIPT_MARKER,
            src: format!("{RECAPTCHA_SCRIPT_URL}?render={key}"),
        })
    }
}

#[must_use]
pub fn loader(options: ContactOptions) -> PartialLoader {
    PartialLoader::new(
        "contact",
        "[data-contact-target]",
        "contact.html",
        Extract::Selector("[data-contact-section]".to_owned()),
        ErrorNotice {
            container_class: Some("py-20 px-4 sm:px-6 lg:px-8"),
            wrapper_class: "max-w-lg mx-auto text-center",
            heading: Some(("h2", "Contact Unavailable")),
            message: "We hit a hiccup loading the contact form.",
        },
        Box::new(ContactHook::new(options)),
    )
}

#[cfg(test)]
#[path = "contact_test.rs"]
mod tests;

//! Site header partial: navigation mappings plus the mobile menu.
//!
//! The mobile menu toggles in the browser. However the partial was saved,
//! the header leaves the server with the menu closed.

use super::nav::{NavConfig, apply_nav_mappings};
use super::{Attrs, ErrorNotice, Extract, HydrateError, Hydrated, PartialLoader, PostHydrate, rewrite_elements};
use crate::markup::remove_class;

const ACTIVE_CLASS: &str = "active";
const HAMBURGER_SELECTOR: &str = ".site-header .hamburger";
const MOBILE_MENU_SELECTOR: &str = ".site-header .mobile-menu";

/// Put the hamburger button and mobile menu of a header fragment in their
/// closed state: no `active` class, `aria-expanded="false"`.
///
/// # Errors
///
/// Returns [`HydrateError::Rewrite`] if the fragment cannot be rewritten.
pub fn close_mobile_menu(html: &str) -> Result<String, HydrateError> {
    let html = rewrite_elements(html, HAMBURGER_SELECTOR, |el| {
        let class = remove_class(&el.get_attribute("class").unwrap_or_default(), ACTIVE_CLASS);
        el.set_attribute("class", &class)?;
        el.set_attribute("aria-expanded", "false")?;
        Ok(())
    })?;
    rewrite_elements(&html, MOBILE_MENU_SELECTOR, |el| {
        let class = remove_class(&el.get_attribute("class").unwrap_or_default(), ACTIVE_CLASS);
        el.set_attribute("class", &class)?;
        Ok(())
    })
}

/// Header callback: navigation mappings, then a closed mobile menu.
pub struct HeaderHook;

impl PostHydrate for HeaderHook {
    fn apply(&self, container: &Attrs, hydrated: &mut Hydrated) -> Result<(), HydrateError> {
        let html = apply_nav_mappings(&hydrated.html, &NavConfig::from_attrs(container))?;
        hydrated.html = close_mobile_menu(&html)?;
        Ok(())
    }
}

#[must_use]
pub fn loader() -> PartialLoader {
    PartialLoader::new(
        "header",
        "#global-header, [data-header-target]",
        "header.html",
        Extract::Fragment,
        ErrorNotice {
            container_class: None,
            wrapper_class: "partial-error text-gray-400",
            heading: None,
            message: "Navigation is unavailable right now.",
        },
        Box::new(HeaderHook),
    )
}

#[cfg(test)]
#[path = "header_test.rs"]
mod tests;

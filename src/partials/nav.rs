//! Navigation link rewriting for hydrated header and footer partials.
//!
//! Partials mark their links with `data-nav="home|about|projects|blog"`.
//! The container decides where those point: `data-path-depth` prefixes the
//! defaults with `../` per level, and `data-nav-<name>` overrides one link.

use super::{Attrs, HydrateError, Hydrated, PostHydrate, rewrite_elements};
use crate::markup::leading_uint;

/// Deeper nesting than this is treated as a typo rather than honoured.
const MAX_PATH_DEPTH: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavConfig {
    pub home: String,
    pub about: String,
    pub projects: String,
    pub blog: String,
}

impl NavConfig {
    /// Default targets for a page `depth` directories below the site root.
    #[must_use]
    pub fn for_depth(depth: usize) -> Self {
        let prefix = "../".repeat(depth.min(MAX_PATH_DEPTH));
        Self {
            home: format!("{prefix}index.html"),
            about: format!("{prefix}index.html#about-me"),
            projects: format!("{prefix}projects.html"),
            blog: format!("{prefix}blog.html"),
        }
    }

    /// Build the mapping from a container's data attributes.
    #[must_use]
    pub fn from_attrs(attrs: &Attrs) -> Self {
        let defaults = Self::for_depth(leading_uint(attrs.get("data-path-depth").map_or("", String::as_str)));
        let pick = |name: &str, default: String| {
            attrs
                .get(&format!("data-nav-{name}"))
                .filter(|v| !v.is_empty())
                .cloned()
                .unwrap_or(default)
        };
        Self {
            home: pick("home", defaults.home),
            about: pick("about", defaults.about),
            projects: pick("projects", defaults.projects),
            blog: pick("blog", defaults.blog),
        }
    }

    #[must_use]
    pub fn target(&self, name: &str) -> Option<&str> {
        match name {
            "home" => Some(self.home.as_str()),
            "about" => Some(self.about.as_str()),
            "projects" => Some(self.projects.as_str()),
            "blog" => Some(self.blog.as_str()),
            _ => None,
        }
    }
}

/// Point every `[data-nav]` element at its mapped URL. Unknown names are
/// left alone.
///
/// # Errors
///
/// Returns [`HydrateError::Rewrite`] if the fragment cannot be rewritten.
pub fn apply_nav_mappings(html: &str, nav: &NavConfig) -> Result<String, HydrateError> {
    rewrite_elements(html, "[data-nav]", |el| {
        let target = el
            .get_attribute("data-nav")
            .and_then(|name| nav.target(name.trim()).map(str::to_owned));
        if let Some(target) = target {
            el.set_attribute("href", &target)?;
        }
        Ok(())
    })
}

/// Footer callback: navigation mappings only.
pub struct NavHook;

impl PostHydrate for NavHook {
    fn apply(&self, container: &Attrs, hydrated: &mut Hydrated) -> Result<(), HydrateError> {
        hydrated.html = apply_nav_mappings(&hydrated.html, &NavConfig::from_attrs(container))?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "nav_test.rs"]
mod tests;

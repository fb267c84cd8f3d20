//! Project showcase preview partial.

use std::cell::Cell;

use super::{Attrs, ErrorNotice, Extract, HydrateError, Hydrated, PartialLoader, PostHydrate, rewrite_elements};
use crate::markup::add_class;

const PREVIEW_CLASS: &str = "projects-preview";
const PREVIEW_GRID_CLASS: &str = "projects-preview-grid";

/// Marks the container as a preview and its first `.grid` as the preview grid.
pub struct ProjectsHook;

impl PostHydrate for ProjectsHook {
    fn apply(&self, container: &Attrs, hydrated: &mut Hydrated) -> Result<(), HydrateError> {
        hydrated.add_class(container, PREVIEW_CLASS);

        let seen_grid = Cell::new(false);
        hydrated.html = rewrite_elements(&hydrated.html, ".grid", |el| {
            if !seen_grid.replace(true) {
                let class = add_class(&el.get_attribute("class").unwrap_or_default(), PREVIEW_GRID_CLASS);
                el.set_attribute("class", &class)?;
            }
            Ok(())
        })?;
        Ok(())
    }
}

#[must_use]
pub fn loader() -> PartialLoader {
    PartialLoader::new(
        "projects",
        "[data-projects-target]",
        "projects.html",
        Extract::Selector("[data-projects-section]".to_owned()),
        ErrorNotice {
            container_class: None,
            wrapper_class: "max-w-3xl mx-auto text-center",
            heading: Some(("h4", "Projects Unavailable")),
            message: "We ran into a glitch loading the showcase.",
        },
        Box::new(ProjectsHook),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_class_gains_preview_class() {
        let mut h = Hydrated { class: Some("py-20".into()), id: None, html: String::new(), section_id: None };
        ProjectsHook.apply(&Attrs::new(), &mut h).unwrap();
        assert_eq!(h.class.as_deref(), Some("py-20 projects-preview"));
    }

    #[test]
    fn container_class_is_kept_when_source_has_none() {
        let container: Attrs = [("class".to_owned(), "home-section".to_owned())].into_iter().collect();
        let mut h = Hydrated { class: None, id: None, html: String::new(), section_id: None };
        ProjectsHook.apply(&container, &mut h).unwrap();
        assert_eq!(h.class.as_deref(), Some("home-section projects-preview"));
    }

    #[test]
    fn only_first_grid_is_marked() {
        let mut h = Hydrated {
            class: None,
            id: None,
            html: r#"<div class="grid cols-3"></div><div class="grid"></div>"#.into(),
            section_id: None,
        };
        ProjectsHook.apply(&Attrs::new(), &mut h).unwrap();
        assert_eq!(h.html, r#"<div class="grid cols-3 projects-preview-grid"></div><div class="grid"></div>"#);
    }
}

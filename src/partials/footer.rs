//! Site footer partial.

use super::nav::NavHook;
use super::{ErrorNotice, Extract, PartialLoader};

#[must_use]
pub fn loader() -> PartialLoader {
    PartialLoader::new(
        "footer",
        "#global-footer, [data-footer-target]",
        "footer.html",
        Extract::Fragment,
        ErrorNotice {
            container_class: None,
            wrapper_class: "partial-error text-gray-400",
            heading: None,
            message: "Footer is unavailable right now.",
        },
        Box::new(NavHook),
    )
}

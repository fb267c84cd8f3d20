//! Partial hydration of the shared header, footer, contact and project sections.
//!
//! DESIGN
//! ======
//! Pages ship placeholder containers (`<div data-header-target></div>`).
//! Before a page is served, every container is filled with a section of a
//! sibling document:
//!
//! 1. scan the page for each loader's containers (one `lol_html` pass),
//!    stamping each with its slot so the rewrite pass can find its plan
//! 2. resolve every container's source against the page path and fetch
//!    each distinct document once, concurrently
//! 3. extract the target section (`scraper`), run the loader's
//!    [`PostHydrate`] callback on it
//! 4. rewrite the page (second `lol_html` pass): content, class, id and the
//!    `data-<name>-hydrated` flag per container, plus any head scripts the
//!    callbacks asked for
//!
//! A container that already carries its hydrated flag is skipped without a
//! fetch, so hydrating an already hydrated page is a no-op. Failures stay
//! with their container: it receives the loader's inline notice and the
//! rest of the page is unaffected.

pub mod contact;
pub mod footer;
pub mod header;
pub mod nav;
pub mod projects;
pub mod source;

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;
use lol_html::html_content::{ContentType, Element};
use lol_html::{RewriteStrSettings, element, rewrite_str};
use scraper::{Html, Selector};
use tracing::{debug, warn};

use crate::markup::html_escape;
use source::{FetchError, SiteSource, resolve_path};

/// Attributes of a placeholder container, captured during the scan pass.
pub type Attrs = BTreeMap<String, String>;

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum HydrateError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("section {selector:?} not found in {source_path}")]
    SectionNotFound { selector: String, source_path: String },
    #[error("invalid selector {0:?}")]
    InvalidSelector(String),
    #[error("HTML rewrite failed: {0}")]
    Rewrite(String),
}

impl From<lol_html::errors::RewritingError> for HydrateError {
    fn from(e: lol_html::errors::RewritingError) -> Self {
        Self::Rewrite(e.to_string())
    }
}

impl From<lol_html::errors::AttributeNameError> for HydrateError {
    fn from(e: lol_html::errors::AttributeNameError) -> Self {
        Self::Rewrite(e.to_string())
    }
}

// =============================================================================
// SECTIONS
// =============================================================================

/// Which part of a fetched document gets injected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extract {
    /// The whole document, parsed the way a container's `innerHTML` would
    /// parse it; the container keeps its own class and id.
    Fragment,
    /// The first element matching a CSS selector.
    Selector(String),
}

/// A section pulled out of a fetched document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub id: Option<String>,
    pub class: Option<String>,
    pub inner_html: String,
}

/// Extract a section from a fetched document.
///
/// # Errors
///
/// Returns [`HydrateError::InvalidSelector`] for unparseable selectors and
/// [`HydrateError::SectionNotFound`] when nothing matches.
pub fn extract_section(document: &str, extract: &Extract, source_path: &str) -> Result<Section, HydrateError> {
    match extract {
        Extract::Fragment => {
            let fragment = Html::parse_fragment(document);
            Ok(Section { id: None, class: None, inner_html: fragment.root_element().inner_html() })
        }
        Extract::Selector(raw) => {
            let doc = Html::parse_document(document);
            let selector = Selector::parse(raw).map_err(|_| HydrateError::InvalidSelector(raw.clone()))?;
            let el = doc
                .select(&selector)
                .next()
                .ok_or_else(|| HydrateError::SectionNotFound {
                    selector: raw.clone(),
                    source_path: source_path.to_owned(),
                })?;
            let non_empty = |v: Option<&str>| v.map(str::trim).filter(|v| !v.is_empty()).map(str::to_owned);
            Ok(Section {
                id: non_empty(el.value().id()),
                class: non_empty(el.value().attr("class")),
                inner_html: el.inner_html(),
            })
        }
    }
}

/// What a container will be rewritten to. Post-hydration callbacks edit it
/// in place before the page pass applies it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hydrated {
    /// Replacement class attribute; `None` keeps the container's own.
    pub class: Option<String>,
    /// Replacement id; `None` keeps the container's own.
    pub id: Option<String>,
    /// Inner HTML to inject.
    pub html: String,
    /// Id of the source section, for callbacks that carry it over.
    pub section_id: Option<String>,
}

impl Hydrated {
    #[must_use]
    pub fn from_section(section: Section) -> Self {
        Self { class: section.class, id: None, html: section.inner_html, section_id: section.id }
    }

    /// Add a class to whatever class list the container ends up with.
    pub fn add_class(&mut self, container: &Attrs, class: &str) {
        let base = self
            .class
            .as_deref()
            .or_else(|| container.get("class").map(String::as_str))
            .unwrap_or_default();
        self.class = Some(crate::markup::add_class(base, class));
    }
}

/// A script a hydrated partial needs in the page head. `marker` is the
/// attribute that identifies it, so it is injected at most once per page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadScript {
    pub marker: &'static str,
    pub src: String,
}

impl HeadScript {
    #[must_use]
    pub fn tag(&self) -> String {
        format!(r#"<script src="{}" async defer {}="true"></script>"#, html_escape(&self.src), self.marker)
    }
}

/// Behaviour re-applied to freshly injected content.
pub trait PostHydrate: Send + Sync {
    /// Rewrite the hydrated section before it lands in the container.
    ///
    /// # Errors
    ///
    /// Returns a [`HydrateError`] if the section cannot be rewritten; the
    /// container then shows its error notice.
    fn apply(&self, container: &Attrs, hydrated: &mut Hydrated) -> Result<(), HydrateError>;

    /// Script the page head must carry once this partial is present.
    fn head_script(&self) -> Option<HeadScript> {
        None
    }
}

// =============================================================================
// LOADER
// =============================================================================

/// Inline message rendered into a container whose partial failed to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorNotice {
    /// Class the container switches to, if any.
    pub container_class: Option<&'static str>,
    pub wrapper_class: &'static str,
    /// Heading tag and text.
    pub heading: Option<(&'static str, &'static str)>,
    pub message: &'static str,
}

impl ErrorNotice {
    #[must_use]
    pub fn render(&self) -> String {
        match self.heading {
            Some((tag, text)) => format!(
                r#"<div class="{}"><{tag} class="text-3xl font-bold text-white mb-4">{}</{tag}><p class="text-gray-400">{}</p></div>"#,
                self.wrapper_class,
                html_escape(text),
                html_escape(self.message),
            ),
            None => format!(r#"<p class="{}">{}</p>"#, self.wrapper_class, html_escape(self.message)),
        }
    }
}

/// One kind of partial: where its containers are, what they load, and what
/// happens to the content afterwards.
pub struct PartialLoader {
    name: &'static str,
    containers: &'static str,
    default_src: &'static str,
    default_extract: Extract,
    src_attr: String,
    selector_attr: String,
    hydrated_attr: String,
    notice: ErrorNotice,
    hook: Box<dyn PostHydrate>,
}

impl PartialLoader {
    /// A loader named `name` reads `data-<name>-src` and
    /// `data-<name>-selector` from each container and flags it with
    /// `data-<name>-hydrated`.
    #[must_use]
    pub fn new(
        name: &'static str,
        containers: &'static str,
        default_src: &'static str,
        default_extract: Extract,
        notice: ErrorNotice,
        hook: Box<dyn PostHydrate>,
    ) -> Self {
        Self {
            name,
            containers,
            default_src,
            default_extract,
            src_attr: format!("data-{name}-src"),
            selector_attr: format!("data-{name}-selector"),
            hydrated_attr: format!("data-{name}-hydrated"),
            notice,
            hook,
        }
    }

    fn source_for<'a>(&'a self, container: &'a Attrs) -> &'a str {
        non_empty_attr(container, &self.src_attr).unwrap_or(self.default_src)
    }

    fn extract_for(&self, container: &Attrs) -> Extract {
        non_empty_attr(container, &self.selector_attr)
            .map_or_else(|| self.default_extract.clone(), |sel| Extract::Selector(sel.to_owned()))
    }

    fn is_hydrated(&self, container: &Attrs) -> bool {
        container
            .get(&self.hydrated_attr)
            .is_some_and(|v| v == "true")
    }

    fn hydrate_section(&self, container: &Attrs, document: &str, source_path: &str) -> Result<Hydrated, HydrateError> {
        let section = extract_section(document, &self.extract_for(container), source_path)?;
        let mut hydrated = Hydrated::from_section(section);
        self.hook.apply(container, &mut hydrated)?;
        Ok(hydrated)
    }
}

fn non_empty_attr<'a>(attrs: &'a Attrs, key: &str) -> Option<&'a str> {
    attrs
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

// =============================================================================
// HYDRATOR
// =============================================================================

/// Per-container plan between the scan and rewrite passes.
#[derive(Debug)]
enum Step {
    /// Already hydrated.
    Skip,
    /// Resolved source path, or why it could not be resolved.
    Fetch(Result<String, FetchError>),
}

#[derive(Debug)]
enum Action {
    Keep,
    Hydrate(Hydrated),
    Fail,
}

struct PageScan {
    /// The page with every container stamped with its slot.
    marked: String,
    containers: Vec<Vec<Attrs>>,
    /// Head script markers the page already carries.
    present_markers: HashSet<&'static str>,
}

/// Runs every registered loader over a page.
pub struct Hydrator {
    source: Arc<dyn SiteSource>,
    loaders: Vec<PartialLoader>,
}

impl Hydrator {
    #[must_use]
    pub fn new(source: Arc<dyn SiteSource>, loaders: Vec<PartialLoader>) -> Self {
        Self { source, loaders }
    }

    /// Header, footer, contact and projects loaders.
    #[must_use]
    pub fn standard(source: Arc<dyn SiteSource>, contact: contact::ContactOptions) -> Self {
        Self::new(
            source,
            vec![header::loader(), footer::loader(), contact::loader(contact), projects::loader()],
        )
    }

    /// Hydrate every container in `html`, a page served at `page_path`.
    ///
    /// Never fails: a page that cannot even be scanned is returned as is.
    pub async fn hydrate(&self, page_path: &str, html: &str) -> String {
        match self.try_hydrate(page_path, html).await {
            Ok(out) => out,
            Err(e) => {
                warn!(page = page_path, error = %e, "page hydration skipped");
                html.to_owned()
            }
        }
    }

    async fn try_hydrate(&self, page_path: &str, html: &str) -> Result<String, HydrateError> {
        let scan = self.scan(html)?;

        // Resolve every pending container, then fetch each distinct document once.
        let mut wanted: BTreeSet<String> = BTreeSet::new();
        let steps: Vec<Vec<Step>> = self
            .loaders
            .iter()
            .zip(&scan.containers)
            .map(|(loader, containers)| {
                containers
                    .iter()
                    .map(|attrs| {
                        if loader.is_hydrated(attrs) {
                            return Step::Skip;
                        }
                        let path = resolve_path(page_path, loader.source_for(attrs));
                        if let Ok(path) = &path {
                            wanted.insert(path.clone());
                        }
                        Step::Fetch(path)
                    })
                    .collect()
            })
            .collect();
        if steps.iter().flatten().all(|s| matches!(s, Step::Skip)) {
            return Ok(html.to_owned());
        }

        let fetches = wanted.iter().map(|path| async move { (path.clone(), self.source.fetch(path).await) });
        let documents: HashMap<String, Result<String, FetchError>> = join_all(fetches).await.into_iter().collect();

        let actions = self.plan(page_path, &scan, steps, &documents);
        let head_scripts = self.head_scripts(&scan, &actions);
        if actions.iter().flatten().all(|a| matches!(a, Action::Keep)) {
            return Ok(html.to_owned());
        }
        self.rewrite(&scan.marked, &actions, &head_scripts)
    }

    /// Scan pass: container attributes per loader plus head script markers.
    fn scan(&self, html: &str) -> Result<PageScan, HydrateError> {
        let selectors: Vec<&str> = self.loaders.iter().map(|l| l.containers).collect();
        let Marked { html: marked, found: containers } = mark_elements(html, &selectors)?;

        let markers: Vec<&'static str> = self
            .loaders
            .iter()
            .filter_map(|l| l.hook.head_script())
            .map(|s| s.marker)
            .collect();
        let mut present_markers = HashSet::new();
        if !markers.is_empty() {
            let marker_selectors: Vec<String> = markers.iter().map(|m| format!("script[{m}]")).collect();
            let marker_selectors: Vec<&str> = marker_selectors.iter().map(String::as_str).collect();
            let hits = scan_elements(html, &marker_selectors)?;
            present_markers.extend(
                markers
                    .into_iter()
                    .zip(hits)
                    .filter(|(_, hits)| !hits.is_empty())
                    .map(|(marker, _)| marker),
            );
        }

        Ok(PageScan { marked, containers, present_markers })
    }

    fn plan(
        &self,
        page_path: &str,
        scan: &PageScan,
        steps: Vec<Vec<Step>>,
        documents: &HashMap<String, Result<String, FetchError>>,
    ) -> Vec<Vec<Action>> {
        self.loaders
            .iter()
            .zip(&scan.containers)
            .zip(steps)
            .map(|((loader, containers), steps)| {
                containers
                    .iter()
                    .zip(steps)
                    .map(|(attrs, step)| {
                        let path = match step {
                            Step::Skip => return Action::Keep,
                            Step::Fetch(path) => path,
                        };
                        let outcome = path.map_err(HydrateError::from).and_then(|path| match documents.get(&path) {
                            Some(Ok(document)) => loader.hydrate_section(attrs, document, &path),
                            Some(Err(e)) => Err(e.clone().into()),
                            None => Err(FetchError::NotFound(path).into()),
                        });
                        match outcome {
                            Ok(hydrated) => {
                                debug!(partial = loader.name, page = page_path, "partial hydrated");
                                Action::Hydrate(hydrated)
                            }
                            Err(e) => {
                                warn!(partial = loader.name, page = page_path, error = %e, "failed to load partial");
                                Action::Fail
                            }
                        }
                    })
                    .collect()
            })
            .collect()
    }

    fn head_scripts(&self, scan: &PageScan, actions: &[Vec<Action>]) -> Vec<HeadScript> {
        let mut seen: HashSet<&'static str> = scan.present_markers.clone();
        self.loaders
            .iter()
            .zip(actions)
            .filter(|(_, actions)| actions.iter().any(|a| matches!(a, Action::Hydrate(_))))
            .filter_map(|(loader, _)| loader.hook.head_script())
            .filter(|script| seen.insert(script.marker))
            .collect()
    }

    /// Rewrite pass over the stamped page. Each container finds its plan by
    /// the slot the scan pass gave it, and the stamp is removed.
    fn rewrite(&self, marked: &str, actions: &[Vec<Action>], head_scripts: &[HeadScript]) -> Result<String, HydrateError> {
        let mut handlers = Vec::with_capacity(self.loaders.len() + 1);

        for (group, (loader, planned)) in self.loaders.iter().zip(actions).enumerate() {
            handlers.push(element!(loader.containers, move |el| {
                match take_slot(el, group).and_then(|slot| planned.get(slot)) {
                    Some(Action::Hydrate(hydrated)) => {
                        if let Some(class) = &hydrated.class {
                            el.set_attribute("class", class)?;
                        }
                        if let Some(id) = &hydrated.id {
                            el.set_attribute("id", id)?;
                        }
                        el.set_inner_content(&hydrated.html, ContentType::Html);
                        el.set_attribute(&loader.hydrated_attr, "true")?;
                    }
                    Some(Action::Fail) => {
                        if let Some(class) = loader.notice.container_class {
                            el.set_attribute("class", class)?;
                        }
                        el.set_inner_content(&loader.notice.render(), ContentType::Html);
                    }
                    Some(Action::Keep) | None => {}
                }
                Ok(())
            }));
        }

        if !head_scripts.is_empty() {
            let tags: String = head_scripts.iter().map(HeadScript::tag).collect();
            let injected = Cell::new(false);
            handlers.push(element!("head", move |el| {
                if !injected.replace(true) {
                    el.append(&tags, ContentType::Html);
                }
                Ok(())
            }));
        }

        Ok(rewrite_str(marked, RewriteStrSettings { element_content_handlers: handlers, ..RewriteStrSettings::new() })?)
    }
}

fn attrs_of(el: &Element<'_, '_>) -> Attrs {
    el.attributes()
        .iter()
        .map(|a| (a.name(), a.value()))
        .collect()
}

/// Collect the attributes of every element matching each selector, in
/// document order. Selectors must be valid `lol_html` selectors.
pub(crate) fn scan_elements(html: &str, selectors: &[&str]) -> Result<Vec<Vec<Attrs>>, HydrateError> {
    let sinks: Vec<RefCell<Vec<Attrs>>> = selectors.iter().map(|_| RefCell::new(Vec::new())).collect();
    let handlers = selectors
        .iter()
        .zip(&sinks)
        .map(|(selector, sink)| {
            element!(selector, move |el| {
                sink.borrow_mut().push(attrs_of(el));
                Ok(())
            })
        })
        .collect();

    rewrite_str(html, RewriteStrSettings { element_content_handlers: handlers, ..RewriteStrSettings::new() })?;
    Ok(sinks.into_iter().map(RefCell::into_inner).collect())
}

/// A page whose scanned elements carry their slot, plus what was found.
pub(crate) struct Marked {
    pub html: String,
    pub found: Vec<Vec<Attrs>>,
}

fn slot_attr(group: usize) -> String {
    format!("data-slot-{group}")
}

/// Like [`scan_elements`], but also stamps the n-th match of selector `g`
/// with `data-slot-<g>="<n>"`. The recorded attributes exclude the stamp.
///
/// A later rewrite reads the stamp back with [`take_slot`], so matches
/// inside content that rewrite replaces cannot shift the ones after them.
pub(crate) fn mark_elements(html: &str, selectors: &[&str]) -> Result<Marked, HydrateError> {
    let sinks: Vec<RefCell<Vec<Attrs>>> = selectors.iter().map(|_| RefCell::new(Vec::new())).collect();
    let handlers = selectors
        .iter()
        .zip(&sinks)
        .enumerate()
        .map(|(group, (selector, sink))| {
            let attr = slot_attr(group);
            element!(selector, move |el| {
                let attrs = attrs_of(el);
                let mut sink = sink.borrow_mut();
                el.set_attribute(&attr, &sink.len().to_string())?;
                sink.push(attrs);
                Ok(())
            })
        })
        .collect();

    let html = rewrite_str(html, RewriteStrSettings { element_content_handlers: handlers, ..RewriteStrSettings::new() })?;
    Ok(Marked { html, found: sinks.into_iter().map(RefCell::into_inner).collect() })
}

/// Remove the stamp [`mark_elements`] left for selector `group` and return
/// its slot.
pub(crate) fn take_slot(el: &mut Element<'_, '_>, group: usize) -> Option<usize> {
    let attr = slot_attr(group);
    let slot = el.get_attribute(&attr)?.parse().ok();
    el.remove_attribute(&attr);
    slot
}

/// Rewrite every element matching `selector` in an HTML fragment.
pub(crate) fn rewrite_elements<F>(html: &str, selector: &str, mut edit: F) -> Result<String, HydrateError>
where
    F: FnMut(&mut Element<'_, '_>) -> Result<(), HydrateError>,
{
    let handler = element!(selector, move |el| {
        edit(el).map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
    });
    Ok(rewrite_str(html, RewriteStrSettings { element_content_handlers: vec![handler], ..RewriteStrSettings::new() })?)
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

//! Blog list rendering from the post manifest.
//!
//! DESIGN
//! ======
//! Pages mark list targets with `data-blog-list`. When a page has targets,
//! the manifest each target points at is fetched once and every target's
//! content is replaced with either a linear list or a card grid. A manifest
//! that loads but has no posts renders the empty-state message; a manifest
//! that fails to load or parse renders the error message instead.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use futures::future::join_all;
use serde_json::Value;
use time::format_description::BorrowedFormatItem;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};
use tracing::{debug, warn};

use crate::markup::{html_escape, leading_uint};
use crate::partials::source::{FetchError, SiteSource, resolve_path};
use crate::partials::{Attrs, HydrateError, Marked, mark_elements, rewrite_elements, take_slot};

const TARGET_SELECTOR: &str = "[data-blog-list]";
const UNTITLED: &str = "Untitled Post";

pub const DEFAULT_EMPTY_MESSAGE: &str = "No posts yet. Please check back soon.";
pub const DEFAULT_ERROR_MESSAGE: &str = "Unable to load posts right now. Please try again later.";

const DATE_TIME: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
const DATE_ONLY: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");
const DISPLAY_DATE: &[BorrowedFormatItem<'static>] = format_description!("[month repr:short] [day padding:none], [year]");

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManifestError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("malformed manifest: {0}")]
    Json(String),
}

// =============================================================================
// POSTS
// =============================================================================

/// One manifest entry. Every field is optional; empty strings count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostRecord {
    pub title: Option<String>,
    pub date: Option<String>,
    pub url: Option<String>,
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    pub thumbnail: Option<String>,
    pub reading_time: Option<String>,
}

impl PostRecord {
    /// Lenient read of a manifest entry: strings are taken as is, numbers
    /// are stringified, anything else is ignored.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        let field = |key: &str| match value.get(key) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        Self {
            title: field("title"),
            date: field("date"),
            url: field("url"),
            slug: field("slug"),
            excerpt: field("excerpt"),
            thumbnail: field("thumbnail"),
            reading_time: field("readingTime"),
        }
    }

    /// Link target: explicit url, then the slug's page, then `#`.
    #[must_use]
    pub fn href(&self) -> String {
        match (&self.url, &self.slug) {
            (Some(url), _) => url.clone(),
            (None, Some(slug)) => format!("blog/{slug}.html"),
            (None, None) => "#".to_owned(),
        }
    }

    #[must_use]
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(UNTITLED)
    }

    /// Unix timestamp used for ordering. Missing and unparseable dates are
    /// the epoch.
    #[must_use]
    pub fn sort_key(&self) -> i64 {
        self.date
            .as_deref()
            .and_then(parse_date)
            .map_or(0, OffsetDateTime::unix_timestamp)
    }
}

fn parse_date(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(dt);
    }
    if let Ok(dt) = PrimitiveDateTime::parse(raw, DATE_TIME) {
        return Some(dt.assume_utc());
    }
    Date::parse(raw, DATE_ONLY)
        .ok()
        .map(|d| d.midnight().assume_utc())
}

/// `Jun 1, 2024`; unparseable dates are shown as written.
#[must_use]
pub fn format_date(raw: &str) -> String {
    parse_date(raw)
        .and_then(|dt| dt.format(DISPLAY_DATE).ok())
        .unwrap_or_else(|| raw.to_owned())
}

/// Parse a manifest and order its posts newest first. Ties keep manifest
/// order.
///
/// # Errors
///
/// Returns [`ManifestError::Json`] if the text is not JSON.
pub fn parse_manifest(text: &str) -> Result<Vec<PostRecord>, ManifestError> {
    let manifest: Value = serde_json::from_str(text).map_err(|e| ManifestError::Json(e.to_string()))?;
    let mut posts: Vec<PostRecord> = match manifest.get("posts") {
        Some(Value::Array(entries)) => entries.iter().map(PostRecord::from_value).collect(),
        _ => Vec::new(),
    };
    posts.sort_by_key(|p| std::cmp::Reverse(p.sort_key()));
    Ok(posts)
}

// =============================================================================
// RENDERING
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    #[default]
    List,
    Cards,
}

/// Per-target rendering options, read from the target's data attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOptions {
    /// At most this many posts; `None` renders all of them.
    pub limit: Option<usize>,
    pub layout: Layout,
    pub empty_message: String,
    pub error_message: String,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            limit: None,
            layout: Layout::List,
            empty_message: DEFAULT_EMPTY_MESSAGE.to_owned(),
            error_message: DEFAULT_ERROR_MESSAGE.to_owned(),
        }
    }
}

impl ListOptions {
    #[must_use]
    pub fn from_attrs(attrs: &Attrs) -> Self {
        let text = |key: &str, default: &str| {
            attrs
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
                .to_owned()
        };
        let limit = attrs
            .get("data-blog-limit")
            .map(|v| leading_uint(v))
            .filter(|n| *n > 0);
        let layout = match attrs.get("data-blog-layout") {
            Some(v) if v.trim().eq_ignore_ascii_case("cards") => Layout::Cards,
            _ => Layout::List,
        };
        Self {
            limit,
            layout,
            empty_message: text("data-blog-empty", DEFAULT_EMPTY_MESSAGE),
            error_message: text("data-blog-error", DEFAULT_ERROR_MESSAGE),
        }
    }
}

/// Render posts into a target's inner HTML.
#[must_use]
pub fn render_posts(posts: &[PostRecord], options: &ListOptions) -> String {
    let subset = match options.limit {
        Some(limit) => &posts[..posts.len().min(limit)],
        None => posts,
    };
    if subset.is_empty() {
        return format!(r#"<p class="blog-empty text-gray-500">{}</p>"#, html_escape(&options.empty_message));
    }
    match options.layout {
        Layout::List => render_list(subset),
        Layout::Cards => subset.iter().map(render_card).collect(),
    }
}

#[must_use]
pub fn render_error(options: &ListOptions) -> String {
    format!(r#"<p class="blog-error text-red-400">{}</p>"#, html_escape(&options.error_message))
}

fn time_tag(class: Option<&str>, date: Option<&str>) -> String {
    let class = class.map(|c| format!(r#" class="{c}""#)).unwrap_or_default();
    match date {
        Some(date) => format!(
            r#"<time{class} datetime="{}">{}</time>"#,
            html_escape(date),
            html_escape(&format_date(date))
        ),
        None => format!("<time{class}></time>"),
    }
}

fn render_list(posts: &[PostRecord]) -> String {
    let mut out = String::from(r#"<ul class="blog-list">"#);
    for post in posts {
        out.push_str(r#"<li class="blog-list-item">"#);
        out.push_str(&time_tag(Some("blog-list-date"), post.date.as_deref()));
        out.push_str(&format!(
            r#"<a class="blog-list-link" href="{}">{}</a>"#,
            html_escape(&post.href()),
            html_escape(post.title())
        ));
        out.push_str(r#"<span class="blog-list-arrow" aria-hidden="true">&gt;</span></li>"#);
    }
    out.push_str("</ul>");
    out
}

fn render_card(post: &PostRecord) -> String {
    let mut out = String::from(r#"<article class="post-card">"#);
    out.push_str(&format!(r#"<a href="{}" class="post-card-link""#, html_escape(&post.href())));
    if let Some(title) = &post.title {
        out.push_str(&format!(r#" aria-label="{}""#, html_escape(title)));
    }
    out.push('>');

    if let Some(thumb) = &post.thumbnail {
        let alt = post
            .title
            .as_ref()
            .map_or_else(|| "Blog post thumbnail".to_owned(), |t| format!("{t} thumbnail"));
        out.push_str(&format!(
            r#"<img class="post-thumb" src="{}" alt="{}" loading="lazy">"#,
            html_escape(thumb),
            html_escape(&alt)
        ));
    }

    out.push_str(&format!(r#"<div class="post-body"><h3 class="post-title">{}</h3>"#, html_escape(post.title())));
    if let Some(excerpt) = &post.excerpt {
        out.push_str(&format!(r#"<p class="post-excerpt">{}</p>"#, html_escape(excerpt)));
    }
    if post.date.is_some() || post.reading_time.is_some() {
        out.push_str(r#"<div class="post-meta">"#);
        if let Some(date) = &post.date {
            out.push_str(&time_tag(None, Some(date)));
        }
        if let Some(reading) = &post.reading_time {
            out.push_str(&format!("<span>{}</span>", html_escape(reading)));
        }
        out.push_str("</div>");
    }
    out.push_str("</div></a></article>");
    out
}

// =============================================================================
// RENDERER
// =============================================================================

/// Fills every blog list target of a page.
pub struct BlogRenderer {
    source: Arc<dyn SiteSource>,
    /// Site-root relative manifest used when a target names none.
    default_manifest: String,
}

impl BlogRenderer {
    #[must_use]
    pub fn new(source: Arc<dyn SiteSource>, default_manifest: &str) -> Self {
        Self { source, default_manifest: default_manifest.trim_start_matches('/').to_owned() }
    }

    fn manifest_for(&self, page_path: &str, attrs: &Attrs) -> Result<String, FetchError> {
        match attrs.get("data-blog-src").map(|v| v.trim()).filter(|v| !v.is_empty()) {
            Some(src) => resolve_path(page_path, src),
            None => Ok(self.default_manifest.clone()),
        }
    }

    async fn load(&self, path: &str) -> Result<Vec<PostRecord>, ManifestError> {
        let text = self.source.fetch(path).await?;
        parse_manifest(&text)
    }

    /// Render every `data-blog-list` target in `html`. Pages without targets
    /// are returned unchanged and cause no fetch.
    pub async fn render(&self, page_path: &str, html: &str) -> String {
        match self.try_render(page_path, html).await {
            Ok(out) => out,
            Err(e) => {
                warn!(page = page_path, error = %e, "blog rendering skipped");
                html.to_owned()
            }
        }
    }

    async fn try_render(&self, page_path: &str, html: &str) -> Result<String, HydrateError> {
        let Marked { html: marked, found } = mark_elements(html, &[TARGET_SELECTOR])?;
        let targets = found.into_iter().next().unwrap_or_default();
        if targets.is_empty() {
            return Ok(html.to_owned());
        }

        let manifests: Vec<Result<String, FetchError>> = targets
            .iter()
            .map(|attrs| self.manifest_for(page_path, attrs))
            .collect();
        let wanted: BTreeSet<&String> = manifests.iter().filter_map(|m| m.as_ref().ok()).collect();
        let loads = wanted.into_iter().map(|path| async move { (path.clone(), self.load(path).await) });
        let loaded: HashMap<String, Result<Vec<PostRecord>, ManifestError>> = join_all(loads).await.into_iter().collect();

        let rendered: Vec<String> = targets
            .iter()
            .zip(manifests)
            .map(|(attrs, manifest)| {
                let options = ListOptions::from_attrs(attrs);
                let posts = manifest
                    .map_err(ManifestError::from)
                    .and_then(|path| {
                        loaded
                            .get(&path)
                            .cloned()
                            .unwrap_or_else(|| Err(FetchError::NotFound(path).into()))
                    });
                match posts {
                    Ok(posts) => {
                        debug!(page = page_path, posts = posts.len(), "blog list rendered");
                        render_posts(&posts, &options)
                    }
                    Err(e) => {
                        warn!(page = page_path, error = %e, "failed to load blog manifest");
                        render_error(&options)
                    }
                }
            })
            .collect();

        rewrite_elements(&marked, TARGET_SELECTOR, |el| {
            if let Some(content) = take_slot(el, 0).and_then(|slot| rendered.get(slot)) {
                el.set_inner_content(content, lol_html::html_content::ContentType::Html);
            }
            Ok(())
        })
    }
}

#[cfg(test)]
#[path = "blog_test.rs"]
mod tests;

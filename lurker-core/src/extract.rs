// Element-to-result extraction and the crawler bindings that drive it

use crate::error::{CoreError, Result};
use crate::keywords::KeywordFilter;
use crate::output::OutputFormat;
use crate::patterns::extract_urls;
use crate::pipeline::ResultPipeline;
use futures::FutureExt;
use lurker_scanner::{Crawler, ElementCallback, MatchedElement};
use std::sync::Arc;
use tracing::debug;

/// A reference pulled from an element, labelled with where it was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Found {
    pub source: String,
    pub reference: String,
}

impl Found {
    fn new(source: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            reference: reference.into(),
        }
    }
}

/// Turns matched elements into output lines for one seed.
pub struct LinkExtractor {
    seed: String,
    format: OutputFormat,
    keywords: KeywordFilter,
    inside: bool,
    pipeline: Arc<ResultPipeline>,
}

impl LinkExtractor {
    pub fn new(seed: impl Into<String>, pipeline: Arc<ResultPipeline>) -> Self {
        Self {
            seed: seed.into(),
            format: OutputFormat::default(),
            keywords: KeywordFilter::default(),
            inside: false,
            pipeline,
        }
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_keywords(mut self, keywords: KeywordFilter) -> Self {
        self.keywords = keywords;
        self
    }

    /// Only follow and report anchors whose absolute URL contains the seed.
    pub fn with_inside(mut self, inside: bool) -> Self {
        self.inside = inside;
        self
    }

    pub fn seed(&self) -> &str {
        &self.seed
    }

    /// Report one reference found on `element`.
    ///
    /// The keyword filter is applied to the raw reference before anything is
    /// emitted, then again to the formatted line to decide whether it is
    /// written to the file. Returns the line handed to the pipeline.
    pub async fn emit(&self, raw: &str, source: &str, element: &MatchedElement) -> Option<String> {
        if !self.keywords.admits(raw) {
            debug!("[FILTERED] {} ({})", raw, source);
            return None;
        }

        let absolute = element.absolute_url(raw)?;
        let line = self
            .format
            .format(source, &absolute, element.page_url.as_str());
        let persist = self.keywords.admits(&line);

        match self.pipeline.submit(line.clone(), persist).await {
            Ok(()) => {}
            Err(CoreError::PipelineClosed) => debug!("Dropping late result {}", line),
            Err(e) => debug!("Failed to deliver {}: {}", line, e),
        }
        Some(line)
    }

    /// Emit everything found on one element and return the absolute URLs
    /// the crawler should visit next.
    pub async fn report(&self, found: Vec<Found>, element: &MatchedElement) -> Vec<String> {
        let mut visits = Vec::with_capacity(found.len());
        for item in found {
            self.emit(&item.reference, &item.source, element).await;
            if let Some(target) = element.absolute_url(&item.reference) {
                visits.push(target);
            }
        }
        visits
    }
}

type Collect = fn(&LinkExtractor, &MatchedElement) -> Vec<Found>;

/// A selector and the references it yields for each match.
pub struct Rule {
    pub selector: &'static str,
    collect: Collect,
    /// Whether matched elements need their descendant text.
    with_text: bool,
}

impl Rule {
    const fn new(selector: &'static str, collect: Collect) -> Self {
        Self {
            selector,
            collect,
            with_text: false,
        }
    }

    const fn text(selector: &'static str, collect: Collect) -> Self {
        Self {
            selector,
            collect,
            with_text: true,
        }
    }

    pub fn collect(&self, extractor: &LinkExtractor, element: &MatchedElement) -> Vec<Found> {
        (self.collect)(extractor, element)
    }
}

fn attr_as(source: &'static str, attr: &'static str, element: &MatchedElement) -> Vec<Found> {
    let value = element.attr(attr).trim();
    if value.is_empty() {
        Vec::new()
    } else {
        vec![Found::new(source, value)]
    }
}

/// A non-empty `href`, subject to the inside-path restriction.
fn scoped_href<'a>(extractor: &LinkExtractor, element: &'a MatchedElement) -> Option<&'a str> {
    let href = element.attr("href").trim();
    if href.is_empty() {
        return None;
    }
    if extractor.inside {
        let inside = element
            .absolute_url(href)
            .is_some_and(|absolute| absolute.contains(extractor.seed()));
        if !inside {
            return None;
        }
    }
    Some(href)
}

fn anchors(extractor: &LinkExtractor, element: &MatchedElement) -> Vec<Found> {
    scoped_href(extractor, element)
        .map(|href| vec![Found::new("href", href)])
        .unwrap_or_default()
}

fn text_urls(source: &'static str, element: &MatchedElement) -> Vec<Found> {
    extract_urls(&element.text)
        .into_iter()
        .map(|url| Found::new(source, url))
        .collect()
}

fn interactive(_: &LinkExtractor, element: &MatchedElement) -> Vec<Found> {
    let href = element.attr("href").trim();
    if href.starts_with("http://") || href.starts_with("https://") {
        vec![Found::new("interactive", href)]
    } else {
        Vec::new()
    }
}

/// Generic references on any element: `href`, `src`, data attributes and
/// meta content.
fn any_element(extractor: &LinkExtractor, element: &MatchedElement) -> Vec<Found> {
    let mut found = Vec::new();
    if let Some(href) = scoped_href(extractor, element) {
        found.push(Found::new("href", href));
    }
    found.extend(attr_as("src", "src", element));
    for (name, value) in element.attrs_with_prefix("data-") {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        found.push(Found::new("data", value));
        if name.starts_with("data-custom-") {
            found.push(Found::new("custom-data", value));
        }
    }
    if element.name == "meta" {
        found.extend(attr_as("meta", "content", element));
    }
    found
}

fn social_media(_: &LinkExtractor, element: &MatchedElement) -> Vec<Found> {
    let content = element.attr("content").trim();
    if content.is_empty() {
        return Vec::new();
    }
    let property = element.attr("property");
    let label = if property.is_empty() {
        element.attr("name")
    } else {
        property
    };
    if label.is_empty() {
        return Vec::new();
    }
    vec![Found::new(format!("social-media-{}", label), content)]
}

/// Every binding registered on a seed's crawler, in registration order.
pub const RULES: &[Rule] = &[
    Rule::new("a[href]", anchors),
    Rule::new("script[src]", |_, e| attr_as("script", "src", e)),
    Rule::new("form[action]", |_, e| attr_as("form", "action", e)),
    Rule::text("script", |_, e| text_urls("jscode", e)),
    Rule::new("link[rel=stylesheet]", |_, e| attr_as("css", "href", e)),
    Rule::new("[src], iframe, img", |_, e| attr_as("embedded", "src", e)),
    Rule::new("button[href], a[href], form[action], select", interactive),
    Rule::text("html", |_, e| text_urls("custom_REGEX", e)),
    Rule::new("*", any_element),
    Rule::new("video[src]", |_, e| attr_as("video", "src", e)),
    Rule::new("audio[src]", |_, e| attr_as("audio", "src", e)),
    Rule::new("embed[src]", |_, e| attr_as("embed", "src", e)),
    Rule::new("track[src]", |_, e| attr_as("track", "src", e)),
    Rule::new("area[href]", |_, e| attr_as("area", "href", e)),
    Rule::new("applet[archive]", |_, e| attr_as("applet", "archive", e)),
    Rule::new("base[href]", |_, e| attr_as("base", "href", e)),
    Rule::new("bgsound[src]", |_, e| attr_as("bgsound", "src", e)),
    Rule::new("body[background]", |_, e| attr_as("body-background", "background", e)),
    Rule::new(
        "link[type='application/rss+xml'], link[type='application/atom+xml'], link[type='application/xml']",
        |_, e| attr_as("feed", "href", e),
    ),
    Rule::new("img[src*='.webp']", |_, e| attr_as("webp-image", "src", e)),
    Rule::new("link[rel='manifest']", |_, e| attr_as("manifest", "href", e)),
    Rule::new("meta[property^='og:'], meta[name^='twitter:']", social_media),
    Rule::new("a[href$='.xml']", |_, e| attr_as("sitemap", "href", e)),
    Rule::new("*[src^='data:']", |_, e| attr_as("data-uri", "src", e)),
    Rule::new("script[src^='ws://'], script[src^='wss://']", |_, e| {
        attr_as("websocket", "src", e)
    }),
    Rule::new("frame[src], frameset[frameborder='1']", |_, e| attr_as("frame", "src", e)),
];

/// Bind every rule in [`RULES`] to `crawler`, reporting through `extractor`.
pub fn register_bindings(mut crawler: Crawler, extractor: Arc<LinkExtractor>) -> Result<Crawler> {
    for rule in RULES {
        let extractor = extractor.clone();
        let collect = rule.collect;
        let with_text = rule.with_text;
        let callback: ElementCallback = Arc::new(move |element: MatchedElement| {
            let extractor = extractor.clone();
            async move {
                let found = collect(&extractor, &element);
                extractor.report(found, &element).await
            }
            .boxed()
        });
        crawler = if with_text {
            crawler.on_html_with_text(rule.selector, callback)?
        } else {
            crawler.on_html(rule.selector, callback)?
        };
    }
    Ok(crawler)
}

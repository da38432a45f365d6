use crate::element::MatchedElement;
use crate::error::{Result, ScanError};
use crate::scope::Scope;
use futures::future::BoxFuture;
use reqwest::{Client, Response};
use scraper::{Html, Selector};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

/// Invoked once per matched element. Resolves to the URLs the handler wants
/// visited next; the crawler applies depth and scope rules to them.
pub type ElementCallback =
    Arc<dyn Fn(MatchedElement) -> BoxFuture<'static, Vec<String>> + Send + Sync>;

type WorkQueues = Arc<Vec<Mutex<VecDeque<(String, usize)>>>>;

#[derive(Clone)]
struct Binding {
    selector: Selector,
    callback: ElementCallback,
    with_text: bool,
}

/// Summary of one traversal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStats {
    pub pages_fetched: usize,
    pub elements_matched: usize,
}

pub struct Crawler {
    client: Client,
    scope: Scope,
    visited: Arc<Mutex<HashSet<String>>>,
    bindings: Vec<Binding>,
    /// Zero means unlimited.
    max_depth: usize,
    max_body_size: Option<usize>,
}

impl Crawler {
    pub fn new(client: Client, scope: Scope) -> Self {
        Self {
            client,
            scope,
            visited: Arc::new(Mutex::new(HashSet::new())),
            bindings: Vec::new(),
            max_depth: 2,
            max_body_size: None,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_max_body_size(mut self, bytes: Option<usize>) -> Self {
        self.max_body_size = bytes;
        self
    }

    /// Bind a callback to every element matching `selector`.
    ///
    /// Bindings run in registration order for each page.
    pub fn on_html(self, selector: &str, callback: ElementCallback) -> Result<Self> {
        self.bind(selector, callback, false)
    }

    /// Like [`Crawler::on_html`], but matched elements carry their
    /// descendant text.
    pub fn on_html_with_text(self, selector: &str, callback: ElementCallback) -> Result<Self> {
        self.bind(selector, callback, true)
    }

    fn bind(mut self, selector: &str, callback: ElementCallback, with_text: bool) -> Result<Self> {
        let selector = Selector::parse(selector)
            .map_err(|_| ScanError::InvalidSelector(selector.to_string()))?;
        self.bindings.push(Binding {
            selector,
            callback,
            with_text,
        });
        Ok(self)
    }

    pub async fn crawl(&self, start_url: &str, workers: usize) -> Result<CrawlStats> {
        let workers = workers.max(1);
        info!("Starting crawl of {} with {} workers", start_url, workers);

        let parsed_url = Url::parse(start_url)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", start_url, e)))?;

        {
            let mut visited = self.visited.lock().await;
            visited.insert(parsed_url.to_string());
        }

        let worker_queues: WorkQueues =
            Arc::new((0..workers).map(|_| Mutex::new(VecDeque::new())).collect());
        worker_queues[0]
            .lock()
            .await
            .push_back((parsed_url.to_string(), 0));

        // Queued plus in-progress items; workers leave once this reaches zero.
        let pending = Arc::new(AtomicUsize::new(1));
        let pages_fetched = Arc::new(AtomicUsize::new(0));
        let elements_matched = Arc::new(AtomicUsize::new(0));

        let bindings = Arc::new(self.bindings.clone());
        let mut worker_handles = Vec::new();

        for worker_id in 0..workers {
            let client = self.client.clone();
            let scope = self.scope.clone();
            let bindings = bindings.clone();
            let visited = self.visited.clone();
            let queues = worker_queues.clone();
            let pending = pending.clone();
            let pages_fetched = pages_fetched.clone();
            let elements_matched = elements_matched.clone();
            let max_depth = self.max_depth;
            let max_body_size = self.max_body_size;

            let handle = tokio::spawn(async move {
                debug!("Worker {} started", worker_id);
                let mut target_worker = worker_id;

                loop {
                    let Some((url, depth)) = Self::next_work(&queues, worker_id).await else {
                        if pending.load(Ordering::SeqCst) == 0 {
                            break;
                        }
                        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
                        continue;
                    };

                    let mut requested = Vec::new();
                    match Self::fetch_and_match(&client, &url, &bindings, max_body_size).await {
                        Ok(matches) => {
                            pages_fetched.fetch_add(1, Ordering::Relaxed);
                            elements_matched.fetch_add(matches.len(), Ordering::Relaxed);
                            for (index, element) in matches {
                                let callback = bindings[index].callback.clone();
                                requested.extend(callback(element).await);
                            }
                        }
                        Err(e) => {
                            warn!("Crawl error for {}: {}", url, e);
                        }
                    }

                    let child_depth = depth + 1;
                    if max_depth == 0 || child_depth < max_depth {
                        for link in requested {
                            let Ok(parsed) = Url::parse(&link) else {
                                continue;
                            };
                            if !scope.allows(&parsed) {
                                continue;
                            }

                            let should_queue = visited.lock().await.insert(parsed.to_string());
                            if should_queue {
                                pending.fetch_add(1, Ordering::SeqCst);
                                debug!("[Worker {}] Queuing {} to worker {}", worker_id, parsed, target_worker);
                                queues[target_worker]
                                    .lock()
                                    .await
                                    .push_back((parsed.to_string(), child_depth));
                                target_worker = (target_worker + 1) % queues.len();
                            }
                        }
                    }

                    pending.fetch_sub(1, Ordering::SeqCst);
                }

                debug!("Worker {} finished", worker_id);
            });

            worker_handles.push(handle);
        }

        for handle in worker_handles {
            handle.await?;
        }

        let stats = CrawlStats {
            pages_fetched: pages_fetched.load(Ordering::Relaxed),
            elements_matched: elements_matched.load(Ordering::Relaxed),
        };
        info!(
            "Crawl of {} complete. Fetched {} pages, matched {} elements",
            start_url, stats.pages_fetched, stats.elements_matched
        );
        Ok(stats)
    }

    /// Pop from the worker's own queue, stealing from the back of another
    /// worker's queue when it is empty.
    async fn next_work(queues: &WorkQueues, worker_id: usize) -> Option<(String, usize)> {
        if let Some(item) = queues[worker_id].lock().await.pop_front() {
            return Some(item);
        }

        for offset in 1..queues.len() {
            let victim = (worker_id + offset) % queues.len();
            if let Some(item) = queues[victim].lock().await.pop_back() {
                debug!("Worker {} stole work from worker {}", worker_id, victim);
                return Some(item);
            }
        }
        None
    }

    async fn fetch_and_match(
        client: &Client,
        url: &str,
        bindings: &[Binding],
        max_body_size: Option<usize>,
    ) -> Result<Vec<(usize, MatchedElement)>> {
        debug!("Fetching {}", url);

        let response = client.get(url).send().await?;
        let status_code = response.status().as_u16();
        let page_url = response.url().clone();
        let is_html = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("html"))
            .unwrap_or(false);

        if status_code >= 400 || !is_html {
            debug!("Not parsing {} (status {}, html: {})", url, status_code, is_html);
            return Ok(Vec::new());
        }

        let body = Self::read_body(response, max_body_size).await?;
        Ok(Self::match_elements(&body, &page_url, bindings))
    }

    async fn read_body(mut response: Response, limit: Option<usize>) -> Result<String> {
        let mut buf = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            buf.extend_from_slice(&chunk);
            if let Some(limit) = limit
                && buf.len() >= limit
            {
                buf.truncate(limit);
                break;
            }
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    fn match_elements(
        html: &str,
        page_url: &Url,
        bindings: &[Binding],
    ) -> Vec<(usize, MatchedElement)> {
        let document = Html::parse_document(html);
        let base_url = Self::document_base(&document, page_url);

        let mut matched = Vec::new();
        for (index, binding) in bindings.iter().enumerate() {
            for element in document.select(&binding.selector) {
                matched.push((
                    index,
                    MatchedElement::from_element(element, page_url, &base_url, binding.with_text),
                ));
            }
        }
        matched
    }

    fn document_base(document: &Html, page_url: &Url) -> Url {
        let Ok(base_selector) = Selector::parse("base[href]") else {
            return page_url.clone();
        };
        document
            .select(&base_selector)
            .next()
            .and_then(|base| base.value().attr("href"))
            .and_then(|href| page_url.join(href).ok())
            .unwrap_or_else(|| page_url.clone())
    }

    pub async fn get_visited_count(&self) -> usize {
        self.visited.lock().await.len()
    }
}

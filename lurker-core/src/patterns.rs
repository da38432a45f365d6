use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Scheme-qualified URL literals, as found in inline scripts and page text.
static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)(?:(?:https?|ftp|smtp|unknown|sftp|file|data|telnet|ssh|ws|wss|git|svn|gopher)://)(?:(?:[^\s:@'"]+(?::[^\s:@'"]*)?@)?(?:[_A-Z0-9.-]+|\[[_A-F0-9]*:[_A-F0-9:]+\])(?::\d{1,5})?)(?:/[^\s'"]*)?(?:\?[^\s'"]*)?(?:#[^\s'"]*)?"#,
    )
    .expect("URL pattern is valid")
});

/// Every distinct URL literal in `text`, in first-seen order.
pub fn extract_urls(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    URL_PATTERN
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|url| seen.insert(*url))
        .map(str::to_string)
        .collect()
}

use scraper::ElementRef;
use url::Url;

/// An element that matched one of the crawler's selectors, detached from the
/// parsed document so it can cross an await point.
#[derive(Debug, Clone)]
pub struct MatchedElement {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    /// Descendant text. Empty unless the binding asked for it.
    pub text: String,
    /// The page the element was found on.
    pub page_url: Url,
    /// `<base href>` of the page when present, otherwise the page itself.
    pub base_url: Url,
}

impl MatchedElement {
    pub(crate) fn from_element(
        element: ElementRef<'_>,
        page_url: &Url,
        base_url: &Url,
        with_text: bool,
    ) -> Self {
        let value = element.value();
        Self {
            name: value.name().to_string(),
            attrs: value
                .attrs()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            text: if with_text {
                element.text().collect()
            } else {
                String::new()
            },
            page_url: page_url.clone(),
            base_url: base_url.clone(),
        }
    }

    /// Attribute value, or an empty string when the attribute is absent.
    pub fn attr(&self, name: &str) -> &str {
        self.attrs
            .iter()
            .find(|(attr, _)| attr == name)
            .map(|(_, value)| value.as_str())
            .unwrap_or("")
    }

    pub fn attrs_with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.attrs
            .iter()
            .filter(move |(name, _)| name.starts_with(prefix))
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Resolve a reference found on this element against the page base.
    ///
    /// Pure fragment references resolve to nothing and fragments are always
    /// stripped from the result.
    pub fn absolute_url(&self, reference: &str) -> Option<String> {
        if reference.starts_with('#') {
            return None;
        }

        let mut resolved = self.base_url.join(reference.trim()).ok()?;
        resolved.set_fragment(None);
        Some(resolved.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(page: &str, base: &str) -> MatchedElement {
        MatchedElement {
            name: "a".to_string(),
            attrs: vec![
                ("href".to_string(), "/admin/login".to_string()),
                ("data-endpoint".to_string(), "/api/v1".to_string()),
                ("data-custom-next".to_string(), "/next".to_string()),
            ],
            text: String::new(),
            page_url: Url::parse(page).unwrap(),
            base_url: Url::parse(base).unwrap(),
        }
    }

    #[test]
    fn test_attr_missing_is_empty() {
        let el = element("https://example.com/", "https://example.com/");
        assert_eq!(el.attr("href"), "/admin/login");
        assert_eq!(el.attr("src"), "");
    }

    #[test]
    fn test_attrs_with_prefix() {
        let el = element("https://example.com/", "https://example.com/");
        let data: Vec<_> = el.attrs_with_prefix("data-").map(|(n, _)| n).collect();
        assert_eq!(data, vec!["data-endpoint", "data-custom-next"]);
    }

    #[test]
    fn test_absolute_url_relative() {
        let el = element("https://example.com/docs/index.html", "https://example.com/docs/index.html");
        assert_eq!(
            el.absolute_url("guide.html#intro"),
            Some("https://example.com/docs/guide.html".to_string())
        );
    }

    #[test]
    fn test_absolute_url_uses_base_href() {
        let el = element("https://example.com/docs/", "https://cdn.example.com/assets/");
        assert_eq!(
            el.absolute_url("app.js"),
            Some("https://cdn.example.com/assets/app.js".to_string())
        );
    }

    #[test]
    fn test_absolute_url_fragment_only() {
        let el = element("https://example.com/", "https://example.com/");
        assert_eq!(el.absolute_url("#top"), None);
    }

    #[test]
    fn test_absolute_url_keeps_foreign_scheme() {
        let el = element("https://example.com/", "https://example.com/");
        assert_eq!(
            el.absolute_url("wss://example.com/socket"),
            Some("wss://example.com/socket".to_string())
        );
    }
}

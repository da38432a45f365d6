use serde::{Deserialize, Serialize};

/// Single-line JSON shape of one discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "Source")]
    pub source: String,
    #[serde(rename = "URL")]
    pub url: String,
    /// Origin page, empty unless origins are shown.
    #[serde(rename = "Where")]
    pub where_: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputFormat {
    pub json: bool,
    pub show_source: bool,
    pub show_where: bool,
}

impl OutputFormat {
    /// Render a resolved URL into its output line.
    ///
    /// JSON mode takes precedence over the source prefix. The origin prefix
    /// only applies to plain lines; in JSON it fills the `Where` field.
    pub fn format(&self, source: &str, url: &str, page: &str) -> String {
        if self.json {
            let record = Record {
                source: source.to_string(),
                url: url.to_string(),
                where_: if self.show_where {
                    page.to_string()
                } else {
                    String::new()
                },
            };
            return serde_json::to_string(&record).unwrap_or_else(|_| url.to_string());
        }

        let mut line = if self.show_source {
            format!("[{}] {}", source, url)
        } else {
            url.to_string()
        };

        if self.show_where {
            line = format!("[{}] {}", page, line);
        }

        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_output() {
        let format = OutputFormat::default();
        assert_eq!(
            format.format("href", "https://example.com/a", "https://example.com/"),
            "https://example.com/a"
        );
    }

    #[test]
    fn test_source_and_where_prefixes() {
        let format = OutputFormat {
            json: false,
            show_source: true,
            show_where: true,
        };
        assert_eq!(
            format.format("script", "https://example.com/app.js", "https://example.com/"),
            "[https://example.com/] [script] https://example.com/app.js"
        );
    }

    #[test]
    fn test_json_record_deserializes() {
        let format = OutputFormat {
            json: true,
            show_source: false,
            show_where: true,
        };
        let line = format.format("href", "https://example.com/a", "https://example.com/");
        assert!(!line.contains('\n'));

        let record: Record = serde_json::from_str(&line).unwrap();
        assert_eq!(
            record,
            Record {
                source: "href".to_string(),
                url: "https://example.com/a".to_string(),
                where_: "https://example.com/".to_string(),
            }
        );
    }

    #[test]
    fn test_json_hides_where_unless_requested() {
        let format = OutputFormat {
            json: true,
            show_source: true,
            show_where: false,
        };
        let line = format.format("form", "https://example.com/login", "https://example.com/");
        assert_eq!(
            line,
            r#"{"Source":"form","URL":"https://example.com/login","Where":""}"#
        );
    }
}

use crate::error::{CoreError, Result};
use std::fs;
use std::path::Path;

/// Ordered keyword list. Empty admits everything.
#[derive(Debug, Clone, Default)]
pub struct KeywordFilter {
    keywords: Vec<String>,
}

impl KeywordFilter {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(Into::into)
                .filter(|k: &String| !k.is_empty())
                .collect(),
        }
    }

    /// Load one keyword per line. Blank lines are ignored.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| CoreError::KeywordFile {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self::new(content.lines().map(|line| line.trim_end_matches('\r'))))
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    /// Case-sensitive substring match against any keyword.
    pub fn admits(&self, candidate: &str) -> bool {
        self.keywords.is_empty() || self.keywords.iter().any(|k| candidate.contains(k.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_filter_admits_all() {
        let filter = KeywordFilter::default();
        assert!(filter.is_empty());
        assert!(filter.admits("/anything"));
    }

    #[test]
    fn test_any_keyword_matches() {
        let filter = KeywordFilter::new(["admin", "api"]);
        assert!(filter.admits("/admin/login"));
        assert!(filter.admits("https://example.com/api/v1"));
        assert!(!filter.admits("/public/home"));
    }

    #[test]
    fn test_match_is_case_sensitive() {
        let filter = KeywordFilter::new(["Admin"]);
        assert!(!filter.admits("/admin"));
        assert!(filter.admits("/Admin"));
    }

    #[test]
    fn test_load_skips_blank_lines() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "admin")?;
        writeln!(file)?;
        write!(file, "token\r\n")?;

        let filter = KeywordFilter::load(file.path())?;
        assert_eq!(filter.len(), 2);
        assert!(filter.admits("?token=1"));
        assert!(!filter.admits("/index.html"));
        Ok(())
    }

    #[test]
    fn test_load_missing_file_fails() {
        let result = KeywordFilter::load(Path::new("/definitely/not/here.txt"));
        assert!(matches!(result, Err(CoreError::KeywordFile { .. })));
    }

    #[test]
    fn test_load_non_utf8_fails() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0xff, 0xfe, 0x00, 0x80]).unwrap();
        assert!(KeywordFilter::load(file.path()).is_err());
    }
}

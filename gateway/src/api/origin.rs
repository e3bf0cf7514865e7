use std::sync::Arc;

/// Allow-list of origins, matched by substring containment.
///
/// An `Origin` header is accepted when it contains any configured entry, so
/// `http://localhost:5173/path` passes for `http://localhost:5173`. A missing
/// header is always rejected.
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    allowed: Arc<[String]>,
}

impl OriginPolicy {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed
                .into_iter()
                .map(Into::into)
                .filter(|o: &String| !o.is_empty())
                .collect(),
        }
    }

    pub fn accepts(&self, origin: Option<&str>) -> bool {
        match origin {
            Some(origin) => self.allowed.iter().any(|allowed| origin.contains(allowed.as_str())),
            None => false,
        }
    }

    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_ALLOWED_ORIGINS;

    fn policy() -> OriginPolicy {
        OriginPolicy::new(DEFAULT_ALLOWED_ORIGINS.iter().copied())
    }

    #[test]
    fn test_substring_match_accepts_paths() {
        assert!(policy().accepts(Some("http://localhost:5173/path")));
        assert!(policy().accepts(Some("http://127.0.0.1:3000")));
    }

    #[test]
    fn test_rejects_unknown_and_missing() {
        assert!(!policy().accepts(Some("http://evil.com")));
        assert!(!policy().accepts(Some("")));
        assert!(!policy().accepts(None));
    }

    #[test]
    fn test_empty_entries_ignored() {
        let policy = OriginPolicy::new(["", "http://app.local"]);
        assert_eq!(policy.allowed().len(), 1);
        assert!(!policy.accepts(Some("http://evil.com")));
    }
}

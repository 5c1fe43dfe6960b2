/// Maximum number of recently used model files remembered
pub const MAX_LAST_FILES: usize = 4;

/// Most-recently-used file list, oldest first.
///
/// Re-adding a path moves it to the end; the oldest entries are dropped once
/// the list grows past [`MAX_LAST_FILES`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LastFiles {
    entries: Vec<String>,
}

impl LastFiles {
    /// Build from a persisted list, applying the same dedupe/limit rules
    pub fn from_persisted(paths: &[String]) -> Self {
        let mut files = Self::default();
        for path in paths {
            files.push(path.clone());
        }
        files
    }

    pub fn push(&mut self, path: impl Into<String>) {
        let path = path.into();
        self.entries.retain(|p| *p != path);
        self.entries.push(path);

        if self.entries.len() > MAX_LAST_FILES {
            let excess = self.entries.len() - MAX_LAST_FILES;
            self.entries.drain(..excess);
        }
    }

    pub fn latest(&self) -> Option<&str> {
        self.entries.last().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_readding_moves_to_end() {
        let mut files = LastFiles::default();
        files.push("/a");
        files.push("/b");
        files.push("/a");

        assert_eq!(files.as_slice(), ["/b".to_string(), "/a".to_string()]);
        assert_eq!(files.latest(), Some("/a"));
    }

    #[test]
    fn test_oldest_entries_dropped() {
        let mut files = LastFiles::default();
        for path in ["/1", "/2", "/3", "/4", "/5"] {
            files.push(path);
        }

        assert_eq!(files.len(), MAX_LAST_FILES);
        assert_eq!(files.as_slice()[0], "/2");
        assert_eq!(files.latest(), Some("/5"));
    }

    #[test]
    fn test_from_persisted_cleans_up_duplicates() {
        let stored = vec!["/x".to_string(), "/y".to_string(), "/x".to_string()];
        let files = LastFiles::from_persisted(&stored);
        assert_eq!(files.as_slice(), ["/y".to_string(), "/x".to_string()]);
    }

    proptest! {
        #[test]
        fn test_list_invariants_hold(paths in prop::collection::vec("/[a-f]{1,2}", 0..30)) {
            let mut files = LastFiles::default();
            for path in &paths {
                files.push(path.clone());

                // Property: bounded, unique, and the newest entry is last
                prop_assert!(files.len() <= MAX_LAST_FILES);
                let mut unique = files.as_slice().to_vec();
                unique.sort();
                unique.dedup();
                prop_assert_eq!(unique.len(), files.len());
                prop_assert_eq!(files.latest(), Some(path.as_str()));
            }
        }
    }
}

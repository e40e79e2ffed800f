use rustc_hash::FxHashMap;

use super::types::TermId;

/// String <-> term id mapping consumed by the index.
///
/// Ids are dense and never reused; `None` plays the role of an invalid id.
pub trait Dictionary: Send + Sync {
    fn insert_term(&mut self, text: &str) -> Option<TermId>;
    fn get_term_id(&self, text: &str) -> Option<TermId>;
    fn size(&self) -> usize;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermDictionary {
    ids: FxHashMap<String, TermId>,
    terms: Vec<String>,
    max_terms: Option<usize>,
}

impl TermDictionary {
    pub fn new(max_terms: Option<usize>) -> Self {
        Self {
            ids: FxHashMap::default(),
            terms: Vec::new(),
            max_terms,
        }
    }

    pub fn max_terms(&self) -> Option<usize> {
        self.max_terms
    }

    pub fn term_text(&self, term: TermId) -> Option<&str> {
        self.terms.get(*term as usize).map(String::as_str)
    }

    /// Terms in id order.
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Rebuilds a dictionary from its terms in id order; `None` if a term
    /// appears twice.
    pub(crate) fn from_terms(terms: Vec<String>, max_terms: Option<usize>) -> Option<Self> {
        let mut ids = FxHashMap::default();
        ids.reserve(terms.len());
        for (id, term) in terms.iter().enumerate() {
            if ids.insert(term.clone(), TermId(id as u32)).is_some() {
                return None;
            }
        }
        Some(Self {
            ids,
            terms,
            max_terms,
        })
    }
}

impl Dictionary for TermDictionary {
    fn insert_term(&mut self, text: &str) -> Option<TermId> {
        if let Some(&id) = self.ids.get(text) {
            return Some(id);
        }
        if self.max_terms.is_some_and(|max| self.terms.len() >= max)
            || self.terms.len() >= u32::MAX as usize
        {
            return None;
        }
        let id = TermId(self.terms.len() as u32);
        self.terms.push(text.to_owned());
        self.ids.insert(text.to_owned(), id);
        Some(id)
    }

    fn get_term_id(&self, text: &str) -> Option<TermId> {
        self.ids.get(text).copied()
    }

    fn size(&self) -> usize {
        self.terms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_dense_and_stable() {
        let mut dict = TermDictionary::new(None);
        assert_eq!(dict.insert_term("a"), Some(TermId(0)));
        assert_eq!(dict.insert_term("b"), Some(TermId(1)));
        assert_eq!(dict.insert_term("a"), Some(TermId(0)));
        assert_eq!(dict.get_term_id("b"), Some(TermId(1)));
        assert_eq!(dict.get_term_id("c"), None);
        assert_eq!(dict.term_text(TermId(1)), Some("b"));
        assert_eq!(dict.size(), 2);
    }

    #[test]
    fn test_capacity_limit() {
        let mut dict = TermDictionary::new(Some(1));
        assert!(dict.insert_term("a").is_some());
        assert_eq!(dict.insert_term("b"), None);
        assert_eq!(dict.insert_term("a"), Some(TermId(0)));
    }

    #[test]
    fn test_from_terms_rejects_duplicates() {
        assert!(TermDictionary::from_terms(vec!["x".into(), "x".into()], None).is_none());
        let dict = TermDictionary::from_terms(vec!["x".into(), "y".into()], None).unwrap();
        assert_eq!(dict.get_term_id("y"), Some(TermId(1)));
    }
}

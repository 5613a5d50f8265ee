/// Ordered set of library identities that must resolve to the host's
/// already-loaded copy instead of a private copy inside a boundary.
///
/// Shared identities are what keep contract and model types identical across
/// the host/plugin divide. The set is fixed for a boundary's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SharedTypeSet {
    identities: Vec<String>,
}

impl SharedTypeSet {
    pub fn new(identities: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut out = Self::default();
        for identity in identities {
            out.insert(identity.into());
        }
        out
    }

    fn insert(&mut self, identity: String) {
        if !self.identities.iter().any(|existing| *existing == identity) {
            self.identities.push(identity);
        }
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.identities.iter().any(|existing| existing == identity)
    }

    pub fn identities(&self) -> &[String] {
        &self.identities
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deduplicates_and_keeps_insertion_order() {
        let set = SharedTypeSet::new(["b", "a", "b", "c", "a"]);
        assert_eq!(set.identities(), ["b", "a", "c"]);
        assert!(set.contains("a"));
        assert!(!set.contains("d"));
    }
}

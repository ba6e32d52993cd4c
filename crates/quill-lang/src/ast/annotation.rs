use super::node::ScopeId;
use crate::value::Name;
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;

/// What the generator needs to know about one scope boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeAnnotation {
    /// Something inside reads the ambient scope, so the boundary needs a real child scope.
    pub self_read: bool,
    /// Names bound inside the boundary (assignments and imports).
    pub mutations: BTreeSet<Name>,
}

/// Side table of boundary annotations keyed by [`ScopeId`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotations {
    scopes: FxHashMap<ScopeId, ScopeAnnotation>,
}

impl Annotations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: ScopeId) -> Option<&ScopeAnnotation> {
        self.scopes.get(&id)
    }

    pub fn entry(&mut self, id: ScopeId) -> &mut ScopeAnnotation {
        self.scopes.entry(id).or_default()
    }

    pub fn self_read(&self, id: ScopeId) -> bool {
        self.get(id).is_some_and(|a| a.self_read)
    }

    pub fn mutations(&self, id: ScopeId) -> impl Iterator<Item = &Name> {
        self.get(id).into_iter().flat_map(|a| a.mutations.iter())
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

// specialization.rs
//
// At most one checked instance per (symbol, type arguments) tuple.

use std::hash::Hash;

use cinder_identity::{ClassInstId, FuncInstId, FunctionSymbolId, StructureId};
use rustc_hash::FxHashMap;

use crate::types::Type;

/// State of one instantiation. `InProgress` is handed out on re-entry so
/// self-referential generics get a placeholder instead of recursing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEntry<V> {
    InProgress(V),
    Done(V),
}

impl<V: Copy> CacheEntry<V> {
    pub fn id(self) -> V {
        match self {
            CacheEntry::InProgress(id) | CacheEntry::Done(id) => id,
        }
    }

    pub fn is_in_progress(self) -> bool {
        matches!(self, CacheEntry::InProgress(_))
    }
}

/// Generic instantiation table with hit/miss counters.
#[derive(Debug, Clone)]
pub struct InstanceCache<K, V> {
    instances: FxHashMap<K, CacheEntry<V>>,
    hits: u64,
    misses: u64,
}

impl<K: Hash + Eq, V: Copy> Default for InstanceCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Hash + Eq, V: Copy> InstanceCache<K, V> {
    pub fn new() -> Self {
        Self {
            instances: FxHashMap::default(),
            hits: 0,
            misses: 0,
        }
    }

    /// Look up an instance, counting the hit or miss.
    pub fn lookup(&mut self, key: &K) -> Option<CacheEntry<V>> {
        let entry = self.instances.get(key).copied();
        if entry.is_some() {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        entry
    }

    /// Look up without touching the counters.
    pub fn get(&self, key: &K) -> Option<CacheEntry<V>> {
        self.instances.get(key).copied()
    }

    /// Reserve `key` before building the instance.
    pub fn begin(&mut self, key: K, id: V) {
        self.instances.insert(key, CacheEntry::InProgress(id));
    }

    pub fn finish(&mut self, key: K, id: V) {
        self.instances.insert(key, CacheEntry::Done(id));
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn instances(&self) -> impl Iterator<Item = (&K, &CacheEntry<V>)> {
        self.instances.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassKey {
    pub structure: StructureId,
    pub type_args: Vec<Type>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionKey {
    pub symbol: FunctionSymbolId,
    pub type_args: Vec<Type>,
    /// Owning class instance for methods, receiver type for extensions
    pub receiver: Option<Type>,
}

/// Every instantiation produced during one compilation.
#[derive(Debug, Clone, Default)]
pub struct SpecializationCache {
    pub classes: InstanceCache<ClassKey, ClassInstId>,
    pub functions: InstanceCache<FunctionKey, FuncInstId>,
}

impl SpecializationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checked instances of a class structure, one per type-argument tuple.
    pub fn class_instances(&self, structure: StructureId) -> Vec<(Vec<Type>, ClassInstId)> {
        let mut found: Vec<_> = self
            .classes
            .instances()
            .filter(|(key, _)| key.structure == structure)
            .map(|(key, entry)| (key.type_args.clone(), entry.id()))
            .collect();
        found.sort_by_key(|(_, id)| *id);
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_progress_entries_are_returned_on_reentry() {
        let mut cache: InstanceCache<ClassKey, ClassInstId> = InstanceCache::new();
        let key = ClassKey {
            structure: StructureId::new(3),
            type_args: vec![Type::I32],
        };
        assert_eq!(cache.lookup(&key), None);
        cache.begin(key.clone(), ClassInstId::new(0));
        let entry = cache.lookup(&key).unwrap();
        assert!(entry.is_in_progress());
        cache.finish(key.clone(), ClassInstId::new(0));
        assert_eq!(cache.lookup(&key), Some(CacheEntry::Done(ClassInstId::new(0))));
        assert_eq!(cache.hits(), 2);
        assert_eq!(cache.misses(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn distinct_tuples_are_distinct_keys() {
        let mut cache = SpecializationCache::new();
        let box_id = StructureId::new(0);
        for (i, arg) in [Type::I32, Type::I64].into_iter().enumerate() {
            let key = ClassKey {
                structure: box_id,
                type_args: vec![arg],
            };
            cache.classes.finish(key, ClassInstId::new(i as u32));
        }
        let instances = cache.class_instances(box_id);
        assert_eq!(instances.len(), 2);
        assert_eq!(instances[0], (vec![Type::I32], ClassInstId::new(0)));
    }
}

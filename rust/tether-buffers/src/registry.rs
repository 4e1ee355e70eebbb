//! The Ownership Registry: the root-set table that keeps an owner handle
//! reachable for as long as any view depends on it.
//!
//! There is one registry per registered element type. Keys are small non-zero
//! integers, reused after release. All views of one root owner share a single
//! key whose use count is incremented for every view constructed and
//! decremented for every view finalized; the entry (and with it the strong
//! reference to the owner) disappears when the count reaches zero.

use std::num::NonZeroU32;

use ahash::AHashMap;
use tether_common::{Result, error::Error};

use crate::heap::HandleId;

/// A key into an [`OwnershipRegistry`], stored in a view's descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistryKey(NonZeroU32);

impl RegistryKey {
    #[inline]
    pub fn get(&self) -> u32 {
        self.0.get()
    }

    #[inline]
    fn slot(&self) -> usize {
        (self.0.get() - 1) as usize
    }
}

/// Bookkeeping counters of one registry, or the sum over several.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    /// Number of `register` and `retain` calls, one per constructed view.
    pub increments: u64,
    /// Number of `release` calls, one per finalized view.
    pub releases: u64,
    /// Keys currently holding an owner alive.
    pub live_keys: usize,
}

impl RegistryStats {
    /// Every increment has been matched by a release and no key is left.
    pub fn is_balanced(&self) -> bool {
        self.increments == self.releases && self.live_keys == 0
    }
}

impl std::ops::Add for RegistryStats {
    type Output = RegistryStats;

    fn add(self, rhs: RegistryStats) -> RegistryStats {
        RegistryStats {
            increments: self.increments + rhs.increments,
            releases: self.releases + rhs.releases,
            live_keys: self.live_keys + rhs.live_keys,
        }
    }
}

#[derive(Debug)]
struct Entry {
    owner: HandleId,
    uses: usize,
}

#[derive(Debug, Default)]
pub struct OwnershipRegistry {
    entries: Vec<Option<Entry>>,
    free: Vec<usize>,
    by_owner: AHashMap<HandleId, RegistryKey>,
    increments: u64,
    releases: u64,
}

impl OwnershipRegistry {
    pub fn new() -> OwnershipRegistry {
        Default::default()
    }

    /// Inserts a strong reference to `owner`, or adds a use to the existing one.
    ///
    /// Returns the key to store in the dependent view.
    pub fn register(&mut self, owner: HandleId) -> Result<RegistryKey> {
        if let Some(&key) = self.by_owner.get(&owner) {
            self.retain(key)?;
            return Ok(key);
        }

        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                self.entries.push(None);
                self.entries.len() - 1
            }
        };
        let key = u32::try_from(slot + 1)
            .ok()
            .and_then(NonZeroU32::new)
            .map(RegistryKey)
            .ok_or_else(|| Error::invalid_operation("registry key space exhausted"))?;

        self.entries[slot] = Some(Entry { owner, uses: 1 });
        self.by_owner.insert(owner, key);
        self.increments += 1;
        log::trace!("registry: key {} now holds owner {owner}", key.get());
        Ok(key)
    }

    /// Adds a use to an existing key. This is the path taken when a view is
    /// built from another view: the new view shares the root owner's key.
    pub fn retain(&mut self, key: RegistryKey) -> Result<()> {
        let entry = self.entry_mut(key)?;
        entry.uses += 1;
        self.increments += 1;
        Ok(())
    }

    /// Drops one use of `key`. When the last use goes away the entry is erased
    /// and the former owner is returned; it is now collectible through ordinary
    /// tracing.
    pub fn release(&mut self, key: RegistryKey) -> Result<Option<HandleId>> {
        let entry = self.entry_mut(key)?;
        entry.uses -= 1;
        let remaining = entry.uses;
        let owner = entry.owner;
        self.releases += 1;
        if remaining != 0 {
            return Ok(None);
        }

        self.entries[key.slot()] = None;
        self.free.push(key.slot());
        self.by_owner.remove(&owner);
        log::trace!("registry: key {} released owner {owner}", key.get());
        Ok(Some(owner))
    }

    /// Returns the owner currently held by `key`.
    pub fn owner(&self, key: RegistryKey) -> Option<HandleId> {
        self.entry(key).map(|e| e.owner)
    }

    /// Returns the number of views currently sharing `key`.
    pub fn uses(&self, key: RegistryKey) -> usize {
        self.entry(key).map_or(0, |e| e.uses)
    }

    /// Returns the key currently holding `owner`, if any.
    pub fn key_of(&self, owner: HandleId) -> Option<RegistryKey> {
        self.by_owner.get(&owner).copied()
    }

    /// All owners kept alive by this registry; part of the collector's root set.
    pub fn owners(&self) -> impl Iterator<Item = HandleId> + '_ {
        self.entries.iter().flatten().map(|e| e.owner)
    }

    /// Exchanges the targets of the entries that hold `a` and `b`.
    ///
    /// Used when two handles swap descriptors: the key must keep naming the
    /// handle that now carries the owner memory.
    pub fn rebind_swapped(&mut self, a: HandleId, b: HandleId) {
        let key_a = self.by_owner.remove(&a);
        let key_b = self.by_owner.remove(&b);
        if let Some(key) = key_a {
            if let Some(Some(entry)) = self.entries.get_mut(key.slot()) {
                entry.owner = b;
            }
            self.by_owner.insert(b, key);
        }
        if let Some(key) = key_b {
            if let Some(Some(entry)) = self.entries.get_mut(key.slot()) {
                entry.owner = a;
            }
            self.by_owner.insert(a, key);
        }
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.by_owner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_owner.is_empty()
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            increments: self.increments,
            releases: self.releases,
            live_keys: self.len(),
        }
    }

    fn entry(&self, key: RegistryKey) -> Option<&Entry> {
        self.entries.get(key.slot()).and_then(Option::as_ref)
    }

    fn entry_mut(&mut self, key: RegistryKey) -> Result<&mut Entry> {
        self.entries
            .get_mut(key.slot())
            .and_then(Option::as_mut)
            .ok_or_else(|| Error::invalid_operation(format!("unknown registry key {}", key.get())))
    }
}

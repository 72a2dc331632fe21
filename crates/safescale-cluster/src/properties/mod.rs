//! Versioned property store of a cluster
//!
//! Each property key owns a [`LockedSlot`]: a read-write lock over the value
//! plus a generation counter bumped on every committed write. Readers work on
//! a deep clone taken under the shared lock; writers mutate a clone under the
//! exclusive lock and the clone replaces the stored value only when the
//! closure succeeds. Locks are per key, so updates touching several keys are
//! not atomic.
//!
//! ```
//! use safescale_cluster::properties::{NodesV1, Properties, Node};
//!
//! let props = Properties::new();
//! props.lock_for_write::<NodesV1>().then_use(|nodes| {
//!     nodes.masters.push(Node { name: "demo-master-1".into(), ..Node::default() });
//!     Ok(())
//! })?;
//! let count = props.lock_for_read::<NodesV1>().then_use(|nodes| Ok(nodes.masters.len()))?;
//! assert_eq!(count, 1);
//! # Ok::<(), safescale_utils::scerr::Error>(())
//! ```

mod v1;
mod v2;
mod value;

pub use v1::{
    CompositeV1, DefaultsV1, FeaturesV1, InstalledFeature, NetworkV1, Node, NodesV1, StateV1,
};
pub use v2::{DefaultsV2, NetworkV2};
pub use value::{Property, PropertyKey, PropertyValue};

use safescale_utils::scerr::{Error, Result, catch_panic};
use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

/// Read-write lock over an optional value, with a commit counter
#[derive(Debug)]
pub struct LockedSlot<T> {
    value: RwLock<Option<T>>,
    generation: AtomicU64,
}

impl<T> LockedSlot<T> {
    fn empty() -> Self {
        Self {
            value: RwLock::new(None),
            generation: AtomicU64::new(0),
        }
    }

    fn with_value(value: T) -> Self {
        Self {
            value: RwLock::new(Some(value)),
            generation: AtomicU64::new(1),
        }
    }

    /// Number of values committed to the slot
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<T>> {
        self.value.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<T>> {
        self.value.write().unwrap_or_else(PoisonError::into_inner)
    }
}

type Slot = Arc<LockedSlot<PropertyValue>>;

/// Property store of a cluster
#[derive(Debug, Default)]
pub struct Properties {
    slots: RwLock<HashMap<PropertyKey, Slot>>,
    /// Entries with tags this version does not know, kept verbatim
    opaque: RwLock<BTreeMap<String, serde_json::Value>>,
}

impl Properties {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: PropertyKey) -> Option<Slot> {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        slots.get(&key).cloned()
    }

    fn slot_or_insert(&self, key: PropertyKey) -> Slot {
        if let Some(slot) = self.slot(key) {
            return slot;
        }
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        slots
            .entry(key)
            .or_insert_with(|| Arc::new(LockedSlot::empty()))
            .clone()
    }

    /// Whether a value was ever committed under `key`
    pub fn lookup(&self, key: PropertyKey) -> bool {
        self.generation(key) > 0
    }

    /// Number of values committed under `key`
    pub fn generation(&self, key: PropertyKey) -> u64 {
        self.slot(key).map(|slot| slot.generation()).unwrap_or(0)
    }

    /// Shared access to property `P`
    pub fn lock_for_read<P: Property>(&self) -> ReadLock<'_, P> {
        ReadLock {
            properties: self,
            _marker: PhantomData,
        }
    }

    /// Exclusive access to property `P`
    pub fn lock_for_write<P: Property>(&self) -> WriteLock<'_, P> {
        WriteLock {
            properties: self,
            _marker: PhantomData,
        }
    }

    /// Snapshot of `P`, its default when absent
    pub fn get<P: Property>(&self) -> Result<P> {
        self.lock_for_read::<P>().then_use(|p| Ok(p.clone()))
    }

    /// Replace `P`
    pub fn set<P: Property>(&self, value: P) -> Result<()> {
        self.lock_for_write::<P>().then_use(move |p| {
            *p = value;
            Ok(())
        })
    }

    /// Default sizing, read from the newest schema present
    pub fn defaults(&self) -> Result<DefaultsV2> {
        if self.lookup(PropertyKey::DefaultsV2) {
            self.get::<DefaultsV2>()
        } else {
            Ok(self.get::<DefaultsV1>()?.into())
        }
    }

    /// Network configuration, read from the newest schema present
    pub fn network(&self) -> Result<NetworkV2> {
        if self.lookup(PropertyKey::NetworkV2) {
            self.get::<NetworkV2>()
        } else if self.lookup(PropertyKey::NetworkV1) {
            Ok(self.get::<NetworkV1>()?.into())
        } else {
            Err(Error::not_found("no network configuration stored"))
        }
    }

    /// Rewrite defaults V1 as V2; returns whether a migration happened
    pub fn upgrade_defaults(&self) -> Result<bool> {
        if self.lookup(PropertyKey::DefaultsV2) || !self.lookup(PropertyKey::DefaultsV1) {
            return Ok(false);
        }
        let v1 = self.get::<DefaultsV1>()?;
        debug!("Migrating {} to {}", DefaultsV1::KEY, DefaultsV2::KEY);
        self.set(DefaultsV2::from(v1))?;
        Ok(true)
    }

    /// Rewrite network V1 as V2; returns whether a migration happened
    pub fn upgrade_network(&self) -> Result<bool> {
        if self.lookup(PropertyKey::NetworkV2) || !self.lookup(PropertyKey::NetworkV1) {
            return Ok(false);
        }
        let v1 = self.get::<NetworkV1>()?;
        debug!("Migrating {} to {}", NetworkV1::KEY, NetworkV2::KEY);
        self.set(NetworkV2::from(v1))?;
        Ok(true)
    }

    /// Serialize every committed property, unknown tags included
    pub fn to_map(&self) -> Result<BTreeMap<String, serde_json::Value>> {
        let mut map = self
            .opaque
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for key in PropertyKey::ALL {
            if let Some(slot) = self.slot(key) {
                if let Some(value) = slot.read().as_ref() {
                    map.insert(key.tag().to_string(), value.to_json()?);
                }
            }
        }
        Ok(map)
    }

    /// Rebuild a store from persisted content
    pub fn from_map(map: BTreeMap<String, serde_json::Value>) -> Result<Self> {
        let mut slots = HashMap::new();
        let mut opaque = BTreeMap::new();
        for (tag, json) in map {
            match PropertyKey::from_tag(&tag) {
                Some(key) => {
                    let value = PropertyValue::from_json(key, json)
                        .map_err(|e| e.wrap(format!("failed to decode property '{}'", tag)))?;
                    slots.insert(key, Arc::new(LockedSlot::with_value(value)));
                }
                None => {
                    warn!("Keeping unknown property '{}' as is", tag);
                    opaque.insert(tag, json);
                }
            }
        }
        Ok(Self {
            slots: RwLock::new(slots),
            opaque: RwLock::new(opaque),
        })
    }
}

fn typed_clone<P: Property>(value: Option<&PropertyValue>) -> Result<P> {
    match value {
        None => Ok(P::default()),
        Some(value) => P::from_value(value).cloned().ok_or_else(|| {
            Error::inconsistent(format!(
                "slot {} holds a {} value",
                P::KEY,
                value.key()
            ))
        }),
    }
}

/// Pending shared access to a property
#[must_use = "the closure only runs through then_use"]
pub struct ReadLock<'a, P> {
    properties: &'a Properties,
    _marker: PhantomData<fn() -> P>,
}

impl<P: Property> ReadLock<'_, P> {
    /// Run `f` on a clone of the property, holding the shared lock
    ///
    /// An absent property reads as its default without being created.
    pub fn then_use<R>(self, f: impl FnOnce(&P) -> Result<R>) -> Result<R> {
        match self.properties.slot(P::KEY) {
            None => catch_panic(|| f(&P::default())),
            Some(slot) => {
                let guard = slot.read();
                let snapshot = typed_clone::<P>(guard.as_ref())?;
                let outcome = catch_panic(|| f(&snapshot));
                drop(guard);
                outcome
            }
        }
    }
}

/// Pending exclusive access to a property
#[must_use = "the closure only runs through then_use"]
pub struct WriteLock<'a, P> {
    properties: &'a Properties,
    _marker: PhantomData<fn() -> P>,
}

impl<P: Property> WriteLock<'_, P> {
    /// Run `f` on a clone of the property, holding the exclusive lock
    ///
    /// The clone replaces the stored value only if `f` returns `Ok`.
    pub fn then_use<R>(self, f: impl FnOnce(&mut P) -> Result<R>) -> Result<R> {
        let slot = self.properties.slot_or_insert(P::KEY);
        let mut guard = slot.write();
        let mut working = typed_clone::<P>(guard.as_ref())?;
        let outcome = catch_panic(|| f(&mut working))?;
        *guard = Some(working.into_value());
        slot.generation.fetch_add(1, Ordering::AcqRel);
        Ok(outcome)
    }
}

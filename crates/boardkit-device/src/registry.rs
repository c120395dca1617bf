// Copyright 2025 boardkit contributors
// SPDX-License-Identifier: Apache-2.0

//! Device registry: exclusive keys, shared parents, idempotent close.
//!
//! Every device lives in one arena keyed by its device key. A channel entry
//! names its parent; the parent entry carries the live-child count. A native
//! resource is released exactly once, when its entry leaves the arena:
//!
//! ```text
//!   provision_channel(ch0) ──► parent (implicit, children=1) ◄── ch0
//!   provision_channel(ch1) ──► parent (children=2)           ◄── ch1
//!   close(ch0)             ──► parent (children=1)
//!   close(ch1)             ──► parent (children=0, not owned) ──► release
//! ```

use std::any::Any;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ahash::AHashMap;
use boardkit_native::{BusHandle, NativeError};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::{DeviceError, Result};

/// Diagnostics kept by the registry; older entries are dropped first
pub const MAX_DIAGNOSTICS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Gpio,
    I2c,
    Spi,
    Channel,
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceKind::Gpio => write!(f, "GPIO"),
            DeviceKind::I2c => write!(f, "I2C"),
            DeviceKind::Spi => write!(f, "SPI"),
            DeviceKind::Channel => write!(f, "channel"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Open,
    Closed,
}

/// A logical device
///
/// `Open` until closed, then `Closed` for good; reusing the key creates a new
/// `Device`.
#[derive(Debug)]
pub struct Device {
    key: String,
    kind: DeviceKind,
    parent: Option<String>,
    open: AtomicBool,
}

impl Device {
    fn new(key: &str, kind: DeviceKind, parent: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            key: key.to_string(),
            kind,
            parent: parent.map(str::to_string),
            open: AtomicBool::new(true),
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn state(&self) -> DeviceState {
        if self.is_open() {
            DeviceState::Open
        } else {
            DeviceState::Closed
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn mark_closed(&self) {
        self.open.store(false, Ordering::Release);
    }

    /// Convert a native result; a backend that went away because this device
    /// was closed mid-call reports [`DeviceError::DeviceClosed`]
    pub(crate) fn native_result<T>(&self, result: std::result::Result<T, NativeError>) -> Result<T> {
        match result {
            Err(NativeError::AlreadyClosed(_) | NativeError::NotInitialised(_)) if !self.is_open() => {
                Err(DeviceError::DeviceClosed(self.key.clone()))
            }
            other => Ok(other?),
        }
    }
}

/// A native handle owned by a registry entry
pub trait NativeResource: Send + Sync + 'static {
    /// Release the native handle; called exactly once
    fn release(&self) -> std::result::Result<(), NativeError>;

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl NativeResource for BusHandle {
    fn release(&self) -> std::result::Result<(), NativeError> {
        self.close()
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// Close of a device that was already closed (or never provisioned)
    DoubleClose { key: String },
    /// Native release failed; the device was marked closed regardless
    CloseFailed { key: String, error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFailure {
    pub key: String,
    pub error: String,
}

/// Result of a close request; closing never fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Closed, and its native handle (if any) released
    Closed,
    /// Reported closed; native handle held until the last child closes
    Deferred,
    /// Already closed; recorded as [`Diagnostic::DoubleClose`]
    AlreadyClosed,
}

struct Entry {
    device: Arc<Device>,
    resource: Option<Arc<dyn NativeResource>>,
    children: usize,
    /// Held by a caller; false for parents created on behalf of a channel
    owned: bool,
}

#[derive(Default)]
struct Inner {
    entries: AHashMap<String, Entry>,
    diagnostics: VecDeque<Diagnostic>,
}

impl Inner {
    fn record(&mut self, diagnostic: Diagnostic) {
        if self.diagnostics.len() == MAX_DIAGNOSTICS {
            self.diagnostics.pop_front();
        }
        self.diagnostics.push_back(diagnostic);
    }

    fn double_close(&mut self, key: &str) -> CloseOutcome {
        warn!("[REGISTRY] Device {} already closed", key);
        self.record(Diagnostic::DoubleClose {
            key: key.to_string(),
        });
        CloseOutcome::AlreadyClosed
    }

    /// Mark `key` closed and remove every entry that is no longer needed,
    /// walking up the parent chain
    fn close_entry(
        &mut self,
        key: &str,
        releases: &mut Vec<(String, Arc<dyn NativeResource>)>,
    ) -> CloseOutcome {
        let Some(entry) = self.entries.get_mut(key) else {
            return CloseOutcome::AlreadyClosed;
        };
        entry.device.mark_closed();
        entry.owned = false;

        let mut current = Some(key.to_string());
        let mut removed_first = false;
        while let Some(k) = current.take() {
            let removable = self
                .entries
                .get(&k)
                .map_or(false, |e| e.children == 0 && !e.owned);
            if !removable {
                break;
            }
            let Some(entry) = self.entries.remove(&k) else {
                break;
            };
            removed_first |= k == key;
            entry.device.mark_closed();
            if let Some(resource) = entry.resource {
                releases.push((k.clone(), resource));
            }
            if let Some(parent) = entry.device.parent() {
                if let Some(parent_entry) = self.entries.get_mut(parent) {
                    parent_entry.children = parent_entry.children.saturating_sub(1);
                    debug!(
                        "[REGISTRY] {} released by {} ({} children left)",
                        parent, k, parent_entry.children
                    );
                }
                current = Some(parent.to_string());
            }
        }

        if removed_first {
            CloseOutcome::Closed
        } else {
            CloseOutcome::Deferred
        }
    }

    fn insert(&mut self, device: Arc<Device>, resource: Option<Arc<dyn NativeResource>>, owned: bool) {
        self.entries.insert(
            device.key().to_string(),
            Entry {
                device,
                resource,
                children: 0,
                owned,
            },
        );
    }
}

/// Keyed store of open devices
///
/// A single lock covers provision, close, and lookup. Native constructors run
/// under that lock so a key can never be provisioned twice; native releases
/// run after it is dropped.
#[derive(Default)]
pub struct DeviceRegistry {
    inner: Mutex<Inner>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provision a top-level device
    ///
    /// `open` runs only if `key` is free, and its failure leaves the registry
    /// unchanged.
    pub fn provision<T, F>(&self, key: &str, kind: DeviceKind, open: F) -> Result<(Arc<Device>, Arc<T>)>
    where
        T: NativeResource,
        F: FnOnce() -> Result<Arc<T>>,
    {
        let mut inner = self.inner.lock();
        if inner.entries.contains_key(key) {
            warn!("[REGISTRY] Refusing to provision {}: already open", key);
            return Err(DeviceError::AlreadyOpen(key.to_string()));
        }

        let resource = open()?;
        let device = Device::new(key, kind, None);
        inner.insert(Arc::clone(&device), Some(resource.clone() as Arc<dyn NativeResource>), true);
        info!("[REGISTRY] Provisioned {} ({} open)", key, Self::open_count(&inner));
        Ok((device, resource))
    }

    /// Provision a channel carved out of a shared parent
    ///
    /// The parent is opened with `open_parent` if it is not in the registry,
    /// otherwise its existing native handle is shared. The channel key itself
    /// is exclusive.
    pub fn provision_channel<T, F>(
        &self,
        parent_key: &str,
        parent_kind: DeviceKind,
        open_parent: F,
        channel_key: &str,
    ) -> Result<(Arc<Device>, Arc<T>)>
    where
        T: NativeResource,
        F: FnOnce() -> Result<Arc<T>>,
    {
        let mut inner = self.inner.lock();
        if inner.entries.contains_key(channel_key) {
            warn!("[REGISTRY] Refusing to provision {}: already open", channel_key);
            return Err(DeviceError::AlreadyOpen(channel_key.to_string()));
        }

        let resource = match inner.entries.get(parent_key) {
            Some(parent) => {
                if !parent.device.is_open() {
                    return Err(DeviceError::DeviceClosed(parent_key.to_string()));
                }
                let shared = parent
                    .resource
                    .clone()
                    .and_then(|resource| resource.as_any().downcast::<T>().ok());
                match shared {
                    Some(resource) => resource,
                    None => {
                        return Err(DeviceError::KindMismatch {
                            key: parent_key.to_string(),
                            expected: parent_kind,
                        })
                    }
                }
            }
            None => {
                let resource = open_parent()?;
                let parent = Device::new(parent_key, parent_kind, None);
                inner.insert(parent, Some(resource.clone() as Arc<dyn NativeResource>), false);
                debug!("[REGISTRY] Opened shared parent {} for {}", parent_key, channel_key);
                resource
            }
        };

        if let Some(parent) = inner.entries.get_mut(parent_key) {
            parent.children += 1;
        }
        let device = Device::new(channel_key, DeviceKind::Channel, Some(parent_key));
        inner.insert(Arc::clone(&device), None, true);
        info!("[REGISTRY] Provisioned {} ({} open)", channel_key, Self::open_count(&inner));
        Ok((device, resource))
    }

    /// Close whatever device is open under `key`
    pub fn close(&self, key: &str) -> CloseOutcome {
        let mut releases = Vec::new();
        let outcome = {
            let mut inner = self.inner.lock();
            let open = inner
                .entries
                .get(key)
                .map_or(false, |entry| entry.device.is_open());
            if open {
                inner.close_entry(key, &mut releases)
            } else {
                inner.double_close(key)
            }
        };
        self.release_all(releases);
        outcome
    }

    /// Close a specific device object
    ///
    /// A stale `Device` whose key has since been reprovisioned does not touch
    /// the new device.
    pub fn close_device(&self, device: &Arc<Device>) -> CloseOutcome {
        self.close_device_inner(device, true)
    }

    /// Like [`close_device`](Self::close_device) but silent if already closed;
    /// used by handle drops
    pub(crate) fn close_device_if_open(&self, device: &Arc<Device>) {
        self.close_device_inner(device, false);
    }

    fn close_device_inner(&self, device: &Arc<Device>, diagnose: bool) -> CloseOutcome {
        let mut releases = Vec::new();
        let outcome = {
            let mut inner = self.inner.lock();
            let current = inner
                .entries
                .get(device.key())
                .map_or(false, |entry| Arc::ptr_eq(&entry.device, device));
            if current && device.is_open() {
                inner.close_entry(device.key(), &mut releases)
            } else if diagnose {
                inner.double_close(device.key())
            } else {
                CloseOutcome::AlreadyClosed
            }
        };
        self.release_all(releases);
        outcome
    }

    /// Close every open device; returns how many were closed and the release failures
    pub fn close_all(&self) -> (usize, Vec<CloseFailure>) {
        let mut releases = Vec::new();
        let closed = {
            let mut inner = self.inner.lock();
            // Children first so parents see their counts drop to zero
            let mut keys: Vec<(bool, String)> = inner
                .entries
                .values()
                .filter(|entry| entry.device.is_open())
                .map(|entry| (entry.children == 0, entry.device.key().to_string()))
                .collect();
            keys.sort_by(|a, b| b.0.cmp(&a.0));
            let closed = keys.len();
            for (_, key) in keys {
                if inner.entries.get(&key).map_or(false, |e| e.device.is_open()) {
                    inner.close_entry(&key, &mut releases);
                }
            }
            // Entries closed explicitly earlier but still waiting on children
            let stranded: Vec<String> = inner.entries.keys().cloned().collect();
            for key in stranded {
                if let Some(entry) = inner.entries.remove(&key) {
                    if let Some(resource) = entry.resource {
                        releases.push((key, resource));
                    }
                }
            }
            closed
        };
        let failures = self.release_all(releases);
        (closed, failures)
    }

    fn release_all(&self, releases: Vec<(String, Arc<dyn NativeResource>)>) -> Vec<CloseFailure> {
        let mut failures = Vec::new();
        for (key, resource) in releases {
            match resource.release() {
                Ok(()) => debug!("[REGISTRY] Released native handle of {}", key),
                Err(e) => {
                    warn!("[REGISTRY] Failed to release {}: {}", key, e);
                    failures.push(CloseFailure {
                        key,
                        error: e.to_string(),
                    });
                }
            }
        }
        if !failures.is_empty() {
            let mut inner = self.inner.lock();
            for failure in &failures {
                inner.record(Diagnostic::CloseFailed {
                    key: failure.key.clone(),
                    error: failure.error.clone(),
                });
            }
        }
        failures
    }

    fn open_count(inner: &Inner) -> usize {
        inner
            .entries
            .values()
            .filter(|entry| entry.device.is_open())
            .count()
    }

    /// Open devices, top-level and channels
    pub fn size(&self) -> usize {
        Self::open_count(&self.inner.lock())
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// The open device under `key`
    pub fn get(&self, key: &str) -> Option<Arc<Device>> {
        self.inner
            .lock()
            .entries
            .get(key)
            .filter(|entry| entry.device.is_open())
            .map(|entry| Arc::clone(&entry.device))
    }

    pub fn is_open(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Keys of open devices, sorted
    pub fn keys(&self) -> Vec<String> {
        let inner = self.inner.lock();
        let mut keys: Vec<String> = inner
            .entries
            .values()
            .filter(|entry| entry.device.is_open())
            .map(|entry| entry.device.key().to_string())
            .collect();
        keys.sort();
        keys
    }

    /// Live children of `key` (0 if absent)
    pub fn child_count(&self, key: &str) -> usize {
        self.inner
            .lock()
            .entries
            .get(key)
            .map_or(0, |entry| entry.children)
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.inner.lock().diagnostics.iter().cloned().collect()
    }
}

// tests/common/mod.rs
//
// Scripted in-memory object store for sync tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use caboodle::{ByteStream, FetchError, ObjectStore, RemoteObject};

/// Injected misbehaviour for one object.
#[derive(Debug, Clone, Copy)]
pub enum Fault {
    /// Fetch reports NotFound
    Missing,
    /// The first `n` fetches end their stream with a corruption error
    Corrupt(u32),
    /// Fetch never completes
    Hang,
}

/// In-memory store with per-object faults, fetch counters and an in-flight
/// high-water mark.
pub struct ScriptedStore {
    objects: BTreeMap<String, Bytes>,
    faults: Mutex<HashMap<String, Fault>>,
    fetches: Mutex<HashMap<String, u32>>,
    fetch_order: Mutex<Vec<String>>,
    delay: Duration,
    fail_listing: AtomicBool,
    inflight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self {
            objects: BTreeMap::new(),
            faults: Mutex::new(HashMap::new()),
            fetches: Mutex::new(HashMap::new()),
            fetch_order: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
            fail_listing: AtomicBool::new(false),
            inflight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// `count` objects named `{folder}/obj-NN.bin`, in listing order.
    pub fn numbered(folder: &str, count: usize) -> Self {
        let mut store = Self::new();
        for i in 1..=count {
            store = store.with_object(&numbered_name(folder, i), format!("payload-{i}"));
        }
        store
    }

    pub fn with_object(mut self, name: &str, body: impl Into<Bytes>) -> Self {
        self.objects.insert(name.to_string(), body.into());
        self
    }

    /// Time each fetch holds its slot before returning a stream.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn fault(&self, name: &str, fault: Fault) {
        self.faults.lock().unwrap().insert(name.to_string(), fault);
    }

    pub fn fail_listing(&self) {
        self.fail_listing.store(true, Ordering::SeqCst);
    }

    pub fn fetch_count(&self, name: &str) -> u32 {
        self.fetches.lock().unwrap().get(name).copied().unwrap_or(0)
    }

    /// Names in the order their first fetch started.
    pub fn fetch_order(&self) -> Vec<String> {
        self.fetch_order.lock().unwrap().clone()
    }

    pub fn peak_inflight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn names(&self) -> Vec<String> {
        self.objects.keys().cloned().collect()
    }
}

pub fn numbered_name(folder: &str, i: usize) -> String {
    format!("{folder}/obj-{i:02}.bin")
}

#[async_trait]
impl ObjectStore for ScriptedStore {
    async fn list(&self, prefix: &str) -> Result<Vec<RemoteObject>, FetchError> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(FetchError::PermissionDenied(prefix.to_string()));
        }
        Ok(self
            .objects
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(name, body)| RemoteObject::new(name.clone(), body.len() as u64))
            .collect())
    }

    async fn fetch(&self, object: &RemoteObject) -> Result<ByteStream, FetchError> {
        let attempt = {
            let mut fetches = self.fetches.lock().unwrap();
            let count = fetches.entry(object.name.clone()).or_insert(0);
            *count += 1;
            *count
        };
        if attempt == 1 {
            self.fetch_order.lock().unwrap().push(object.name.clone());
        }

        let now = self.inflight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let fault = self.faults.lock().unwrap().get(&object.name).copied();
        if matches!(fault, Some(Fault::Hang)) {
            std::future::pending::<()>().await;
        }
        self.inflight.fetch_sub(1, Ordering::SeqCst);

        let body = self
            .objects
            .get(&object.name)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(object.name.clone()))?;
        match fault {
            Some(Fault::Missing) => Err(FetchError::NotFound(object.name.clone())),
            Some(Fault::Corrupt(n)) if attempt <= n => {
                let half = body.slice(..body.len() / 2);
                let corrupt =
                    FetchError::Corruption(format!("checksum mismatch on {}", object.name));
                let items = vec![Ok(half), Err(corrupt)];
                Ok(Box::pin(stream::iter(items)))
            }
            _ => Ok(Box::pin(stream::iter(vec![Ok(body)]))),
        }
    }

    async fn put(&self, name: &str, _data: Bytes) -> Result<(), FetchError> {
        Err(FetchError::PermissionDenied(name.to_string()))
    }

    async fn exists(&self, name: &str) -> Result<bool, FetchError> {
        Ok(self.objects.contains_key(name))
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource watcher: list-then-watch over one kind with a selector.
//!
//! Each watcher lists the matching objects, then follows a watch stream
//! from the list's resource version. Closed streams are reopened from the
//! last version seen; failed streams trigger a fresh list after a short
//! delay. Objects reach consumers in order through a bounded channel, and
//! the latest object is always available without consuming the channel.

mod kinds;

pub use kinds::Watched;

use crate::client::{ApiError, ListPage, ResourceClient, Selector, WatchEvent};
use futures_util::StreamExt;
use kube::ResourceExt;
use parking_lot::{Mutex, RwLock};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

/// Errors that stop a watcher or fail a forced update.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WatchError {
    /// The watched object finished or disappeared.
    #[error("watcher is done")]
    Done,
    #[error("found more than one {kind} for the selected criteria: {names}")]
    MultipleResources { kind: &'static str, names: String },
    #[error("{kind} api: {message}")]
    Api { kind: &'static str, message: String },
    #[error("timed out reading {kind}")]
    Timeout { kind: &'static str },
    #[error("{kind} watch loop crashed: {message}")]
    Crashed { kind: &'static str, message: String },
}

/// Tuning for list and watch requests.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub list_timeout: Duration,
    pub watch_timeout: Duration,
    pub retry: Duration,
    pub capacity: usize,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            list_timeout: crate::env::list_timeout(),
            watch_timeout: crate::env::watch_timeout(),
            retry: crate::env::watch_retry(),
            capacity: 16,
        }
    }
}

impl WatchOptions {
    twc_core::setters! {
        set {
            list_timeout: Duration,
            watch_timeout: Duration,
            retry: Duration,
            capacity: usize,
        }
    }
}

/// Supplies the selector of a watcher created with [`ResourceWatcher::spawn_deferred`].
pub struct SelectorHandoff(oneshot::Sender<Selector>);

impl SelectorHandoff {
    pub fn send(self, selector: Selector) -> bool {
        self.0.send(selector).is_ok()
    }
}

/// Order two resource versions: numerically when both are integers,
/// otherwise only identical versions compare.
fn compare_versions(a: &str, b: &str) -> Option<Ordering> {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(a), Ok(b)) => Some(a.cmp(&b)),
        _ if a == b => Some(Ordering::Equal),
        _ => None,
    }
}

#[derive(Default)]
struct Cursor {
    resource_version: String,
    existed: bool,
    finished: bool,
    last_version: Option<String>,
    seen: HashSet<(String, String)>,
}

impl Cursor {
    /// Move the resume point forward; a stale list or event never rewinds it.
    fn advance(&mut self, version: String) {
        if version.is_empty() {
            return;
        }
        if compare_versions(&version, &self.resource_version) != Some(Ordering::Less) {
            self.resource_version = version;
        }
    }

    /// A unique object at `version` is older than, or the same as, the last one accepted.
    fn is_stale(&self, version: Option<&str>) -> bool {
        match (version, self.last_version.as_deref()) {
            (Some(version), Some(last)) => compare_versions(version, last) != Some(Ordering::Greater),
            _ => false,
        }
    }
}

struct Fetched<K> {
    items: Vec<K>,
    done: bool,
}

struct Shared<K: Watched> {
    client: Arc<dyn ResourceClient<K>>,
    selector: RwLock<Option<Selector>>,
    options: WatchOptions,
    cursor: Mutex<Cursor>,
    tx: Mutex<Option<mpsc::Sender<K>>>,
    latest: watch::Sender<Option<K>>,
    started: watch::Sender<bool>,
    error: Mutex<Option<WatchError>>,
    cancel: CancellationToken,
    parent: CancellationToken,
}

/// Handle to a running watcher.
pub struct ResourceWatcher<K: Watched> {
    shared: Arc<Shared<K>>,
    channel: Mutex<Option<mpsc::Receiver<K>>>,
}

impl<K: Watched> ResourceWatcher<K> {
    /// Start watching objects matching `selector`.
    pub fn spawn(
        client: Arc<dyn ResourceClient<K>>,
        selector: Selector,
        options: WatchOptions,
        parent: &CancellationToken,
    ) -> Self {
        Self::start(client, Some(selector), None, options, parent)
    }

    /// Start a watcher that waits for its selector before listing.
    pub fn spawn_deferred(
        client: Arc<dyn ResourceClient<K>>,
        options: WatchOptions,
        parent: &CancellationToken,
    ) -> (Self, SelectorHandoff) {
        let (tx, rx) = oneshot::channel();
        (Self::start(client, None, Some(rx), options, parent), SelectorHandoff(tx))
    }

    fn start(
        client: Arc<dyn ResourceClient<K>>,
        selector: Option<Selector>,
        handoff: Option<oneshot::Receiver<Selector>>,
        options: WatchOptions,
        parent: &CancellationToken,
    ) -> Self {
        let (tx, rx) = mpsc::channel(options.capacity.max(1));
        let shared = Arc::new(Shared {
            client,
            selector: RwLock::new(selector),
            options,
            cursor: Mutex::new(Cursor::default()),
            tx: Mutex::new(Some(tx)),
            latest: watch::Sender::new(None),
            started: watch::Sender::new(false),
            error: Mutex::new(None),
            cancel: parent.child_token(),
            parent: parent.clone(),
        });

        let task = tokio::spawn(run(Arc::clone(&shared), handoff));
        let supervisor = Arc::clone(&shared);
        tokio::spawn(async move {
            if let Err(e) = task.await {
                if e.is_panic() {
                    tracing::error!(kind = K::KIND, "watch loop panicked");
                    supervisor
                        .finish(Some(WatchError::Crashed { kind: K::KIND, message: "panicked".to_string() }));
                }
            }
            supervisor.tx.lock().take();
        });

        Self { shared, channel: Mutex::new(Some(rx)) }
    }

    /// Take the delivery channel. Only the first call gets it.
    pub fn take_channel(&self) -> Option<mpsc::Receiver<K>> {
        self.channel.lock().take()
    }

    /// Re-list right now and report how many new objects were found.
    ///
    /// The count is known before the objects are delivered, so the
    /// channel consumer may call this without draining first.
    pub async fn update(&self, timeout: Duration) -> Result<usize, WatchError> {
        if self.is_done() {
            return Ok(0);
        }
        let fetched = match tokio::time::timeout(timeout, self.shared.fetch()).await {
            Ok(fetched) => fetched?,
            Err(_) => return Err(WatchError::Timeout { kind: K::KIND }),
        };
        let count = fetched.items.len();
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            shared.deliver(fetched.items).await;
            if fetched.done {
                shared.finish(None);
            }
        });
        Ok(count)
    }

    /// Latest object seen, delivered or not.
    pub fn peek(&self) -> Option<K> {
        self.shared.latest.borrow().clone()
    }

    /// Notified whenever a new object is seen.
    pub fn subscribe(&self) -> watch::Receiver<Option<K>> {
        self.shared.latest.subscribe()
    }

    /// The initial list completed.
    pub fn started(&self) -> bool {
        *self.shared.started.borrow()
    }

    /// Resolves once started or done.
    pub async fn wait_started(&self) {
        let mut started = self.shared.started.subscribe();
        tokio::select! {
            _ = started.wait_for(|s| *s) => {}
            _ = self.shared.cancel.cancelled() => {}
        }
    }

    pub fn err(&self) -> Option<WatchError> {
        self.shared.error.lock().clone()
    }

    pub fn is_done(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    pub async fn done(&self) {
        self.shared.cancel.cancelled().await
    }

    pub fn stop(&self) {
        self.shared.cancel.cancel();
    }
}

async fn run<K: Watched>(shared: Arc<Shared<K>>, handoff: Option<oneshot::Receiver<Selector>>) {
    if let Some(handoff) = handoff {
        let selector = tokio::select! {
            _ = shared.cancel.cancelled() => return,
            selector = handoff => selector,
        };
        match selector {
            Ok(selector) => {
                tracing::debug!(kind = K::KIND, %selector, "selector received");
                *shared.selector.write() = Some(selector);
            }
            Err(_) => {
                shared.finish(None);
                return;
            }
        }
    }

    let outcome = tokio::select! {
        _ = shared.cancel.cancelled() => Ok(()),
        outcome = shared.cycle() => outcome,
    };
    match outcome {
        Ok(()) | Err(WatchError::Done) => {
            tracing::debug!(kind = K::KIND, "watcher done");
            shared.finish(None);
        }
        Err(err) => {
            tracing::warn!(kind = K::KIND, error = %err, "watcher failed");
            shared.finish(Some(err));
        }
    }
}

impl<K: Watched> Shared<K> {
    fn selector(&self) -> Option<Selector> {
        self.selector.read().clone()
    }

    fn api_error(&self, err: ApiError) -> WatchError {
        WatchError::Api { kind: K::KIND, message: err.to_string() }
    }

    /// Record the first fatal error and stop.
    fn finish(&self, err: Option<WatchError>) {
        if let Some(err) = err {
            let mut slot = self.error.lock();
            if slot.is_none() {
                *slot = Some(err);
            }
        }
        self.cancel.cancel();
    }

    async fn cycle(&self) -> Result<(), WatchError> {
        self.read().await?;
        self.started.send_replace(true);
        loop {
            match self.watch_once().await {
                Ok(()) => tracing::debug!(kind = K::KIND, "watch stream closed, reopening"),
                Err(err @ WatchError::Api { .. }) => {
                    tracing::warn!(kind = K::KIND, error = %err, "watch failed, listing again");
                    tokio::time::sleep(self.options.retry).await;
                    self.read().await?;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// List and deliver, retrying transient failures.
    async fn read(&self) -> Result<(), WatchError> {
        loop {
            match self.fetch().await {
                Ok(fetched) => {
                    self.deliver(fetched.items).await;
                    return if fetched.done { Err(WatchError::Done) } else { Ok(()) };
                }
                Err(err @ (WatchError::Api { .. } | WatchError::Timeout { .. })) => {
                    tracing::warn!(kind = K::KIND, error = %err, "list failed, retrying");
                    tokio::time::sleep(self.options.retry).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn fetch(&self) -> Result<Fetched<K>, WatchError> {
        let Some(selector) = self.selector() else {
            return Ok(Fetched { items: Vec::new(), done: false });
        };
        let timeout = self.options.list_timeout;
        let ListPage { mut items, resource_version } =
            match tokio::time::timeout(timeout, self.client.list(&selector, timeout)).await {
                Ok(page) => page.map_err(|e| self.api_error(e))?,
                Err(_) => return Err(WatchError::Timeout { kind: K::KIND }),
            };
        if K::UNIQUE && items.len() > 1 {
            let names: Vec<String> = items.iter().map(|i| i.name_any()).collect();
            return Err(WatchError::MultipleResources { kind: K::KIND, names: names.join(", ") });
        }
        if !K::UNIQUE {
            items.sort_by_key(K::order_key);
        }

        let mut cursor = self.cursor.lock();
        if cursor.finished || self.cancel.is_cancelled() {
            return Ok(Fetched { items: Vec::new(), done: cursor.finished });
        }
        cursor.advance(resource_version);
        if K::UNIQUE && items.is_empty() && cursor.existed {
            return Ok(Fetched { items: Vec::new(), done: true });
        }
        let done = K::UNIQUE && items.first().is_some_and(K::is_finished);
        let items = items.into_iter().filter_map(|item| self.accept(&mut cursor, item)).collect();
        Ok(Fetched { items, done })
    }

    async fn watch_once(&self) -> Result<(), WatchError> {
        let Some(selector) = self.selector() else {
            return Ok(());
        };
        let version = self.cursor.lock().resource_version.clone();
        let mut stream = self
            .client
            .watch(&selector, &version, self.options.watch_timeout)
            .await
            .map_err(|e| self.api_error(e))?;

        while let Some(event) = stream.next().await {
            let (mut object, deleted) = match event.map_err(|e| self.api_error(e))? {
                WatchEvent::Bookmark(version) => {
                    self.cursor.lock().advance(version);
                    continue;
                }
                WatchEvent::Added(object) | WatchEvent::Modified(object) => (object, false),
                WatchEvent::Deleted(object) => (object, true),
            };
            if let Some(version) = object.resource_version() {
                self.cursor.lock().advance(version);
            }
            if deleted && !object.on_deleted(chrono::Utc::now()) {
                continue;
            }
            let finished = object.is_finished();
            let accepted = {
                let mut cursor = self.cursor.lock();
                self.accept(&mut cursor, object)
            };
            if let Some(object) = accepted {
                self.deliver(vec![object]).await;
            }
            if K::UNIQUE && finished {
                return Err(WatchError::Done);
            }
        }
        Ok(())
    }

    /// Drop objects already seen or older than the latest; remember the
    /// rest as latest. Nothing is accepted after a finished object.
    fn accept(&self, cursor: &mut Cursor, item: K) -> Option<K> {
        let version = item.resource_version();
        if K::UNIQUE {
            if cursor.finished || cursor.is_stale(version.as_deref()) {
                return None;
            }
            cursor.finished = item.is_finished();
            cursor.last_version = version;
            cursor.existed = true;
        } else {
            let key = (item.uid().unwrap_or_default(), version.unwrap_or_default());
            if !cursor.seen.insert(key) {
                return None;
            }
        }
        self.latest.send_replace(Some(item.clone()));
        Some(item)
    }

    async fn deliver(&self, items: Vec<K>) {
        let Some(tx) = self.tx.lock().clone() else {
            return;
        };
        for item in items {
            tokio::select! {
                _ = self.parent.cancelled() => return,
                sent = tx.send(item) => {
                    if sent.is_err() {
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

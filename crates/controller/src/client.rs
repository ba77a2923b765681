// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Seams between the controller and the Kubernetes API.
//!
//! Watchers, the log reader and cleanup talk to these traits only. The
//! `kube::Api` implementations below are the production backends; tests
//! use the in-memory fakes from `test_support`.

use async_trait::async_trait;
use futures_util::io::AsyncBufRead;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{Event, Pod};
use kube::api::{Api, DeleteParams, ListParams, LogParams, WatchParams};
use kube::Client;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use twc_core::Timestamp;

/// Errors surfaced by the API seams.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The requested resource version is too old (HTTP 410).
    #[error("resource version expired")]
    Gone,
    #[error("not found")]
    NotFound,
    #[error("{0}")]
    Request(String),
}

impl From<kube::Error> for ApiError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(resp) if resp.code == 410 => ApiError::Gone,
            kube::Error::Api(resp) if resp.code == 404 => ApiError::NotFound,
            other => ApiError::Request(other.to_string()),
        }
    }
}

/// Label and field selectors narrowing a list or watch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    pub label: Option<String>,
    pub field: Option<String>,
}

impl Selector {
    pub fn labels(selector: impl Into<String>) -> Self {
        Self { label: Some(selector.into()), field: None }
    }

    pub fn fields(selector: impl Into<String>) -> Self {
        Self { label: None, field: Some(selector.into()) }
    }

    fn list_params(&self, timeout: Duration) -> ListParams {
        ListParams {
            label_selector: self.label.clone(),
            field_selector: self.field.clone(),
            timeout: Some(timeout.as_secs().clamp(1, u32::MAX as u64) as u32),
            ..Default::default()
        }
    }

    fn watch_params(&self, timeout: Duration) -> WatchParams {
        WatchParams {
            label_selector: self.label.clone(),
            field_selector: self.field.clone(),
            timeout: Some(timeout.as_secs().clamp(1, 294) as u32),
            bookmarks: true,
            ..Default::default()
        }
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.label, &self.field) {
            (Some(l), Some(fl)) => write!(f, "{},{}", l, fl),
            (Some(s), None) | (None, Some(s)) => write!(f, "{}", s),
            (None, None) => write!(f, "<all>"),
        }
    }
}

/// One page of a list request.
#[derive(Debug, Clone)]
pub struct ListPage<K> {
    pub items: Vec<K>,
    pub resource_version: String,
}

/// A change delivered by a watch stream.
#[derive(Debug, Clone)]
pub enum WatchEvent<K> {
    Added(K),
    Modified(K),
    Deleted(K),
    /// Progress marker carrying only the latest resource version.
    Bookmark(String),
}

pub type WatchStream<'a, K> = BoxStream<'a, Result<WatchEvent<K>, ApiError>>;

/// List and watch access to one resource kind.
#[async_trait]
pub trait ResourceClient<K>: Send + Sync + 'static {
    async fn list(&self, selector: &Selector, timeout: Duration) -> Result<ListPage<K>, ApiError>;

    /// Open a watch starting after `resource_version`. The stream ends when
    /// the server closes it; callers reopen from the last version seen.
    async fn watch<'a>(
        &'a self,
        selector: &'a Selector,
        resource_version: &'a str,
        timeout: Duration,
    ) -> Result<WatchStream<'a, K>, ApiError>;
}

#[async_trait]
impl<K> ResourceClient<K> for Api<K>
where
    K: Clone + DeserializeOwned + Debug + Send + Sync + 'static,
{
    async fn list(&self, selector: &Selector, timeout: Duration) -> Result<ListPage<K>, ApiError> {
        let list = Api::list(self, &selector.list_params(timeout)).await?;
        Ok(ListPage {
            resource_version: list.metadata.resource_version.unwrap_or_default(),
            items: list.items,
        })
    }

    async fn watch<'a>(
        &'a self,
        selector: &'a Selector,
        resource_version: &'a str,
        timeout: Duration,
    ) -> Result<WatchStream<'a, K>, ApiError> {
        let params = selector.watch_params(timeout);
        let stream = Api::watch(self, &params, resource_version).await?;
        Ok(stream
            .map(|event| match event {
                Ok(kube::core::WatchEvent::Added(obj)) => Ok(WatchEvent::Added(obj)),
                Ok(kube::core::WatchEvent::Modified(obj)) => Ok(WatchEvent::Modified(obj)),
                Ok(kube::core::WatchEvent::Deleted(obj)) => Ok(WatchEvent::Deleted(obj)),
                Ok(kube::core::WatchEvent::Bookmark(mark)) => {
                    Ok(WatchEvent::Bookmark(mark.metadata.resource_version))
                }
                Ok(kube::core::WatchEvent::Error(resp)) if resp.code == 410 => Err(ApiError::Gone),
                Ok(kube::core::WatchEvent::Error(resp)) => Err(ApiError::Request(resp.message)),
                Err(e) => Err(ApiError::from(e)),
            })
            .boxed())
    }
}

/// A follow-mode log stream with timestamped lines.
pub type LogStream<'a> = Pin<Box<dyn AsyncBufRead + Send + 'a>>;

/// Access to container logs of a pod.
#[async_trait]
pub trait LogSource: Send + Sync + 'static {
    /// Open the timestamped log of `container`, from `since` when given.
    /// Without `follow` the stream ends with the output available now.
    async fn open<'a>(
        &'a self,
        pod: &'a str,
        container: &'a str,
        since: Option<Timestamp>,
        follow: bool,
    ) -> Result<LogStream<'a>, ApiError>;
}

#[async_trait]
impl LogSource for Api<Pod> {
    async fn open<'a>(
        &'a self,
        pod: &'a str,
        container: &'a str,
        since: Option<Timestamp>,
        follow: bool,
    ) -> Result<LogStream<'a>, ApiError> {
        let params = LogParams {
            container: Some(container.to_string()),
            follow,
            timestamps: true,
            since_time: since,
            ..Default::default()
        };
        let stream = self.log_stream(pod, &params).await?;
        Ok(Box::pin(stream))
    }
}

/// Deletion of the resources backing one execution.
#[async_trait]
pub trait ResourceCleaner: Send + Sync + 'static {
    async fn delete_job(&self, name: &str) -> Result<(), ApiError>;
    async fn delete_pods(&self, selector: &Selector) -> Result<(), ApiError>;
}

/// Production cleaner deleting through the API server with background propagation.
pub struct KubeCleaner {
    jobs: Api<Job>,
    pods: Api<Pod>,
}

#[async_trait]
impl ResourceCleaner for KubeCleaner {
    async fn delete_job(&self, name: &str) -> Result<(), ApiError> {
        match self.jobs.delete(name, &DeleteParams::background()).await {
            Ok(_) => Ok(()),
            Err(e) => match ApiError::from(e) {
                ApiError::NotFound => Ok(()),
                other => Err(other),
            },
        }
    }

    async fn delete_pods(&self, selector: &Selector) -> Result<(), ApiError> {
        let params = ListParams {
            label_selector: selector.label.clone(),
            field_selector: selector.field.clone(),
            ..Default::default()
        };
        match self.pods.delete_collection(&DeleteParams::background(), &params).await {
            Ok(_) => Ok(()),
            Err(e) => match ApiError::from(e) {
                ApiError::NotFound => Ok(()),
                other => Err(other),
            },
        }
    }
}

/// Every backend an execution controller needs, bundled.
#[derive(Clone)]
pub struct ExecutionSources {
    pub jobs: Arc<dyn ResourceClient<Job>>,
    pub pods: Arc<dyn ResourceClient<Pod>>,
    pub events: Arc<dyn ResourceClient<Event>>,
    pub logs: Arc<dyn LogSource>,
    pub cleaner: Arc<dyn ResourceCleaner>,
}

impl ExecutionSources {
    /// Backends talking to the API server through `client`, scoped to `namespace`.
    pub fn kube(client: Client, namespace: &str) -> Self {
        let jobs: Api<Job> = Api::namespaced(client.clone(), namespace);
        let pods: Api<Pod> = Api::namespaced(client.clone(), namespace);
        let events: Api<Event> = Api::namespaced(client, namespace);
        Self {
            jobs: Arc::new(jobs.clone()),
            pods: Arc::new(pods.clone()),
            events: Arc::new(events),
            logs: Arc::new(pods.clone()),
            cleaner: Arc::new(KubeCleaner { jobs, pods }),
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

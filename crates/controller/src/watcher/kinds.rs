// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-kind watch behavior for Jobs, Pods and Events.

use crate::state::{event_timestamp, JobView, PodView};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{Event, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use std::fmt::Debug;
use twc_core::Timestamp;

/// A resource kind a [`super::ResourceWatcher`] can follow.
pub trait Watched: kube::Resource<DynamicType = ()> + Clone + Debug + Send + Sync + 'static {
    const KIND: &'static str;
    /// At most one object matches the selector; more is a setup error.
    const UNIQUE: bool;

    /// The object reached a state after which no further change matters.
    fn is_finished(&self) -> bool;

    /// Prepare a deleted object for delivery; `false` drops it.
    fn on_deleted(&mut self, now: Timestamp) -> bool;

    /// Ordering key for objects delivered from one list page.
    fn order_key(&self) -> Option<Timestamp> {
        None
    }
}

fn mark_deleted(deletion: &mut Option<Time>, now: Timestamp) {
    if deletion.is_none() {
        *deletion = Some(Time(now));
    }
}

impl Watched for Job {
    const KIND: &'static str = "job";
    const UNIQUE: bool = true;

    fn is_finished(&self) -> bool {
        JobView(self).is_finished()
    }

    fn on_deleted(&mut self, now: Timestamp) -> bool {
        mark_deleted(&mut self.metadata.deletion_timestamp, now);
        true
    }
}

impl Watched for Pod {
    const KIND: &'static str = "pod";
    const UNIQUE: bool = true;

    fn is_finished(&self) -> bool {
        PodView(self).is_finished()
    }

    fn on_deleted(&mut self, now: Timestamp) -> bool {
        mark_deleted(&mut self.metadata.deletion_timestamp, now);
        true
    }
}

impl Watched for Event {
    const KIND: &'static str = "event";
    const UNIQUE: bool = false;

    fn is_finished(&self) -> bool {
        false
    }

    // Expired events carry nothing new.
    fn on_deleted(&mut self, _now: Timestamp) -> bool {
        false
    }

    fn order_key(&self) -> Option<Timestamp> {
        event_timestamp(self)
    }
}

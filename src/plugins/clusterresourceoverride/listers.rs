// Copyright 2024 The Kubernetes Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Read-only views of the cluster state the plugin consults.

use crate::admission::{AdmissionError, AdmissionResult};
use crate::api::core::{LimitRange, Namespace};
use std::collections::HashMap;
use std::sync::RwLock;

/// Resolves a namespace name to the namespace object.
pub trait NamespaceLister: Send + Sync {
    /// Returns `NotFound` for an unknown namespace, `Unavailable` when the
    /// backing cache cannot answer.
    fn get(&self, name: &str) -> AdmissionResult<Namespace>;
}

/// Lists the LimitRange objects of a namespace.
pub trait LimitRangeLister: Send + Sync {
    /// A namespace without limit ranges yields an empty list, not an error.
    fn list(&self, namespace: &str) -> AdmissionResult<Vec<LimitRange>>;
}

/// In-memory namespace store for testing.
#[derive(Debug, Default)]
pub struct InMemoryNamespaceStore {
    namespaces: RwLock<HashMap<String, Namespace>>,
}

impl InMemoryNamespaceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, namespace: Namespace) {
        self.namespaces
            .write()
            .expect("namespace store lock poisoned")
            .insert(namespace.name.clone(), namespace);
    }
}

impl NamespaceLister for InMemoryNamespaceStore {
    fn get(&self, name: &str) -> AdmissionResult<Namespace> {
        self.namespaces
            .read()
            .expect("namespace store lock poisoned")
            .get(name)
            .cloned()
            .ok_or_else(|| AdmissionError::not_found("Namespace", name))
    }
}

/// In-memory limit range store for testing.
#[derive(Debug, Default)]
pub struct InMemoryLimitRangeStore {
    ranges: RwLock<HashMap<String, Vec<LimitRange>>>,
}

impl InMemoryLimitRangeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, range: LimitRange) {
        self.ranges
            .write()
            .expect("limit range store lock poisoned")
            .entry(range.namespace.clone())
            .or_default()
            .push(range);
    }
}

impl LimitRangeLister for InMemoryLimitRangeStore {
    fn list(&self, namespace: &str) -> AdmissionResult<Vec<LimitRange>> {
        Ok(self
            .ranges
            .read()
            .expect("limit range store lock poisoned")
            .get(namespace)
            .cloned()
            .unwrap_or_default())
    }
}

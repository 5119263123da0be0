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

//! Core Kubernetes API types (Pod, Container, Namespace, LimitRange).

use crate::api::resource::{Quantity, QuantityError};
use std::any::Any;
use std::collections::HashMap;

/// ResourceList is a map of resource names to quantities.
pub type ResourceList = HashMap<String, Quantity>;

/// ApiObject is a trait for Kubernetes API objects that can be used in admission.
pub trait ApiObject: Send + Sync {
    /// Returns the object as Any for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Returns the object as mutable Any for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Returns the kind of this object.
    fn kind(&self) -> &str;
}

// ============================================================================
// Resource names
// ============================================================================

/// CPU, in cores. (500m = .5 cores)
pub const RESOURCE_CPU: &str = "cpu";

/// Memory, in bytes. (500Gi = 500GiB = 500 * 1024 * 1024 * 1024)
pub const RESOURCE_MEMORY: &str = "memory";

/// Volume size, in bytes.
pub const RESOURCE_STORAGE: &str = "storage";

/// Parse `(name, quantity)` pairs into a ResourceList.
pub fn resource_list(entries: &[(&str, &str)]) -> Result<ResourceList, QuantityError> {
    entries
        .iter()
        .map(|(name, value)| Ok((name.to_string(), value.parse::<Quantity>()?)))
        .collect()
}

// ============================================================================
// Container
// ============================================================================

/// ResourceRequirements describes the compute resource requirements.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResourceRequirements {
    /// Requests describes the minimum amount of compute resources required.
    pub requests: ResourceList,
    /// Limits describes the maximum amount of compute resources allowed.
    pub limits: ResourceList,
}

/// Container represents a single container in a pod.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Container {
    /// Name of the container.
    pub name: String,
    /// Container image name.
    pub image: String,
    /// Compute Resources required by this container.
    pub resources: ResourceRequirements,
}

impl Container {
    /// Create a new container with the given name and image.
    pub fn new(name: &str, image: &str) -> Self {
        Self {
            name: name.to_string(),
            image: image.to_string(),
            resources: ResourceRequirements::default(),
        }
    }

    /// Create a new container with the given resources.
    pub fn with_resources(name: &str, image: &str, resources: ResourceRequirements) -> Self {
        Self {
            name: name.to_string(),
            image: image.to_string(),
            resources,
        }
    }
}

// ============================================================================
// Pod
// ============================================================================

/// PodSpec describes the specification of a pod.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PodSpec {
    /// List of initialization containers, run in order before the containers.
    pub init_containers: Vec<Container>,
    /// List of containers.
    pub containers: Vec<Container>,
}

impl PodSpec {
    /// Visit init containers, then containers, with their field paths.
    /// Stops early and returns false as soon as the visitor does.
    pub fn visit_containers_with_path<F>(&self, base_path: &str, mut visitor: F) -> bool
    where
        F: FnMut(&Container, String) -> bool,
    {
        for (i, c) in self.init_containers.iter().enumerate() {
            if !visitor(c, format!("{}.initContainers[{}]", base_path, i)) {
                return false;
            }
        }
        for (i, c) in self.containers.iter().enumerate() {
            if !visitor(c, format!("{}.containers[{}]", base_path, i)) {
                return false;
            }
        }
        true
    }

    /// Mutable counterpart of [`PodSpec::visit_containers_with_path`].
    pub fn visit_containers_with_path_mut<F>(&mut self, base_path: &str, mut visitor: F) -> bool
    where
        F: FnMut(&mut Container, String) -> bool,
    {
        for (i, c) in self.init_containers.iter_mut().enumerate() {
            if !visitor(c, format!("{}.initContainers[{}]", base_path, i)) {
                return false;
            }
        }
        for (i, c) in self.containers.iter_mut().enumerate() {
            if !visitor(c, format!("{}.containers[{}]", base_path, i)) {
                return false;
            }
        }
        true
    }
}

/// Pod represents a Kubernetes Pod.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Pod {
    /// Name of the pod.
    pub name: String,
    /// Namespace of the pod.
    pub namespace: String,
    /// Pod specification.
    pub spec: PodSpec,
}

impl Pod {
    /// Create a new pod with the given name and namespace.
    pub fn new(name: &str, namespace: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            ..Default::default()
        }
    }
}

impl ApiObject for Pod {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn kind(&self) -> &str {
        "Pod"
    }
}

// ============================================================================
// Namespace
// ============================================================================

/// Namespace represents a Kubernetes Namespace.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Namespace {
    pub name: String,
    pub annotations: HashMap<String, String>,
}

impl Namespace {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            annotations: HashMap::new(),
        }
    }

    /// Builder-style helper to attach an annotation.
    pub fn with_annotation(mut self, key: &str, value: &str) -> Self {
        self.annotations.insert(key.to_string(), value.to_string());
        self
    }
}

impl ApiObject for Namespace {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn kind(&self) -> &str {
        "Namespace"
    }
}

// ============================================================================
// LimitRange
// ============================================================================

/// LimitType is the kind of object a LimitRangeItem constrains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitType {
    Pod,
    Container,
    PersistentVolumeClaim,
}

/// LimitRangeItem defines the minimum usage of any resource that matches on kind.
#[derive(Debug, Clone, PartialEq)]
pub struct LimitRangeItem {
    pub limit_type: LimitType,
    pub min: ResourceList,
}

impl LimitRangeItem {
    /// Create an item of the given type with no constraints.
    pub fn new(limit_type: LimitType) -> Self {
        Self {
            limit_type,
            min: ResourceList::new(),
        }
    }

    /// Builder-style helper to set a minimum.
    pub fn with_min(mut self, resource: &str, quantity: Quantity) -> Self {
        self.min.insert(resource.to_string(), quantity);
        self
    }
}

/// LimitRangeSpec holds the items of a LimitRange.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LimitRangeSpec {
    pub limits: Vec<LimitRangeItem>,
}

/// LimitRange sets resource usage limits for each kind of resource in a Namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct LimitRange {
    pub name: String,
    pub namespace: String,
    pub spec: LimitRangeSpec,
}

impl LimitRange {
    pub fn new(name: &str, namespace: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            spec: LimitRangeSpec::default(),
        }
    }

    /// Builder-style helper to append an item.
    pub fn with_item(mut self, item: LimitRangeItem) -> Self {
        self.spec.limits.push(item);
        self
    }
}

impl ApiObject for LimitRange {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn kind(&self) -> &str {
        "LimitRange"
    }
}

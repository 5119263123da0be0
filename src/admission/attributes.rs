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

//! Admission attributes that describe an admission request.

use super::interfaces::Operation;
use crate::api::core::{ApiObject, Pod};

/// GroupVersionResource identifies a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupVersionResource {
    pub group: String,
    pub version: String,
    pub resource: String,
}

impl GroupVersionResource {
    pub fn new(group: &str, version: &str, resource: &str) -> Self {
        Self {
            group: group.to_string(),
            version: version.to_string(),
            resource: resource.to_string(),
        }
    }
}

/// GroupVersionKind identifies a kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupVersionKind {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl GroupVersionKind {
    pub fn new(group: &str, version: &str, kind: &str) -> Self {
        Self {
            group: group.to_string(),
            version: version.to_string(),
            kind: kind.to_string(),
        }
    }
}

/// Attributes describes the request an admission plugin is asked to decide on.
pub trait Attributes {
    /// Returns the name of the object as presented in the request.
    fn get_name(&self) -> &str;

    /// Returns the namespace associated with the request (if any).
    fn get_namespace(&self) -> &str;

    /// Returns the resource being requested.
    fn get_resource(&self) -> &GroupVersionResource;

    /// Returns the name of the subresource being requested.
    fn get_subresource(&self) -> &str;

    /// Returns the operation being performed.
    fn get_operation(&self) -> Operation;

    /// Returns the object from the incoming request.
    fn get_object(&self) -> Option<&dyn ApiObject>;

    /// Returns the object as a mutable reference.
    fn get_object_mut(&mut self) -> Option<&mut (dyn ApiObject + 'static)>;

    /// Returns the existing object (only populated for UPDATE and DELETE requests).
    fn get_old_object(&self) -> Option<&dyn ApiObject>;

    /// Returns the kind of object being manipulated.
    fn get_kind(&self) -> &GroupVersionKind;
}

/// AttributesRecord is a concrete implementation of Attributes.
pub struct AttributesRecord {
    pub name: String,
    pub namespace: String,
    pub resource: GroupVersionResource,
    pub subresource: String,
    pub operation: Operation,
    pub object: Option<Box<dyn ApiObject>>,
    pub old_object: Option<Box<dyn ApiObject>>,
    pub kind: GroupVersionKind,
}

impl AttributesRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: &str,
        namespace: &str,
        resource: GroupVersionResource,
        subresource: &str,
        operation: Operation,
        object: Option<Box<dyn ApiObject>>,
        old_object: Option<Box<dyn ApiObject>>,
        kind: GroupVersionKind,
    ) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            resource,
            subresource: subresource.to_string(),
            operation,
            object,
            old_object,
            kind,
        }
    }

    /// Attributes for a request against the core `pods` resource.
    pub fn new_pod(
        name: &str,
        namespace: &str,
        operation: Operation,
        pod: Pod,
        old_pod: Option<Pod>,
    ) -> Self {
        Self::new(
            name,
            namespace,
            GroupVersionResource::new("", "v1", "pods"),
            "",
            operation,
            Some(Box::new(pod)),
            old_pod.map(|p| Box::new(p) as Box<dyn ApiObject>),
            GroupVersionKind::new("", "v1", "Pod"),
        )
    }

    /// Same request, aimed at a subresource.
    pub fn with_subresource(mut self, subresource: &str) -> Self {
        self.subresource = subresource.to_string();
        self
    }

    /// Get the pod from the object, if it is a pod.
    pub fn get_pod(&self) -> Option<&Pod> {
        self.object
            .as_ref()
            .and_then(|obj| obj.as_any().downcast_ref::<Pod>())
    }

    /// Get a mutable reference to the pod from the object.
    pub fn get_pod_mut(&mut self) -> Option<&mut Pod> {
        self.object
            .as_mut()
            .and_then(|obj| obj.as_any_mut().downcast_mut::<Pod>())
    }
}

impl Attributes for AttributesRecord {
    fn get_name(&self) -> &str {
        &self.name
    }

    fn get_namespace(&self) -> &str {
        &self.namespace
    }

    fn get_resource(&self) -> &GroupVersionResource {
        &self.resource
    }

    fn get_subresource(&self) -> &str {
        &self.subresource
    }

    fn get_operation(&self) -> Operation {
        self.operation
    }

    fn get_object(&self) -> Option<&dyn ApiObject> {
        self.object.as_ref().map(|o| o.as_ref())
    }

    fn get_object_mut(&mut self) -> Option<&mut (dyn ApiObject + 'static)> {
        self.object.as_mut().map(|o| &mut **o)
    }

    fn get_old_object(&self) -> Option<&dyn ApiObject> {
        self.old_object.as_ref().map(|o| o.as_ref())
    }

    fn get_kind(&self) -> &GroupVersionKind {
        &self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::core::Container;

    #[test]
    fn test_attributes_record_new_pod() {
        let mut pod = Pod::new("test-pod", "default");
        pod.spec.containers.push(Container::new("test", "nginx"));

        let attrs = AttributesRecord::new_pod("test-pod", "default", Operation::Create, pod, None);

        assert_eq!(attrs.get_name(), "test-pod");
        assert_eq!(attrs.get_namespace(), "default");
        assert_eq!(attrs.get_operation(), Operation::Create);
        assert_eq!(attrs.get_resource().resource, "pods");
        assert_eq!(attrs.get_kind().kind, "Pod");
        assert!(attrs.get_subresource().is_empty());
        assert!(attrs.get_old_object().is_none());
        assert_eq!(attrs.get_pod().map(|p| p.spec.containers.len()), Some(1));
    }

    #[test]
    fn test_attributes_record_pod_mut() {
        let old = Pod::new("test-pod", "default");
        let mut attrs = AttributesRecord::new_pod(
            "test-pod",
            "default",
            Operation::Update,
            old.clone(),
            Some(old),
        )
        .with_subresource("status");

        if let Some(pod) = attrs.get_pod_mut() {
            pod.spec.containers.push(Container::new("added", "nginx"));
        }
        assert_eq!(attrs.get_subresource(), "status");
        assert!(attrs.get_old_object().is_some());
        assert_eq!(attrs.get_pod().map(|p| p.spec.containers.len()), Some(1));
    }
}

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

//! ClusterResourceOverride admission controller.
//!
//! This admission controller rewrites the resources of every container in a
//! new pod from its memory limit, using cluster-wide ratios: the CPU limit is
//! derived from the memory limit, and both requests are derived from their
//! limits. Values are never allowed below the container minimums declared by
//! LimitRanges in the pod's namespace.
//!
//! Pods are mutated on create, and validated on create and update by
//! recomputing the override and requiring the pod to already match it.
//! Namespaces can opt out with the
//! `quota.openshift.io/cluster-resource-override-enabled: "false"` annotation.

pub mod calculator;
pub mod config;
pub mod floor;
pub mod listers;

use crate::admission::errors::field_invalid;
use crate::admission::{
    AdmissionError, AdmissionResult, Attributes, Handler, Interface, MutationInterface,
    Operation, Plugins, ValidationInterface,
};
use crate::api::core::{Namespace, Pod, ResourceList, ResourceRequirements};
use crate::api::resource::Quantity;
use calculator::override_resources;
use config::{load_config, ClusterResourceOverrideConfig};
use floor::{Floor, FloorResolver};
use listers::{LimitRangeLister, NamespaceLister};
use std::collections::BTreeSet;
use std::fmt;
use std::io::Read;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Plugin name for the ClusterResourceOverride admission controller.
pub const PLUGIN_NAME: &str = "ClusterResourceOverride";

/// Namespace annotation that turns the override off for a namespace when set
/// to `"false"`.
pub const CLUSTER_RESOURCE_OVERRIDE_ANNOTATION: &str =
    "quota.openshift.io/cluster-resource-override-enabled";

/// Register the ClusterResourceOverride plugin with the plugin registry.
pub fn register(plugins: &Plugins) {
    plugins.register(PLUGIN_NAME, |config: Option<&mut dyn Read>| {
        Ok(Arc::new(ClusterResourceOverride::from_reader(config)) as Arc<dyn Interface>)
    });
}

/// Returns true if the namespace opted out of the override.
pub fn is_override_disabled(namespace: &Namespace) -> bool {
    namespace
        .annotations
        .get(CLUSTER_RESOURCE_OVERRIDE_ANNOTATION)
        .is_some_and(|value| value.trim().eq_ignore_ascii_case("false"))
}

/// ClusterResourceOverride is an implementation of the ClusterResourceOverride
/// admission controller.
pub struct ClusterResourceOverride {
    handler: Handler,
    config: Option<ClusterResourceOverrideConfig>,
    namespace_lister: Option<Arc<dyn NamespaceLister>>,
    floor_resolver: Option<FloorResolver>,
}

impl ClusterResourceOverride {
    /// Create the plugin. Without a configuration the plugin admits every
    /// request unchanged.
    pub fn new(config: Option<ClusterResourceOverrideConfig>) -> Self {
        Self {
            handler: Handler::new_create_update(),
            config,
            namespace_lister: None,
            floor_resolver: None,
        }
    }

    /// Create the plugin from its configuration document. A configuration
    /// that cannot be read or does not validate leaves the plugin disabled.
    pub fn from_reader(reader: Option<&mut dyn Read>) -> Self {
        let config = match load_config(reader) {
            Ok(Some(config)) => {
                info!(
                    plugin = PLUGIN_NAME,
                    limit_cpu_to_memory_percent = config.limit_cpu_to_memory_percent,
                    cpu_request_to_limit_percent = config.cpu_request_to_limit_percent,
                    memory_request_to_limit_percent = config.memory_request_to_limit_percent,
                    "admission plugin configured"
                );
                Some(config)
            }
            Ok(None) => {
                info!(plugin = PLUGIN_NAME, "no configuration provided, plugin disabled");
                None
            }
            Err(err) => {
                warn!(plugin = PLUGIN_NAME, error = %err, "ignoring configuration, plugin disabled");
                None
            }
        };
        Self::new(config)
    }

    /// Attach the listers used to read namespaces and limit ranges.
    pub fn with_listers(
        mut self,
        namespace_lister: Arc<dyn NamespaceLister>,
        limit_range_lister: Arc<dyn LimitRangeLister>,
    ) -> Self {
        self.namespace_lister = Some(namespace_lister);
        self.floor_resolver = Some(FloorResolver::new(limit_range_lister));
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_some()
    }

    pub fn config(&self) -> Option<&ClusterResourceOverrideConfig> {
        self.config.as_ref()
    }

    /// Check that an enabled plugin received everything it needs.
    pub fn validate_initialization(&self) -> AdmissionResult<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        self.listers().map(|_| ())
    }

    fn listers(&self) -> AdmissionResult<(&dyn NamespaceLister, &FloorResolver)> {
        match (&self.namespace_lister, &self.floor_resolver) {
            (Some(namespaces), Some(floors)) => Ok((namespaces.as_ref(), floors)),
            (None, _) => Err(not_initialized("namespace lister")),
            (_, None) => Err(not_initialized("limit range lister")),
        }
    }

    /// Resolve what applies to pods in `namespace`, or `None` if they are to
    /// be left alone.
    fn policy_for(&self, namespace: &str) -> AdmissionResult<Option<Policy<'_>>> {
        let Some(config) = &self.config else {
            return Ok(None);
        };
        let (namespaces, floors) = self.listers()?;

        if is_override_disabled(&namespaces.get(namespace)?) {
            debug!(namespace, "namespace opted out of cluster resource override");
            return Ok(None);
        }
        let floor = floors.resolve(namespace)?;
        Ok(Some(Policy { config, floor }))
    }

    fn should_ignore(&self, attributes: &dyn Attributes) -> bool {
        let resource = attributes.get_resource();
        !self.is_enabled()
            || !self.handles(attributes.get_operation())
            || !resource.group.is_empty()
            || resource.resource != "pods"
            || !attributes.get_subresource().is_empty()
    }
}

struct Policy<'a> {
    config: &'a ClusterResourceOverrideConfig,
    floor: Floor,
}

impl Policy<'_> {
    fn apply(&self, resources: &ResourceRequirements) -> ResourceRequirements {
        override_resources(resources, self.config, &self.floor)
    }
}

fn not_initialized(missing: &str) -> AdmissionError {
    AdmissionError::internal_error(format!("{} did not get a {}", PLUGIN_NAME, missing))
}

fn expected_pod() -> AdmissionError {
    AdmissionError::bad_request("expected Pod but got different type")
}

impl Interface for ClusterResourceOverride {
    fn handles(&self, operation: Operation) -> bool {
        self.handler.handles(operation)
    }
}

impl MutationInterface for ClusterResourceOverride {
    fn admit(&self, attributes: &mut dyn Attributes) -> AdmissionResult<()> {
        if self.should_ignore(attributes) || attributes.get_operation() != Operation::Create {
            return Ok(());
        }

        let namespace = attributes.get_namespace().to_string();
        let pod = match attributes.get_object_mut() {
            Some(obj) => obj.as_any_mut().downcast_mut::<Pod>().ok_or_else(expected_pod)?,
            None => return Ok(()),
        };
        let Some(policy) = self.policy_for(&namespace)? else {
            return Ok(());
        };

        let pod_name = pod.name.clone();
        pod.spec.visit_containers_with_path_mut("spec", |container, path| {
            let overridden = policy.apply(&container.resources);
            if overridden != container.resources {
                debug!(
                    namespace = %namespace,
                    pod = %pod_name,
                    container = %container.name,
                    path = %path,
                    "overriding container resources"
                );
                container.resources = overridden;
            }
            true
        });
        Ok(())
    }
}

impl ValidationInterface for ClusterResourceOverride {
    fn validate(&self, attributes: &dyn Attributes) -> AdmissionResult<()> {
        if self.should_ignore(attributes) {
            return Ok(());
        }

        let pod = match attributes.get_object() {
            Some(obj) => obj.as_any().downcast_ref::<Pod>().ok_or_else(expected_pod)?,
            None => return Ok(()),
        };
        let namespace = attributes.get_namespace();
        let Some(policy) = self.policy_for(namespace)? else {
            return Ok(());
        };

        let mut errors = Vec::new();
        pod.spec.visit_containers_with_path("spec", |container, path| {
            let expected = policy.apply(&container.resources);
            let diffs = resource_differences(&expected, &container.resources);
            if !diffs.is_empty() {
                errors.push(mismatch_error(pod, namespace, &path, &diffs));
            }
            true
        });

        if errors.is_empty() {
            return Ok(());
        }
        warn!(
            namespace,
            pod = %pod.name,
            containers = errors.len(),
            "rejecting pod whose resources do not match the cluster resource override"
        );
        Err(AdmissionError::aggregate(errors))
    }
}

/// A single resource entry that differs from the expected override.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ResourceDiff {
    entry: String,
    expected: Option<Quantity>,
    actual: Option<Quantity>,
}

impl fmt::Display for ResourceDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} expected {}, found {}",
            self.entry,
            display_quantity(self.expected.as_ref()),
            display_quantity(self.actual.as_ref())
        )
    }
}

fn display_quantity(quantity: Option<&Quantity>) -> String {
    quantity.map_or_else(|| "none".to_string(), |q| q.to_string())
}

fn resource_differences(
    expected: &ResourceRequirements,
    actual: &ResourceRequirements,
) -> Vec<ResourceDiff> {
    let mut diffs = Vec::new();
    diff_section("limits", &expected.limits, &actual.limits, &mut diffs);
    diff_section("requests", &expected.requests, &actual.requests, &mut diffs);
    diffs
}

fn diff_section(
    section: &str,
    expected: &ResourceList,
    actual: &ResourceList,
    diffs: &mut Vec<ResourceDiff>,
) {
    let names: BTreeSet<&String> = expected.keys().chain(actual.keys()).collect();
    for name in names {
        let (expected, actual) = (expected.get(name), actual.get(name));
        if expected != actual {
            diffs.push(ResourceDiff {
                entry: format!("{}.{}", section, name),
                expected: expected.copied(),
                actual: actual.copied(),
            });
        }
    }
}

fn mismatch_error(pod: &Pod, namespace: &str, path: &str, diffs: &[ResourceDiff]) -> AdmissionError {
    let entries: Vec<&str> = diffs.iter().map(|d| d.entry.as_str()).collect();
    let details: Vec<String> = diffs.iter().map(|d| d.to_string()).collect();
    AdmissionError::forbidden(
        &pod.name,
        namespace,
        "pods",
        field_invalid(
            &format!("{}.resources", path),
            entries.join(", "),
            &format!("must match the cluster resource override: {}", details.join("; ")),
        ),
    )
}

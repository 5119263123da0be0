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

//! ClusterResourceOverride admission plugin
//!
//! This crate provides an admission controller that overrides container
//! resource requests and limits from cluster-wide ratios of the memory limit,
//! bounded below by namespace LimitRange minimums. It is built on the same
//! admission interfaces (`Interface`, `MutationInterface`,
//! `ValidationInterface`) and plugin registry used by the Kubernetes API
//! server.

pub mod admission;
pub mod api;
pub mod plugins;

// Re-export commonly used types
pub use admission::{
    Attributes, AttributesRecord, Handler, Interface, MutationInterface, Operation, Plugins,
    ValidationInterface,
};
pub use api::core::{Container, LimitRange, Namespace, Pod, PodSpec, ResourceRequirements};
pub use api::resource::Quantity;
pub use plugins::clusterresourceoverride::{
    ClusterResourceOverride, config::ClusterResourceOverrideConfig,
};

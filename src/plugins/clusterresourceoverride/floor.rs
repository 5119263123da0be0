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

//! Namespace floors derived from container-scoped LimitRange minimums.
//!
//! A container has to satisfy the `min` of every LimitRange in its namespace,
//! so the floor for a resource is the largest minimum declared for it.

use super::listers::LimitRangeLister;
use crate::admission::AdmissionResult;
use crate::api::core::{LimitRange, LimitType, RESOURCE_CPU, RESOURCE_MEMORY};
use crate::api::resource::Quantity;
use std::sync::Arc;
use tracing::debug;

/// Floor is the lower bound a namespace imposes on CPU and memory values.
/// `None` means the namespace does not constrain that resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Floor {
    pub cpu: Option<Quantity>,
    pub memory: Option<Quantity>,
}

impl Floor {
    pub fn new(cpu: Option<Quantity>, memory: Option<Quantity>) -> Self {
        Self { cpu, memory }
    }

    pub fn is_empty(&self) -> bool {
        self.cpu.is_none() && self.memory.is_none()
    }
}

/// Reduce the container minimums of `limit_ranges` to a single floor.
pub fn floor_from_limit_ranges(limit_ranges: &[LimitRange]) -> Floor {
    let mut floor = Floor::default();
    let container_items = limit_ranges
        .iter()
        .flat_map(|lr| lr.spec.limits.iter())
        .filter(|item| item.limit_type == LimitType::Container);

    for item in container_items {
        raise(&mut floor.cpu, item.min.get(RESOURCE_CPU));
        raise(&mut floor.memory, item.min.get(RESOURCE_MEMORY));
    }
    floor
}

fn raise(current: &mut Option<Quantity>, candidate: Option<&Quantity>) {
    if let Some(candidate) = candidate {
        if current.map_or(true, |existing| *candidate > existing) {
            *current = Some(*candidate);
        }
    }
}

/// FloorResolver looks up the floor for a namespace on every call; floors are
/// never cached because LimitRanges can change between requests.
#[derive(Clone)]
pub struct FloorResolver {
    lister: Arc<dyn LimitRangeLister>,
}

impl FloorResolver {
    pub fn new(lister: Arc<dyn LimitRangeLister>) -> Self {
        Self { lister }
    }

    pub fn resolve(&self, namespace: &str) -> AdmissionResult<Floor> {
        let limit_ranges = self.lister.list(namespace)?;
        let floor = floor_from_limit_ranges(&limit_ranges);
        debug!(
            namespace,
            limit_ranges = limit_ranges.len(),
            cpu = ?floor.cpu.map(|q| q.to_string()),
            memory = ?floor.memory.map(|q| q.to_string()),
            "resolved namespace floor"
        );
        Ok(floor)
    }
}

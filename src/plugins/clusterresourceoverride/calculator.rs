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

//! Resource override arithmetic.
//!
//! [`override_resources`] derives a container's CPU limit, CPU request and
//! memory request from its memory limit. It is the single computation used by
//! both the mutating and the validating admission paths, so the two can never
//! disagree about what a container should look like.
//!
//! All math is done on scaled integers: memory in bytes, CPU in millicores.

use super::config::ClusterResourceOverrideConfig;
use super::floor::Floor;
use crate::api::core::{ResourceRequirements, RESOURCE_CPU, RESOURCE_MEMORY};
use crate::api::resource::{Format, Quantity};

/// Smallest CPU value, in millicores, the override ever produces.
pub const CPU_FLOOR_MILLIS: i64 = 1;

/// Smallest memory request, in bytes, the override ever produces (1Mi).
pub const MEMORY_FLOOR_BYTES: i64 = 1 << 20;

/// Memory requests derived from a binary-SI limit are truncated to a multiple
/// of this many bytes (1Mi).
pub const MEMORY_REQUEST_ROUNDING_BINARY: i64 = 1 << 20;

/// Memory requests derived from a decimal limit are truncated to a multiple of
/// this many bytes (1M).
pub const MEMORY_REQUEST_ROUNDING_DECIMAL: i64 = 1_000_000;

/// Amount of memory that maps to one full core at 100%.
const CPU_BASE_MEMORY_BYTES: i128 = 1 << 30;

const MILLIS_PER_CORE: i128 = 1000;

/// Compute the overridden resources of a single container.
///
/// Containers without a (non-zero) memory limit are best-effort and come back
/// unchanged. Resource names other than CPU and memory are always preserved.
pub fn override_resources(
    resources: &ResourceRequirements,
    config: &ClusterResourceOverrideConfig,
    floor: &Floor,
) -> ResourceRequirements {
    let mut result = resources.clone();
    let Some(memory_limit) = memory_limit(resources) else {
        return result;
    };
    let memory_bytes = memory_limit.value().max(0);

    let cpu_limit = if config.limit_cpu_to_memory_percent > 0 {
        let millis = div_round_half_up(
            memory_bytes
                .saturating_mul(MILLIS_PER_CORE)
                .saturating_mul(i128::from(config.limit_cpu_to_memory_percent)),
            CPU_BASE_MEMORY_BYTES * 100,
        );
        let derived =
            Quantity::new_milli(millis.max(i128::from(CPU_FLOOR_MILLIS)), Format::DecimalSI);
        result
            .limits
            .insert(RESOURCE_CPU.to_string(), raise_to_floor(derived, floor.cpu));
        Some(derived)
    } else {
        resources.limits.get(RESOURCE_CPU).copied()
    };

    if config.cpu_request_to_limit_percent > 0 {
        if let Some(cpu_limit) = cpu_limit {
            let millis = cpu_limit
                .milli_value()
                .max(0)
                .saturating_mul(i128::from(config.cpu_request_to_limit_percent))
                / 100;
            let derived = Quantity::new_milli(
                millis.max(i128::from(CPU_FLOOR_MILLIS)),
                cpu_limit.format(),
            );
            result
                .requests
                .insert(RESOURCE_CPU.to_string(), raise_to_floor(derived, floor.cpu));
        }
    }

    if config.memory_request_to_limit_percent > 0 {
        let unit = i128::from(memory_request_rounding(memory_limit.format()));
        let bytes =
            memory_bytes.saturating_mul(i128::from(config.memory_request_to_limit_percent)) / 100;
        let bytes = (bytes / unit * unit).max(i128::from(MEMORY_FLOOR_BYTES));
        let derived = Quantity::new(bytes, memory_limit.format());
        result.requests.insert(
            RESOURCE_MEMORY.to_string(),
            raise_to_floor(derived, floor.memory),
        );
    }

    result
}

/// Returns true if the container has no memory limit and is left alone.
pub fn is_best_effort(resources: &ResourceRequirements) -> bool {
    memory_limit(resources).is_none()
}

fn memory_limit(resources: &ResourceRequirements) -> Option<Quantity> {
    resources
        .limits
        .get(RESOURCE_MEMORY)
        .filter(|q| !q.is_zero())
        .copied()
}

fn memory_request_rounding(format: Format) -> i64 {
    match format {
        Format::BinarySI => MEMORY_REQUEST_ROUNDING_BINARY,
        Format::DecimalSI | Format::DecimalExponent => MEMORY_REQUEST_ROUNDING_DECIMAL,
    }
}

fn raise_to_floor(value: Quantity, floor: Option<Quantity>) -> Quantity {
    match floor {
        Some(floor) if floor > value => floor,
        _ => value,
    }
}

// Operands are never negative here.
fn div_round_half_up(numerator: i128, denominator: i128) -> i128 {
    (numerator / denominator) + i128::from((numerator % denominator) * 2 >= denominator)
}

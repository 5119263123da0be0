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

//! Operation filter embedded by plugins to implement [`Interface::handles`].

use super::interfaces::{Interface, Operation};
use std::collections::HashSet;

/// Handler answers `handles` from a fixed set of operations.
#[derive(Debug, Clone, Default)]
pub struct Handler {
    operations: HashSet<Operation>,
}

impl Handler {
    pub fn new(operations: &[Operation]) -> Self {
        Self {
            operations: operations.iter().copied().collect(),
        }
    }

    /// Handler for Create and Update, the set most pod plugins need.
    pub fn new_create_update() -> Self {
        Self::new(&[Operation::Create, Operation::Update])
    }
}

impl Interface for Handler {
    fn handles(&self, operation: Operation) -> bool {
        self.operations.contains(&operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_new_create_update() {
        let handler = Handler::new_create_update();
        assert!(handler.handles(Operation::Create));
        assert!(handler.handles(Operation::Update));
        assert!(!handler.handles(Operation::Delete));
        assert!(!handler.handles(Operation::Connect));
    }

    #[test]
    fn test_handler_default_handles_nothing() {
        let handler = Handler::default();
        assert!(!handler.handles(Operation::Create));
    }
}

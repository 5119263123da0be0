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

//! Core admission controller interfaces.

use super::attributes::Attributes;
use super::errors::AdmissionResult;
use std::fmt;
use std::str::FromStr;

/// Operation is the type of resource operation being checked for admission control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Update,
    Delete,
    Connect,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "CREATE",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
            Operation::Connect => "CONNECT",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = String;

    /// Operations are matched case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CREATE" => Ok(Operation::Create),
            "UPDATE" => Ok(Operation::Update),
            "DELETE" => Ok(Operation::Delete),
            "CONNECT" => Ok(Operation::Connect),
            _ => Err(format!("unknown admission operation {:?}", s)),
        }
    }
}

/// Interface is an abstract, pluggable interface for Admission Control decisions.
pub trait Interface: Send + Sync {
    /// Returns true if this admission controller can handle the given operation.
    fn handles(&self, operation: Operation) -> bool;
}

/// MutationInterface is implemented by plugins that may change the admitted object.
pub trait MutationInterface: Interface {
    /// Admit makes an admission decision and may modify the object in the attributes.
    fn admit(&self, attributes: &mut dyn Attributes) -> AdmissionResult<()>;
}

/// ValidationInterface is implemented by plugins that check the final object.
/// Validation runs after every mutating plugin and must not modify the object.
pub trait ValidationInterface: Interface {
    fn validate(&self, attributes: &dyn Attributes) -> AdmissionResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_display() {
        assert_eq!(Operation::Create.to_string(), "CREATE");
        assert_eq!(Operation::Update.to_string(), "UPDATE");
        assert_eq!(Operation::Delete.to_string(), "DELETE");
        assert_eq!(Operation::Connect.to_string(), "CONNECT");
    }

    #[test]
    fn test_operation_from_str() {
        assert_eq!("CREATE".parse::<Operation>(), Ok(Operation::Create));
        assert_eq!("update".parse::<Operation>(), Ok(Operation::Update));
        assert_eq!("Delete".parse::<Operation>(), Ok(Operation::Delete));
        assert!("PATCH".parse::<Operation>().is_err());
    }
}

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

//! Admission error types.

use std::fmt;
use thiserror::Error;

/// Result type for admission operations.
pub type AdmissionResult<T> = Result<T, AdmissionError>;

/// AdmissionError represents errors that can occur during admission.
#[derive(Debug, Error)]
pub enum AdmissionError {
    /// BadRequest indicates a malformed request.
    #[error("{0}")]
    BadRequest(String),

    /// Forbidden indicates the request is not allowed.
    #[error("{0}")]
    Forbidden(ForbiddenError),

    /// Aggregate represents multiple errors.
    #[error("{0}")]
    Aggregate(AggregateError),

    /// Internal represents an internal error.
    #[error("internal error: {0}")]
    Internal(String),

    /// NotFound indicates a resource was not found.
    #[error("{kind} \"{name}\" not found")]
    NotFound { kind: String, name: String },

    /// Unavailable indicates cluster state needed for the decision could not
    /// be read. The request was neither allowed nor denied and may be retried.
    #[error("unable to read {resource} for namespace \"{namespace}\": {message}")]
    Unavailable {
        resource: String,
        namespace: String,
        message: String,
    },
}

impl AdmissionError {
    /// Create a new BadRequest error.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        AdmissionError::BadRequest(msg.into())
    }

    /// Create a new Forbidden error.
    pub fn forbidden(
        name: impl Into<String>,
        namespace: impl Into<String>,
        resource: impl Into<String>,
        field_error: FieldError,
    ) -> Self {
        AdmissionError::Forbidden(ForbiddenError {
            name: name.into(),
            namespace: namespace.into(),
            resource: resource.into(),
            field_error,
        })
    }

    /// Create an aggregate error from multiple errors.
    /// A single error is returned as-is rather than wrapped.
    pub fn aggregate(mut errors: Vec<AdmissionError>) -> Self {
        if errors.len() == 1 {
            return errors.remove(0);
        }
        AdmissionError::Aggregate(AggregateError { errors })
    }

    /// Create a NotFound error.
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        AdmissionError::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create an Internal error.
    pub fn internal_error(msg: impl Into<String>) -> Self {
        AdmissionError::Internal(msg.into())
    }

    /// Create an Unavailable error.
    pub fn unavailable(
        resource: impl Into<String>,
        namespace: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        AdmissionError::Unavailable {
            resource: resource.into(),
            namespace: namespace.into(),
            message: message.into(),
        }
    }

    /// Returns true if the caller may retry the same request and expect a
    /// different outcome once cluster state is readable again.
    pub fn is_retryable(&self) -> bool {
        match self {
            AdmissionError::Unavailable { .. } => true,
            AdmissionError::Aggregate(agg) => agg.errors.iter().any(|e| e.is_retryable()),
            _ => false,
        }
    }
}

/// ForbiddenError represents a forbidden admission error with field details.
#[derive(Debug)]
pub struct ForbiddenError {
    pub name: String,
    pub namespace: String,
    pub resource: String,
    pub field_error: FieldError,
}

impl fmt::Display for ForbiddenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} \"{}\" is forbidden: {}",
            self.resource, self.name, self.field_error
        )
    }
}

/// FieldError represents a field-level error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub error_type: FieldErrorType,
    pub value: String,
    pub detail: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_type {
            FieldErrorType::Required => write!(f, "{}: Required value", self.field)?,
            FieldErrorType::Forbidden => write!(f, "{}: Forbidden", self.field)?,
            FieldErrorType::Invalid => {
                write!(f, "{}: Invalid value: \"{}\"", self.field, self.value)?
            }
        }
        if !self.detail.is_empty() {
            write!(f, ": {}", self.detail)?;
        }
        Ok(())
    }
}

/// FieldErrorType represents the type of field error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldErrorType {
    /// Required indicates a required field is missing.
    Required,
    /// Invalid indicates an invalid value.
    Invalid,
    /// Forbidden indicates a value or combination that is not allowed.
    Forbidden,
}

/// AggregateError represents multiple errors.
#[derive(Debug)]
pub struct AggregateError {
    pub errors: Vec<AdmissionError>,
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let error_strings: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
        write!(f, "[{}]", error_strings.join(", "))
    }
}

/// Helper function to create an "invalid" field error.
pub fn field_invalid(field: &str, value: impl fmt::Display, detail: &str) -> FieldError {
    FieldError {
        field: field.to_string(),
        error_type: FieldErrorType::Invalid,
        value: value.to_string(),
        detail: detail.to_string(),
    }
}

/// Helper function to create a "forbidden" field error.
pub fn field_forbidden(field: &str, detail: &str) -> FieldError {
    FieldError {
        field: field.to_string(),
        error_type: FieldErrorType::Forbidden,
        value: String::new(),
        detail: detail.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forbidden_error_display() {
        let err = AdmissionError::forbidden(
            "test-pod",
            "default",
            "pods",
            field_invalid(
                "spec.containers[0].resources",
                "requests.cpu",
                "expected 500m, found 1",
            ),
        );
        assert_eq!(
            err.to_string(),
            "pods \"test-pod\" is forbidden: spec.containers[0].resources: \
             Invalid value: \"requests.cpu\": expected 500m, found 1"
        );
    }

    #[test]
    fn test_field_error_display() {
        assert_eq!(
            field_forbidden("ClusterResourceOverride", "no percentages were specified").to_string(),
            "ClusterResourceOverride: Forbidden: no percentages were specified"
        );
        let required = FieldError {
            field: "kind".to_string(),
            error_type: FieldErrorType::Required,
            value: String::new(),
            detail: String::new(),
        };
        assert_eq!(required.to_string(), "kind: Required value");
    }

    #[test]
    fn test_aggregate_error_display() {
        let errors = vec![
            AdmissionError::bad_request("error 1"),
            AdmissionError::bad_request("error 2"),
        ];
        let msg = AdmissionError::aggregate(errors).to_string();
        assert!(msg.starts_with('['));
        assert!(msg.ends_with(']'));
        assert!(msg.contains("error 1"));
        assert!(msg.contains("error 2"));
    }

    #[test]
    fn test_aggregate_of_one_is_unwrapped() {
        let err = AdmissionError::aggregate(vec![AdmissionError::bad_request("only")]);
        assert!(matches!(err, AdmissionError::BadRequest(_)));
    }

    #[test]
    fn test_retryable() {
        let unavailable = AdmissionError::unavailable("limitranges", "team-a", "cache not synced");
        assert!(unavailable.is_retryable());
        assert_eq!(
            unavailable.to_string(),
            "unable to read limitranges for namespace \"team-a\": cache not synced"
        );
        assert!(!AdmissionError::not_found("Namespace", "team-a").is_retryable());
        assert!(AdmissionError::aggregate(vec![
            AdmissionError::bad_request("x"),
            AdmissionError::unavailable("namespaces", "team-a", "timeout"),
        ])
        .is_retryable());
    }
}

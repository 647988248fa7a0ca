// Copyright 2024 Saptak Santra
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

//! Error types

use std::fmt;

/// Scheduling / tracking error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// A required host entry point was not registered
    CapabilityMissing { name: &'static str },

    /// A host entry point exists but has a different shape than expected
    CapabilityShape {
        name: &'static str,
        expected: &'static str,
    },

    /// The requested strategy cannot run on this host
    StrategyUnavailable(String),

    /// The isolated worker thread could not be started
    WorkerSpawn(String),

    /// The strategy refused a submission (e.g. after dispose)
    Rejected(String),

    /// A host primitive failed while accepting work
    Host(String),

    /// The feature is switched off in configuration
    FeatureDisabled(String),

    /// Configuration failed to parse or validate
    InvalidConfig(String),

    /// IO error
    Io(String),
}

impl SyncError {
    /// Whether this error aborts construction (as opposed to a logged runtime failure)
    pub fn is_initialization(&self) -> bool {
        matches!(
            self,
            SyncError::CapabilityMissing { .. }
                | SyncError::CapabilityShape { .. }
                | SyncError::StrategyUnavailable(_)
                | SyncError::WorkerSpawn(_)
                | SyncError::FeatureDisabled(_)
                | SyncError::InvalidConfig(_)
        )
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::CapabilityMissing { name } => {
                write!(f, "Host entry point not found: {name}")
            }
            SyncError::CapabilityShape { name, expected } => {
                write!(f, "Host entry point {name} has unexpected shape (expected {expected})")
            }
            SyncError::StrategyUnavailable(msg) => write!(f, "Strategy unavailable: {msg}"),
            SyncError::WorkerSpawn(msg) => write!(f, "Failed to start worker thread: {msg}"),
            SyncError::Rejected(msg) => write!(f, "Task rejected: {msg}"),
            SyncError::Host(msg) => write!(f, "Host error: {msg}"),
            SyncError::FeatureDisabled(msg) => write!(f, "Feature disabled: {msg}"),
            SyncError::InvalidConfig(msg) => write!(f, "Invalid configuration: {msg}"),
            SyncError::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for SyncError {}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::InvalidConfig(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, SyncError>;

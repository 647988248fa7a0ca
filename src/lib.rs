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

//! worldsync - host-agnostic task scheduling and entity world-change tracking
//!
//! One [`ExecutionStrategy`] contract over three host concurrency models
//! (single tick thread, region-affine threads, isolated worker thread), and a
//! [`WorldChangeTracker`] that polls joined entities and notifies their
//! clients whenever they move to another world.

pub mod capability;
pub mod config;
pub mod entity;
pub mod error;
pub mod global_serial;
pub mod isolated;
pub mod messaging;
pub mod prelude;
pub mod queue;
pub mod region_affine;
pub mod sim;
pub mod strategy;
pub mod task;
pub mod time;
pub mod tracked;
pub mod tracker;


pub use capability::*;
pub use config::*;
pub use entity::*;
pub use error::*;
pub use global_serial::*;
pub use isolated::*;
pub use messaging::*;
pub use queue::*;
pub use region_affine::*;
pub use strategy::*;
pub use task::*;
pub use time::*;
pub use tracked::*;
pub use tracker::*;

//! Resolves a pick query (ray, point or volume cast into a retained scene graph)
//! into an ordered list of hit records.
//!
//! The caller provides candidate geometry that already passed the coarse bounds
//! test. This crate rebuilds the scene path of every hit (through shared
//! subgraph instancing), collapses duplicated low-level records, optionally runs
//! the exact primitive test, and orders the result by distance.

mod aggregate;
pub use aggregate::*;

mod candidate;
pub use candidate::*;

mod error;
pub use error::*;

mod flags;
pub use flags::*;

mod graph;
pub use graph::*;

mod key;
pub use key::*;

mod path;
pub use path::*;

mod query;
pub use query::*;

mod record;
pub use record::*;

mod refine;
pub use refine::*;

pub mod scene;

mod shape;
pub use shape::*;

mod sort;
pub use sort::*;

#[cfg(test)]
mod test;

use std::{collections::VecDeque, fmt::Debug, hash::Hash, ops::Deref};

use cgmath::{InnerSpace, Matrix4, Point3, Transform, Vector3};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

//! From a tree and one character to a transmission graph.
//!
//! The stages, in pipeline order:
//! 1. [AncestralReconstruction] (e.g. [SankoffParsimony]) computes
//!    [StateLikelihoods] for every internal node
//! 2. [AncestralAssigner] picks one state per internal node
//!    (maximal likelihood, lowest state code on ties)
//! 3. [TransitionAggregator] counts `parent state -> child state` changes
//!    over all tree edges
//! 4. [GraphBuilder] turns the counts into a [TransmissionGraph] over all
//!    declared states of the character
//!
//! All stages fail with an [AnalysisError](crate::error::AnalysisError);
//! none of them recovers from partial input.

pub mod ancestral;
pub mod graph;
pub mod reconstruction;
pub mod transitions;

pub use ancestral::{AncestralAssigner, StateAssignment, StateLikelihoods, argmax_lowest};
pub use graph::{GraphBuilder, StateNode, TransitionEdge, TransmissionGraph};
pub use reconstruction::{AncestralReconstruction, SankoffParsimony};
pub use transitions::{Transition, TransitionAggregator, TransitionSet};

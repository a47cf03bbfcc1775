//! Caption Engine — batch validation and repair for machine-generated captions.
//!
//! Takes one batch of raw candidate lines from a remote generator and
//! corrects, scores, and re-renders them until they satisfy a strict,
//! machine-checkable contract: length buckets, punctuation shape,
//! required/forbidden words, hard-tag coverage, voice stencils, and
//! pop-culture freshness. The engine performs no I/O of its own; the
//! orchestrating application owns the generator and everything downstream.

pub mod core;
pub mod schema;

//! Pure crowd formation logic for the crowd runner.
//!
//! This crate contains the crowd rules that are independent of any ECS,
//! engine, or runtime. Functions take plain data and return results, making
//! them unit-testable and reusable from the simulation engine, headless
//! harnesses and tools alike.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Crowd tuning knobs, agent template, validation |
//! | [`deformation`] | Population count → spacing and member scale |
//! | [`formation`] | Grid slot math relative to the leader |
//! | [`gates`] | Operator gate arithmetic and value ranges |
//! | [`lod`] | Layout mode, rolling refresh cursor, distance culling |
//! | [`math`] | Vectors, quaternions, frame-rate independent smoothing |

pub mod config;
pub mod deformation;
pub mod formation;
pub mod gates;
pub mod lod;
pub mod math;

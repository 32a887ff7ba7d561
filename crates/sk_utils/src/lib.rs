#![doc = include_str!("../README.md")]

// -----------------------------------------------------------------------------
// Modules

mod typeid_map;

pub mod hash;

// -----------------------------------------------------------------------------
// Top-Level exports

pub use typeid_map::TypeIdMap;

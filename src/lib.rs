#![doc = include_str!("../README.md")]

pub use sk_sync as sync;
pub use sk_utils as utils;

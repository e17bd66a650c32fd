#![deny(unused_crate_dependencies)]

pub mod async_util;
pub mod backend;
pub mod config;
pub mod controller;
pub mod data;
pub mod drilling;
pub mod host;
pub mod logs;
pub mod resizing;
pub mod structure;

#[cfg(test)]
pub(crate) mod test_support;


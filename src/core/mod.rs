//! Core, platform independent networking code.

pub mod cache;
pub mod check;
pub mod dev;
pub mod reassembly;
pub mod repr;
pub mod service;
pub mod storage;
pub mod time;

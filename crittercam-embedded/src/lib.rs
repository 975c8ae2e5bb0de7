#![no_std]

extern crate alloc;

pub mod camera;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod network;
pub mod orchestrator;
pub mod power;
pub mod scheduler;
pub mod storage;

pub use error::*;

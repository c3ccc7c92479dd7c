#![cfg_attr(not(test), no_std)]

pub mod capture;
mod event;

pub use event::*;

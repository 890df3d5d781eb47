//! Core identifiers and synchronization primitives for the Muon serial drivers.
//!
//! This crate holds the host-testable pieces the drivers are built on: typed
//! identifiers for devices and interrupt lines, spin locks that are safe to
//! share with interrupt handlers, and a waker-based wait queue that lets an
//! interrupt handler resume suspended readers without blocking itself.
//!
//! With the `std` feature, [`sync::block_on`] and [`sync::block_on_deadline`]
//! drive those futures from ordinary threads by parking between polls.
//!
//! Everything here builds for `no_std` targets; tests run on the host with
//! `cargo test`.

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(missing_docs)]

extern crate alloc;

pub mod id;
pub mod sync;

#![no_std]

extern crate alloc;

// Behavior sequencing for a multi-mechanism robot.
//
// Sequences of sparse target states are multiplexed onto shared mechanisms
// by a controller that aborts conflicting work and starts successors only
// once the domains they claim are free. Nothing here touches hardware or a
// clock directly, so the same core runs on a host runtime or in tests.

pub mod controller;
pub mod domain;
pub mod repl;
pub mod runner;
pub mod sequence;
pub mod state;
pub mod subsystems;
pub mod telemetry;

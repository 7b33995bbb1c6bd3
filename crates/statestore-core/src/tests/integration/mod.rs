#![cfg(test)]

pub mod common;
pub mod save_round_tests;

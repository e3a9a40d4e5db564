// ABOUTME: Library crate for mapper-proxy exposing the routing core for the binary and tests

#![allow(missing_docs)]

pub mod config;
pub mod replay;
pub mod splitter;

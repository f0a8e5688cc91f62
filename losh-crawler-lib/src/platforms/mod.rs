//! Hosting platforms the crawler knows how to read.

pub mod wikifactory;

//! Webrig: a functional-test rig for web applications.
//!
//! Hosts a web application in an embedded server on a free local port,
//! drives it with a browser-emulation client and asserts on the pages it
//! returns. The server's listener can be paused and resumed without losing
//! application state.
//!
//! See `DESIGN.md` for the architecture.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod logging;

pub mod port;
pub mod server;

pub mod browser;

pub mod assertions;
pub mod fixture;

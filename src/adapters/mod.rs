//! Port implementations.
//!
//! `live` talks to the real world; `memory` holds deterministic doubles used
//! by the test suites.

pub mod live;
pub mod memory;

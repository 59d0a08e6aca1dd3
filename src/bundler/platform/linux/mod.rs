//! Linux packaging.
//!
//! # Build Requirements
//!
//! | Format | Required Tools |
//! |--------|----------------|
//! | .deb | `dpkg-deb` |
//!
//! The layout is plain filesystem work and runs anywhere; only the final
//! `dpkg-deb --build` needs a Debian toolchain.

pub mod debian;

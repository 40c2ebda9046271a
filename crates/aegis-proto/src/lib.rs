//! Generated RPC contract for the Core-A <-> Core-B control-plane channel.
//!
//! Re-exports the `tonic`/`prost` codegen output so both binaries depend on
//! one crate instead of each compiling the `.proto` file themselves.

tonic::include_proto!("aegis");

pub mod inner;


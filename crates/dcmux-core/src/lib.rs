//! dcmux-core — shared types for the datacenter RPC multiplexer:
//! part-length alignment, error taxonomy, call descriptors, configuration.
//! All other dcmux crates depend on this one.

pub mod align;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod files;

pub use align::{align_part_length, MAX_PART_SIZE, MIN_PART_SIZE};
pub use config::{MuxConfig, RetryPolicy};
pub use descriptor::{DecodeFn, FunctionDescription, RemoteCall};
pub use error::{RpcError, UploadPartError, VERIFICATION_ERROR_CODE};

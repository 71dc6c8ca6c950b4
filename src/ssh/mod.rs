//! SSH transport for the branch tunnel

mod gateway;
pub mod known_hosts;

pub use gateway::{BRANCH_PORT, SshGatewayDialer, parse_gateway};
pub use known_hosts::{VerifyResult, verify_gateway_key};

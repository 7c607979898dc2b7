//! Wire types of the Envoy external authorization protocol.
//!
//! Declared by hand with `prost` derives instead of generated from the Envoy
//! `.proto` tree. Only the fields this service reads or writes are declared;
//! tags match upstream so unknown fields are skipped on decode.

pub mod rpc;
pub mod v2;
pub mod v3;

/// `google.protobuf.BoolValue`
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct BoolValue {
    #[prost(bool, tag = "1")]
    pub value: bool,
}

impl From<bool> for BoolValue {
    fn from(value: bool) -> Self {
        Self { value }
    }
}

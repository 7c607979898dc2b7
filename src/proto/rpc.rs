//! `google.rpc` types.

/// `google.rpc.Status`, without `details`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Status {
    /// A `google.rpc.Code` value.
    #[prost(int32, tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub message: String,
}

impl From<tonic::Code> for Status {
    fn from(code: tonic::Code) -> Self {
        Self {
            code: code as i32,
            message: String::new(),
        }
    }
}

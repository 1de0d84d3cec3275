//! Serialization codecs for the dispatch protocol

pub mod json;

pub use json::JsonCodec;

use crate::{
    protocol::{error::DispatchError, operation::DispatchOperation},
    service::response::DispatchResponse,
};
use bytes::Bytes;

/// Codec trait for encoding and decoding dispatch protocol messages
pub trait Codec: Send + Sync {
    /// Serialize a dispatch operation to bytes for transport
    fn encode_request(&self, operation: &DispatchOperation) -> Result<Bytes, DispatchError>;

    /// Deserialize transport response bytes to a dispatch response
    ///
    /// The original operation is passed for context, since the expected
    /// response shape depends on it.
    fn decode_response(
        &self,
        body: &[u8],
        operation: &DispatchOperation,
    ) -> Result<DispatchResponse, DispatchError>;

    /// Get the content type for this codec
    fn content_type(&self) -> &str;
}

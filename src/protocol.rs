//! Vocabulary abstraction shared by the codec, correlator and client.
//!
//! The pooling and correlation machinery does not care which operations a
//! peer understands. A [`Protocol`] names the request, success and error
//! types of one vocabulary and tells the core where their `request_id`
//! lives.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::models::{
    CalculatorError, CalculatorRequest, CalculatorResponse, ErrorResponse, Request, Response,
};

/// A request/response/error vocabulary spoken over a connection.
pub trait Protocol: Send + Sync + 'static {
    type Request: Serialize + fmt::Debug + Send + Sync + 'static;
    type Response: DeserializeOwned + fmt::Debug + Send + 'static;
    type Error: DeserializeOwned + fmt::Debug + Send + 'static;

    fn request_id(request: &Self::Request) -> Option<&str>;

    fn set_request_id(request: &mut Self::Request, request_id: String);

    /// Identifier echoed by a success response, if the peer sent one.
    fn response_request_id(response: &Self::Response) -> Option<&str>;

    /// Build the error delivered to a caller whose reply could not be decoded.
    fn decode_failure(message: String) -> Self::Error;

    /// Build the error delivered to a caller whose reply was a binary frame.
    fn non_text_message() -> Self::Error;
}

/// Outcome of a call that got an answer from the peer.
///
/// Serializes as `{"data": ...}` or `{"error": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallResult<R, E> {
    Data(R),
    Error(E),
}

impl<R, E> CallResult<R, E> {
    pub fn is_data(&self) -> bool {
        matches!(self, CallResult::Data(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, CallResult::Error(_))
    }

    /// Convert into a `Result`, treating protocol errors as `Err`.
    pub fn into_result(self) -> Result<R, E> {
        match self {
            CallResult::Data(data) => Ok(data),
            CallResult::Error(error) => Err(error),
        }
    }
}

/// Result type for calls made with protocol `P`.
pub type CallResultOf<P> = CallResult<<P as Protocol>::Response, <P as Protocol>::Error>;

/// The table service vocabulary.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableProtocol;

impl Protocol for TableProtocol {
    type Request = Request;
    type Response = Response;
    type Error = ErrorResponse;

    fn request_id(request: &Request) -> Option<&str> {
        request.request_id()
    }

    fn set_request_id(request: &mut Request, request_id: String) {
        *request.request_id_mut() = Some(request_id);
    }

    fn response_request_id(response: &Response) -> Option<&str> {
        response.request_id()
    }

    fn decode_failure(message: String) -> ErrorResponse {
        ErrorResponse::BadRequest { message }
    }

    fn non_text_message() -> ErrorResponse {
        ErrorResponse::NonTextMessage
    }
}

/// The calculator service vocabulary.
#[derive(Debug, Clone, Copy, Default)]
pub struct CalculatorProtocol;

impl Protocol for CalculatorProtocol {
    type Request = CalculatorRequest;
    type Response = CalculatorResponse;
    type Error = CalculatorError;

    fn request_id(request: &CalculatorRequest) -> Option<&str> {
        request.request_id()
    }

    fn set_request_id(request: &mut CalculatorRequest, request_id: String) {
        *request.request_id_mut() = Some(request_id);
    }

    fn response_request_id(response: &CalculatorResponse) -> Option<&str> {
        response.request_id()
    }

    fn decode_failure(message: String) -> CalculatorError {
        CalculatorError::BadRequest { message }
    }

    fn non_text_message() -> CalculatorError {
        CalculatorError::NonTextMessage
    }
}

//! Tool-level errors for the pagemeta server.
//!
//! Store and engine failures arrive as [`pagemeta_core::Error`]; this type
//! covers problems with the tool call itself.

use rmcp::model::{ErrorCode, ErrorData as McpError};

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Parameters are individually valid but do not form a usable request.
    #[error("INVALID_PARAMS: {0}")]
    InvalidParams(String),

    /// The tool result could not be encoded.
    #[error("OUTPUT_FAILED: {0}")]
    Output(String),
}

impl From<ToolError> for McpError {
    fn from(err: ToolError) -> Self {
        let code = match &err {
            ToolError::InvalidParams(_) => -32602,
            ToolError::Output(_) => -32000,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}

use tracing::debug;

use crate::types::{ExecutionRequest, RejectReason};

/// Check a request against its length cap before any resources are taken.
///
/// Lengths are counted in characters. The stdin input shares the snippet's
/// cap. The snippet is passed as a command-line argument, so NUL bytes are
/// refused in both.
pub fn validate(request: &ExecutionRequest) -> Result<(), RejectReason> {
    let cap = request.limits.max_snippet_len;

    let snippet_len = request.snippet.chars().count();
    if snippet_len > cap {
        debug!(snippet_len, cap, "snippet too long");
        return Err(RejectReason::InputTooLong);
    }

    if let Some(input) = &request.input {
        let input_len = input.chars().count();
        if input_len > cap {
            debug!(input_len, cap, "input too long");
            return Err(RejectReason::InputTooLong);
        }
    }

    let has_nul = request.snippet.contains('\0')
        || request.input.as_deref().is_some_and(|input| input.contains('\0'));
    if has_nul {
        debug!("request contains a NUL byte");
        return Err(RejectReason::InvalidInput);
    }

    Ok(())
}

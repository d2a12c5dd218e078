//! Locally handled T-codes.

use crate::pipeline::CodeExecutor;
use crate::ControlError;
use gmux_code::Code;
use gmux_types::CodeResult;
use std::sync::Arc;

pub(crate) async fn try_handle(
    executor: &Arc<CodeExecutor>,
    _code: &mut Code,
) -> Result<Option<CodeResult>, ControlError> {
    // Simulated jobs do not move tools; everything else is the firmware's
    // business (tool macros run on the firmware's request).
    if executor.model().read().await.job.is_simulating {
        return Ok(Some(CodeResult::empty()));
    }
    Ok(None)
}

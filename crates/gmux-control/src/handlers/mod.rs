//! Internal code handlers.
//!
//! Dispatch is a pure switch on code type and major number. A handler
//! returns `Ok(Some(result))` to settle the code locally, `Ok(None)` to
//! defer it to the firmware, or an error to abort the pipeline. Transient
//! I/O failures never abort: they come back as error messages on the
//! result.
//!
//! Handlers that need quiescent firmware state flush their channel first
//! and treat a denied flush as cancellation.

mod gcodes;
mod mcodes;
mod tcodes;

use crate::heightmap::HeightMap;
use crate::paths::{FilePath, KnownDirectory};
use crate::pipeline::CodeExecutor;
use crate::ControlError;
use gmux_code::{Code, CodeType, UNNAMED_LETTER};
use gmux_types::CodeResult;
use std::sync::Arc;

/// Local interpretation of one code.
pub(crate) async fn try_handle(
    executor: &Arc<CodeExecutor>,
    code: &mut Code,
) -> Result<Option<CodeResult>, ControlError> {
    match code.code_type {
        CodeType::G => gcodes::try_handle(executor, code).await,
        CodeType::M => mcodes::try_handle(executor, code).await,
        CodeType::T => tcodes::try_handle(executor, code).await,
        _ => Ok(None),
    }
}

/// Handler-specific post-execution hooks.
pub(crate) async fn code_executed(
    executor: &Arc<CodeExecutor>,
    code: &mut Code,
) -> Result<(), ControlError> {
    if code.code_type == CodeType::M {
        mcodes::code_executed(executor, code).await?;
    }
    Ok(())
}

/// File-name argument of a code: the unnamed parameter, or `P`.
pub(super) fn file_name_of(code: &Code) -> Option<String> {
    code.parameter(UNNAMED_LETTER)
        .or_else(|| code.parameter('P'))
        .map(|p| p.value.clone())
}

/// Saves the firmware's height map to a file in the system directory.
pub(super) async fn save_height_map(
    executor: &Arc<CodeExecutor>,
    file_name: Option<String>,
) -> Result<CodeResult, ControlError> {
    let name = file_name.unwrap_or_else(|| "heightmap.csv".into());
    let dirs = executor.model().read().await.directories.clone();
    let physical = FilePath::resolve(&name, KnownDirectory::System, &dirs, executor.settings());

    let map = executor.firmware().get_height_map().await?;
    match map.save(&physical).await {
        Ok(()) => Ok(CodeResult::success(format!(
            "Height map saved to file {name}"
        ))),
        Err(e) => Ok(CodeResult::error(format!(
            "Failed to save height map to file {name}: {e}"
        ))),
    }
}

/// Loads a height map file and hands it to the firmware.
pub(super) async fn load_height_map(
    executor: &Arc<CodeExecutor>,
    file_name: Option<String>,
) -> Result<CodeResult, ControlError> {
    let name = file_name.unwrap_or_else(|| "heightmap.csv".into());
    let dirs = executor.model().read().await.directories.clone();
    let physical = FilePath::resolve(&name, KnownDirectory::System, &dirs, executor.settings());

    match HeightMap::load(&physical).await {
        Ok(map) => {
            executor.firmware().set_height_map(map).await?;
            Ok(CodeResult::success(format!(
                "Height map loaded from file {name}"
            )))
        }
        Err(ControlError::Io(e)) => Ok(CodeResult::error(format!(
            "Failed to load height map from file {name}: {e}"
        ))),
        Err(ControlError::Handler(reason)) => Ok(CodeResult::error(format!(
            "Failed to load height map from file {name}: {reason}"
        ))),
        Err(e) => Err(e),
    }
}

//! Locally handled G-codes.

use super::{load_height_map, save_height_map};
use crate::paths::{FilePath, KnownDirectory};
use crate::pipeline::CodeExecutor;
use crate::ControlError;
use gmux_code::Code;
use gmux_types::CodeResult;
use std::sync::Arc;

pub(crate) async fn try_handle(
    executor: &Arc<CodeExecutor>,
    code: &mut Code,
) -> Result<Option<CodeResult>, ControlError> {
    match code.major {
        // G29: mesh bed compensation.
        Some(29) => {
            let action = match code.parameter('S') {
                Some(p) => p.as_i32()?,
                None => 0,
            };
            match action {
                0 => {
                    // Probe via the mesh macro when one exists, otherwise
                    // let the firmware do its own probing.
                    let dirs = executor.model().read().await.directories.clone();
                    let mesh =
                        FilePath::resolve("mesh.g", KnownDirectory::System, &dirs, executor.settings());
                    if tokio::fs::metadata(&mesh).await.is_ok() {
                        executor.flush(code).await?;
                        let result = executor.run_macro(&mesh, code.channel, code.macro_id).await?;
                        Ok(Some(result))
                    } else {
                        Ok(None)
                    }
                }
                1 => {
                    executor.flush(code).await?;
                    let file = code.parameter('P').map(|p| p.value.clone());
                    Ok(Some(load_height_map(executor, file).await?))
                }
                2 => {
                    executor.flush(code).await?;
                    let file = code.parameter('P').map(|p| p.value.clone());
                    Ok(Some(save_height_map(executor, file).await?))
                }
                _ => Ok(None),
            }
        }
        _ => Ok(None),
    }
}

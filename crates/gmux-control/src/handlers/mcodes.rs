//! Locally handled M-codes.
//!
//! The switch below is the authoritative list of codes the daemon
//! interprets itself; everything else passes through to the firmware.
//! Post-execution side effects live in [`code_executed`].

use super::{file_name_of, load_height_map, save_height_map};
use crate::event_log::EventLogLevel;
use crate::model::{MachineStatus, PrintFile};
use crate::paths::{FilePath, KnownDirectory};
use crate::pipeline::CodeExecutor;
use crate::ControlError;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use gmux_code::{Code, CodeFlags};
use gmux_types::{CodeResult, Compatibility, Message};
use sha1::{Digest, Sha1};
use std::sync::Arc;

pub(crate) async fn try_handle(
    executor: &Arc<CodeExecutor>,
    code: &mut Code,
) -> Result<Option<CodeResult>, ControlError> {
    match code.major {
        Some(0 | 1) => cancel_print(executor, code).await,
        Some(20) => list_files(executor, code).await,
        Some(23) => select_file(executor, code, false).await,
        Some(24) => resume_print(executor).await,
        Some(25 | 226) => pause_print(executor, code).await,
        Some(26) => set_file_position(executor, code).await,
        Some(27) => report_print_status(executor).await,
        Some(28) => begin_file_write(executor, code).await,
        Some(29) => end_file_write(executor, code).await,
        Some(30) => delete_file(executor, code).await,
        Some(32) => select_file(executor, code, true).await,
        Some(36) => file_info(executor, code).await,
        Some(37) => simulate_file(executor, code).await,
        Some(38) => compute_sha1(executor, code).await,
        Some(39) => storage_info(executor, code).await,
        Some(112) => {
            // Immediate e-stop: no flush, no queueing.
            executor.firmware().emergency_stop().await?;
            executor.model().write().await.state.status = MachineStatus::Halted;
            Ok(Some(CodeResult::empty()))
        }
        Some(122) => diagnostics(executor, code),
        Some(291) => message_box(code),
        Some(374) => {
            executor.flush(code).await?;
            Ok(Some(save_height_map(executor, param_string(code, 'P')).await?))
        }
        Some(375) => {
            executor.flush(code).await?;
            Ok(Some(load_height_map(executor, param_string(code, 'P')).await?))
        }
        Some(470) => make_directory(executor, code).await,
        Some(471) => rename_path(executor, code).await,
        Some(500) => store_parameters(executor, code).await,
        Some(503) => report_configuration(executor).await,
        Some(505) => set_system_directory(executor, code).await,
        Some(550) => set_hostname(executor, code).await,
        Some(701) => load_filament(executor, code).await,
        Some(702) => unload_filament(executor, code).await,
        Some(703) => configure_filament(executor, code).await,
        Some(905) => set_date_time(executor, code).await,
        Some(929) => configure_event_log(executor, code).await,
        Some(997) => update_firmware(executor, code).await,
        Some(998) => Err(ControlError::NotSupported),
        Some(999) => {
            // Controller reset, dispatched directly like M112.
            executor.firmware().reset().await?;
            Ok(Some(CodeResult::empty()))
        }
        _ => Ok(None),
    }
}

/// Post-execution side effects, run only when the code succeeded and was
/// not resolved by an interceptor.
pub(crate) async fn code_executed(
    executor: &Arc<CodeExecutor>,
    code: &mut Code,
) -> Result<(), ControlError> {
    if !code.result.as_ref().is_some_and(CodeResult::is_successful) {
        return Ok(());
    }
    match code.major {
        // Resume dispatching the job file.
        Some(24 | 32 | 37) => {
            let mut model = executor.model().write().await;
            if model.job.file.is_some() {
                model.job.is_paused = false;
                model.state.status = if model.job.is_simulating {
                    MachineStatus::Simulating
                } else {
                    MachineStatus::Processing
                };
            }
        }
        Some(82) => {
            let mut model = executor.model().write().await;
            model.input_mut(code.channel).drives_relative = false;
        }
        Some(83) => {
            let mut model = executor.model().write().await;
            model.input_mut(code.channel).drives_relative = true;
        }
        // Append host diagnostics to the firmware's report.
        Some(122) => {
            if !code.flags.contains(CodeFlags::IS_INTERNALLY_PROCESSED) {
                let report = executor.diagnostics().report();
                if let Some(result) = code.result.as_mut() {
                    result.push(Message::success(report));
                }
            }
        }
        Some(555) => {
            if let Some(p) = code.parameter('P') {
                if let Some(compatibility) = Compatibility::from_m555(p.as_i32()?) {
                    let mut model = executor.model().write().await;
                    model.input_mut(code.channel).compatibility = compatibility;
                }
            }
        }
        _ => {}
    }
    Ok(())
}

fn param_string(code: &Code, letter: char) -> Option<String> {
    code.parameter(letter).map(|p| p.value.clone())
}

// ── M0/M1 ────────────────────────────────────────────────────

async fn cancel_print(
    executor: &Arc<CodeExecutor>,
    code: &Code,
) -> Result<Option<CodeResult>, ControlError> {
    executor.flush(code).await?;
    let mut model = executor.model().write().await;
    if let Some(file) = model.job.file.take() {
        model.job.last_file_name = Some(file.virtual_name);
        model.job.is_paused = false;
        model.job.is_simulating = false;
        model.job.file_position = None;
        model.state.status = MachineStatus::Idle;
    }
    // The firmware still gets to stop heaters and drives.
    Ok(None)
}

// ── M20 ──────────────────────────────────────────────────────

async fn list_files(
    executor: &Arc<CodeExecutor>,
    code: &Code,
) -> Result<Option<CodeResult>, ControlError> {
    let style = match code.parameter('S') {
        Some(p) => p.as_i32()?,
        None => 0,
    };
    let first = match code.parameter('R') {
        Some(p) => p.as_u32()? as usize,
        None => 0,
    };
    let (dirs, compatibility) = {
        let model = executor.model().read().await;
        (
            model.directories.clone(),
            model.input(code.channel).compatibility,
        )
    };
    let virtual_dir = param_string(code, 'P').unwrap_or_else(|| dirs.gcodes.clone());
    let physical = FilePath::resolve(&virtual_dir, KnownDirectory::GCodes, &dirs, executor.settings());

    let mut entries = Vec::new();
    let mut read_dir = match tokio::fs::read_dir(&physical).await {
        Ok(rd) => rd,
        Err(e) => {
            return Ok(Some(if style >= 2 {
                CodeResult::success(
                    serde_json::json!({
                        "dir": virtual_dir,
                        "first": first,
                        "files": [],
                        "next": 0,
                        "err": 2,
                    })
                    .to_string(),
                )
            } else {
                CodeResult::error(format!("Failed to list directory {virtual_dir}: {e}"))
            }));
        }
    };
    while let Ok(Some(entry)) = read_dir.next_entry().await {
        if let Ok(metadata) = entry.metadata().await {
            entries.push((
                entry.file_name().to_string_lossy().into_owned(),
                metadata.is_dir(),
                metadata.len(),
                metadata.modified().ok(),
            ));
        }
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    let entries: Vec<_> = entries.into_iter().skip(first).collect();

    let content = match style {
        3 => {
            let files: Vec<serde_json::Value> = entries
                .iter()
                .map(|(name, is_dir, size, modified)| {
                    serde_json::json!({
                        "type": if *is_dir { "d" } else { "f" },
                        "name": name,
                        "size": size,
                        "date": modified.map(format_timestamp),
                    })
                })
                .collect();
            serde_json::json!({
                "dir": virtual_dir,
                "first": first,
                "files": files,
                "next": 0,
                "err": 0,
            })
            .to_string()
        }
        2 => {
            let files: Vec<String> = entries
                .iter()
                .map(|(name, is_dir, ..)| {
                    if *is_dir {
                        format!("*{name}")
                    } else {
                        name.clone()
                    }
                })
                .collect();
            serde_json::json!({
                "dir": virtual_dir,
                "first": first,
                "files": files,
                "next": 0,
                "err": 0,
            })
            .to_string()
        }
        _ if compatibility.is_marlin_like() => {
            let mut out = String::from("Begin file list\n");
            for (name, ..) in &entries {
                out.push_str(name);
                out.push('\n');
            }
            out.push_str("End file list");
            out
        }
        _ => {
            let names: Vec<String> = entries
                .iter()
                .map(|(name, is_dir, ..)| {
                    if *is_dir {
                        format!("\"*{name}\"")
                    } else {
                        format!("\"{name}\"")
                    }
                })
                .collect();
            format!("GCode files:\n{}", names.join(","))
        }
    };
    Ok(Some(CodeResult::success(content)))
}

fn format_timestamp(time: std::time::SystemTime) -> String {
    chrono::DateTime::<chrono::Local>::from(time)
        .format("%Y-%m-%dT%H:%M:%S")
        .to_string()
}

// ── M23 / M32 ────────────────────────────────────────────────

async fn select_file(
    executor: &Arc<CodeExecutor>,
    code: &Code,
    start: bool,
) -> Result<Option<CodeResult>, ControlError> {
    let Some(name) = file_name_of(code) else {
        return Ok(Some(CodeResult::error("Missing file name")));
    };
    executor.flush(code).await?;

    let dirs = executor.model().read().await.directories.clone();
    let physical = FilePath::resolve(&name, KnownDirectory::GCodes, &dirs, executor.settings());
    let metadata = match tokio::fs::metadata(&physical).await {
        Ok(m) if m.is_file() => m,
        _ => {
            return Ok(Some(CodeResult::error(format!(
                "Could not find file {name}"
            ))))
        }
    };
    let virtual_name = FilePath::to_virtual(&physical, executor.settings());

    let mut model = executor.model().write().await;
    if matches!(
        model.state.status,
        MachineStatus::Processing | MachineStatus::Simulating
    ) {
        return Ok(Some(CodeResult::error(
            "Cannot set file to print, because a file is already being printed",
        )));
    }
    model.job.file = Some(PrintFile {
        file_name: physical.display().to_string(),
        virtual_name: virtual_name.clone(),
        size: metadata.len(),
    });
    model.job.file_position = Some(0);
    model.job.is_paused = false;
    model.job.is_simulating = false;
    if start {
        model.job.last_file_name = Some(virtual_name.clone());
    }
    Ok(Some(CodeResult::success(format!(
        "File {virtual_name} selected for printing"
    ))))
}

// ── M24 / M25 / M226 ─────────────────────────────────────────

async fn resume_print(executor: &Arc<CodeExecutor>) -> Result<Option<CodeResult>, ControlError> {
    let model = executor.model().read().await;
    if model.job.file.is_none() {
        return Ok(Some(CodeResult::error(
            "Cannot print, because no file is selected!",
        )));
    }
    // Forwarded to the firmware; the job resumes in the post hook.
    Ok(None)
}

async fn pause_print(
    executor: &Arc<CodeExecutor>,
    code: &Code,
) -> Result<Option<CodeResult>, ControlError> {
    executor.flush(code).await?;
    let mut model = executor.model().write().await;
    if model.job.file.is_none() {
        return Ok(Some(CodeResult::error(
            "Cannot pause print, because no file is being printed!",
        )));
    }
    model.job.is_paused = true;
    model.state.status = MachineStatus::Paused;
    Ok(None)
}

// ── M26 / M27 ────────────────────────────────────────────────

async fn set_file_position(
    executor: &Arc<CodeExecutor>,
    code: &Code,
) -> Result<Option<CodeResult>, ControlError> {
    let mut model = executor.model().write().await;
    let Some(file) = model.job.file.as_ref() else {
        return Ok(Some(CodeResult::error("Not printing a file")));
    };
    if let Some(p) = code.parameter('S') {
        let position = u64::from(p.as_u32()?);
        if position > file.size {
            return Ok(Some(CodeResult::error(
                "Position is beyond the end of the file",
            )));
        }
        model.job.file_position = Some(position);
    }
    Ok(Some(CodeResult::empty()))
}

async fn report_print_status(
    executor: &Arc<CodeExecutor>,
) -> Result<Option<CodeResult>, ControlError> {
    let model = executor.model().read().await;
    let content = match &model.job.file {
        Some(file) => format!(
            "SD printing byte {}/{}",
            model.job.file_position.unwrap_or(0),
            file.size
        ),
        None => "Not SD printing.".into(),
    };
    Ok(Some(CodeResult::success(content)))
}

// ── M28 / M29 ────────────────────────────────────────────────

async fn begin_file_write(
    executor: &Arc<CodeExecutor>,
    code: &Code,
) -> Result<Option<CodeResult>, ControlError> {
    let Some(name) = file_name_of(code) else {
        return Ok(Some(CodeResult::error("Missing file name")));
    };
    let slot = executor.scheduler().capture_slot(code.channel);
    let mut guard = slot.lock().await;
    if guard.is_some() {
        return Ok(Some(CodeResult::error(
            "Another file is already being written to",
        )));
    }
    let dirs = executor.model().read().await.directories.clone();
    let physical = FilePath::resolve(&name, KnownDirectory::GCodes, &dirs, executor.settings());
    let virtual_name = FilePath::to_virtual(&physical, executor.settings());
    match crate::capture::CaptureWriter::create(physical, virtual_name.clone()).await {
        Ok(writer) => {
            *guard = Some(writer);
            Ok(Some(CodeResult::success(format!(
                "Writing to file: {virtual_name}"
            ))))
        }
        Err(e) => Ok(Some(CodeResult::error(format!(
            "Failed to open file {name}: {e}"
        )))),
    }
}

async fn end_file_write(
    executor: &Arc<CodeExecutor>,
    code: &Code,
) -> Result<Option<CodeResult>, ControlError> {
    let slot = executor.scheduler().capture_slot(code.channel);
    let writer = slot.lock().await.take();
    match writer {
        Some(writer) => match writer.finish().await {
            Ok(_) => Ok(Some(CodeResult::success("Done saving file."))),
            Err(e) => Ok(Some(CodeResult::error(format!(
                "Failed to finish writing file: {e}"
            )))),
        },
        // No capture in progress; the firmware may still care.
        None => Ok(None),
    }
}

// ── M30 ──────────────────────────────────────────────────────

async fn delete_file(
    executor: &Arc<CodeExecutor>,
    code: &Code,
) -> Result<Option<CodeResult>, ControlError> {
    let Some(name) = file_name_of(code) else {
        return Ok(Some(CodeResult::error("Missing file name")));
    };
    let dirs = executor.model().read().await.directories.clone();
    let physical = FilePath::resolve(&name, KnownDirectory::GCodes, &dirs, executor.settings());
    match tokio::fs::remove_file(&physical).await {
        Ok(()) => Ok(Some(CodeResult::empty())),
        Err(e) => Ok(Some(CodeResult::error(format!(
            "Failed to delete file {name}: {e}"
        )))),
    }
}

// ── M36 / M37 / M38 / M39 ────────────────────────────────────

async fn file_info(
    executor: &Arc<CodeExecutor>,
    code: &Code,
) -> Result<Option<CodeResult>, ControlError> {
    let name = match file_name_of(code) {
        Some(name) => name,
        None => {
            let model = executor.model().read().await;
            match &model.job.file {
                Some(file) => file.virtual_name.clone(),
                None => {
                    return Ok(Some(CodeResult::success(
                        serde_json::json!({ "err": 1 }).to_string(),
                    )))
                }
            }
        }
    };
    let dirs = executor.model().read().await.directories.clone();
    let physical = FilePath::resolve(&name, KnownDirectory::GCodes, &dirs, executor.settings());
    let content = match tokio::fs::metadata(&physical).await {
        Ok(metadata) if metadata.is_file() => serde_json::json!({
            "err": 0,
            "fileName": FilePath::to_virtual(&physical, executor.settings()),
            "size": metadata.len(),
            "lastModified": metadata.modified().ok().map(format_timestamp),
        })
        .to_string(),
        _ => serde_json::json!({ "err": 1 }).to_string(),
    };
    Ok(Some(CodeResult::success(content)))
}

async fn simulate_file(
    executor: &Arc<CodeExecutor>,
    code: &Code,
) -> Result<Option<CodeResult>, ControlError> {
    if code.parameter('P').is_none() {
        return Ok(None);
    }
    let result = select_file(executor, code, false).await?;
    if let Some(result) = result {
        if result.is_successful() {
            let mut model = executor.model().write().await;
            model.job.is_simulating = true;
            let file = model.job.file.as_ref().map(|f| f.virtual_name.clone());
            if let Some(file) = file {
                return Ok(Some(CodeResult::success(format!("Simulating file {file}"))));
            }
        }
        return Ok(Some(result));
    }
    Ok(None)
}

async fn compute_sha1(
    executor: &Arc<CodeExecutor>,
    code: &Code,
) -> Result<Option<CodeResult>, ControlError> {
    let Some(name) = file_name_of(code) else {
        return Ok(Some(CodeResult::error("Missing file name")));
    };
    let dirs = executor.model().read().await.directories.clone();
    // Hash the resolved physical file, not the virtual name.
    let physical = FilePath::resolve(&name, KnownDirectory::GCodes, &dirs, executor.settings());
    match tokio::fs::read(&physical).await {
        Ok(content) => {
            let digest = tokio::task::spawn_blocking(move || {
                let mut hasher = Sha1::new();
                hasher.update(&content);
                hex::encode(hasher.finalize())
            })
            .await
            .map_err(|e| ControlError::Handler(format!("hash task failed: {e}")))?;
            Ok(Some(CodeResult::success(digest)))
        }
        Err(e) => Ok(Some(CodeResult::error(format!(
            "Failed to open file {name}: {e}"
        )))),
    }
}

async fn storage_info(
    executor: &Arc<CodeExecutor>,
    code: &Code,
) -> Result<Option<CodeResult>, ControlError> {
    let slot = match code.parameter('P') {
        Some(p) => p.as_i32()?,
        None => 0,
    };
    let present = slot == 0 && executor.settings().base_directory.exists();
    let json = matches!(code.parameter('S').map(|p| p.as_i32()), Some(Ok(2)));
    let content = if json {
        serde_json::json!({
            "SDinfo": { "slot": slot, "present": present }
        })
        .to_string()
    } else if present {
        format!("SD card in slot {slot}: detected")
    } else {
        format!("SD card in slot {slot}: not detected")
    };
    Ok(Some(CodeResult::success(content)))
}

// ── M122 / M291 ──────────────────────────────────────────────

fn diagnostics(
    executor: &Arc<CodeExecutor>,
    code: &Code,
) -> Result<Option<CodeResult>, ControlError> {
    let host_only = code
        .parameters
        .iter()
        .any(|p| p.quoted && p.value.eq_ignore_ascii_case("dsf"));
    if host_only {
        return Ok(Some(CodeResult::success(executor.diagnostics().report())));
    }
    // Forwarded; the post hook appends the host diagnostics.
    Ok(None)
}

fn message_box(code: &Code) -> Result<Option<CodeResult>, ControlError> {
    let mode = match code.parameter('S') {
        Some(p) => p.as_i32()?,
        None => 1,
    };
    if mode >= 2 {
        // Blocking message boxes would require acknowledgement routing the
        // firmware cannot deliver through this transport.
        return Err(ControlError::NotSupported);
    }
    Ok(None)
}

// ── M470 / M471 ──────────────────────────────────────────────

async fn make_directory(
    executor: &Arc<CodeExecutor>,
    code: &Code,
) -> Result<Option<CodeResult>, ControlError> {
    let Some(name) = param_string(code, 'P') else {
        return Ok(Some(CodeResult::error("Missing directory name")));
    };
    let dirs = executor.model().read().await.directories.clone();
    let physical = FilePath::resolve(&name, KnownDirectory::GCodes, &dirs, executor.settings());
    match tokio::fs::create_dir_all(&physical).await {
        Ok(()) => Ok(Some(CodeResult::empty())),
        Err(e) => Ok(Some(CodeResult::error(format!(
            "Failed to create directory {name}: {e}"
        )))),
    }
}

async fn rename_path(
    executor: &Arc<CodeExecutor>,
    code: &Code,
) -> Result<Option<CodeResult>, ControlError> {
    let Some(from) = param_string(code, 'S') else {
        return Ok(Some(CodeResult::error("Missing source path")));
    };
    let Some(to) = param_string(code, 'T') else {
        return Ok(Some(CodeResult::error("Missing target path")));
    };
    let delete_existing = match code.parameter('D') {
        Some(p) => p.as_bool()?,
        None => false,
    };

    let dirs = executor.model().read().await.directories.clone();
    let from_physical = FilePath::resolve(&from, KnownDirectory::GCodes, &dirs, executor.settings());
    let to_physical = FilePath::resolve(&to, KnownDirectory::GCodes, &dirs, executor.settings());

    if tokio::fs::metadata(&from_physical).await.is_err() {
        return Ok(Some(CodeResult::error(format!(
            "File or directory {from} not found"
        ))));
    }
    if let Ok(existing) = tokio::fs::metadata(&to_physical).await {
        if !delete_existing {
            return Ok(Some(CodeResult::error(format!(
                "Target {to} already exists"
            ))));
        }
        let removed = if existing.is_dir() {
            tokio::fs::remove_dir_all(&to_physical).await
        } else {
            tokio::fs::remove_file(&to_physical).await
        };
        if let Err(e) = removed {
            return Ok(Some(CodeResult::error(format!(
                "Failed to replace {to}: {e}"
            ))));
        }
    }
    match tokio::fs::rename(&from_physical, &to_physical).await {
        Ok(()) => Ok(Some(CodeResult::empty())),
        Err(e) => Ok(Some(CodeResult::error(format!(
            "Failed to rename {from} to {to}: {e}"
        )))),
    }
}

// ── M500 / M503 / M505 / M550 ────────────────────────────────

async fn store_parameters(
    executor: &Arc<CodeExecutor>,
    code: &Code,
) -> Result<Option<CodeResult>, ControlError> {
    executor.flush(code).await?;
    let (dirs, hostname) = {
        let model = executor.model().read().await;
        (model.directories.clone(), model.network.hostname.clone())
    };
    let physical = FilePath::resolve(
        &executor.settings().config_override,
        KnownDirectory::System,
        &dirs,
        executor.settings(),
    );
    let content = format!(
        "; configuration overrides saved by M500\nM550 P\"{hostname}\"\n"
    );
    if let Some(parent) = physical.parent() {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            return Ok(Some(CodeResult::error(format!(
                "Failed to store parameters: {e}"
            ))));
        }
    }
    match tokio::fs::write(&physical, content).await {
        Ok(()) => Ok(Some(CodeResult::empty())),
        Err(e) => Ok(Some(CodeResult::error(format!(
            "Failed to store parameters: {e}"
        )))),
    }
}

async fn report_configuration(
    executor: &Arc<CodeExecutor>,
) -> Result<Option<CodeResult>, ControlError> {
    let dirs = executor.model().read().await.directories.clone();
    let physical = FilePath::resolve("config.g", KnownDirectory::System, &dirs, executor.settings());
    match tokio::fs::read_to_string(&physical).await {
        Ok(content) => Ok(Some(CodeResult::success(content))),
        Err(_) => Ok(Some(CodeResult::error("Configuration file not found"))),
    }
}

async fn set_system_directory(
    executor: &Arc<CodeExecutor>,
    code: &Code,
) -> Result<Option<CodeResult>, ControlError> {
    let Some(path) = param_string(code, 'P') else {
        let dirs = executor.model().read().await.directories.clone();
        return Ok(Some(CodeResult::success(format!(
            "System directory: {}",
            dirs.system
        ))));
    };
    let normalized = if path.starts_with("0:/") {
        path
    } else {
        format!("0:/{}", path.trim_start_matches('/'))
    };
    executor.model().write().await.directories.system = normalized;
    Ok(Some(CodeResult::empty()))
}

async fn set_hostname(
    executor: &Arc<CodeExecutor>,
    code: &Code,
) -> Result<Option<CodeResult>, ControlError> {
    let Some(name) = param_string(code, 'P') else {
        let hostname = executor.model().read().await.network.hostname.clone();
        return Ok(Some(CodeResult::success(format!("Hostname: {hostname}"))));
    };
    let valid = !name.is_empty()
        && name.len() <= 40
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !valid {
        return Ok(Some(CodeResult::error(format!("Invalid hostname {name}"))));
    }
    executor.model().write().await.network.hostname = name;
    Ok(Some(CodeResult::empty()))
}

// ── M701 / M702 / M703 ───────────────────────────────────────

async fn load_filament(
    executor: &Arc<CodeExecutor>,
    code: &Code,
) -> Result<Option<CodeResult>, ControlError> {
    executor.wait_for_model_sync(code).await?;
    let Some(name) = param_string(code, 'S') else {
        return Ok(Some(CodeResult::error("Missing filament name")));
    };
    let dirs = executor.model().read().await.directories.clone();
    let directory = FilePath::resolve(&name, KnownDirectory::Filaments, &dirs, executor.settings());
    match tokio::fs::metadata(&directory).await {
        Ok(metadata) if metadata.is_dir() => {}
        _ => {
            return Ok(Some(CodeResult::error(format!(
                "Filament {name} does not exist"
            ))))
        }
    }

    let mut model = executor.model().write().await;
    match model.current_tool_mut() {
        Some(tool) => {
            tool.filament = Some(name);
            // The firmware performs the actual feed moves.
            Ok(None)
        }
        None => Ok(Some(CodeResult::error("No tool selected"))),
    }
}

async fn unload_filament(
    executor: &Arc<CodeExecutor>,
    code: &Code,
) -> Result<Option<CodeResult>, ControlError> {
    executor.wait_for_model_sync(code).await?;
    let mut model = executor.model().write().await;
    match model.current_tool_mut() {
        Some(tool) => {
            tool.filament = None;
            Ok(None)
        }
        None => Ok(Some(CodeResult::error("No tool selected"))),
    }
}

async fn configure_filament(
    executor: &Arc<CodeExecutor>,
    code: &mut Code,
) -> Result<Option<CodeResult>, ControlError> {
    executor.wait_for_model_sync(code).await?;
    let filament = {
        let model = executor.model().read().await;
        model.current_tool().and_then(|t| t.filament.clone())
    };
    let Some(filament) = filament else {
        return Ok(Some(CodeResult::error("No filament loaded")));
    };
    let dirs = executor.model().read().await.directories.clone();
    let config = FilePath::resolve(
        &format!("{filament}/config.g"),
        KnownDirectory::Filaments,
        &dirs,
        executor.settings(),
    );
    if tokio::fs::metadata(&config).await.is_ok() {
        executor.flush(code).await?;
        let result = executor.run_macro(&config, code.channel, code.macro_id).await?;
        Ok(Some(result))
    } else {
        Ok(Some(CodeResult::empty()))
    }
}

// ── M905 / M929 ──────────────────────────────────────────────

async fn set_date_time(
    executor: &Arc<CodeExecutor>,
    code: &Code,
) -> Result<Option<CodeResult>, ControlError> {
    let date = param_string(code, 'P');
    let time = param_string(code, 'S');
    if date.is_none() && time.is_none() {
        let current = executor.model().read().await.state.date_time;
        let content = match current {
            Some(dt) => format!("Current date and time: {}", dt.format("%Y-%m-%d %H:%M:%S")),
            None => "Clock not set".into(),
        };
        return Ok(Some(CodeResult::success(content)));
    }

    let mut model = executor.model().write().await;
    let mut current = model.state.date_time.unwrap_or(
        NaiveDateTime::new(
            NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default(),
            NaiveTime::default(),
        ),
    );
    if let Some(date) = date {
        match NaiveDate::parse_from_str(&date, "%Y-%m-%d") {
            Ok(parsed) => current = NaiveDateTime::new(parsed, current.time()),
            Err(_) => return Ok(Some(CodeResult::error(format!("Invalid date {date}")))),
        }
    }
    if let Some(time) = time {
        match NaiveTime::parse_from_str(&time, "%H:%M:%S") {
            Ok(parsed) => current = NaiveDateTime::new(current.date(), parsed),
            Err(_) => return Ok(Some(CodeResult::error(format!("Invalid time {time}")))),
        }
    }
    model.state.date_time = Some(current);
    Ok(Some(CodeResult::empty()))
}

async fn configure_event_log(
    executor: &Arc<CodeExecutor>,
    code: &Code,
) -> Result<Option<CodeResult>, ControlError> {
    let file = param_string(code, 'P');
    let level = match code.parameter('S') {
        Some(p) => match EventLogLevel::from_m929(p.as_i32()?) {
            Some(level) => level,
            None => return Ok(Some(CodeResult::error("Invalid log level"))),
        },
        None if file.is_some() => EventLogLevel::Warn,
        None => EventLogLevel::Off,
    };

    if level == EventLogLevel::Off {
        executor.event_log().stop().await;
        executor.model().write().await.state.log_file = None;
        return Ok(Some(CodeResult::empty()));
    }

    let name = file.unwrap_or_else(|| "eventlog.txt".into());
    let dirs = executor.model().read().await.directories.clone();
    let physical = FilePath::resolve(&name, KnownDirectory::System, &dirs, executor.settings());
    let virtual_name = FilePath::to_virtual(&physical, executor.settings());
    match executor
        .event_log()
        .start(physical, virtual_name.clone(), level)
        .await
    {
        Ok(()) => {
            executor.model().write().await.state.log_file = Some(virtual_name);
            Ok(Some(CodeResult::empty()))
        }
        Err(e) => Ok(Some(CodeResult::error(format!(
            "Failed to open event log file {name}: {e}"
        )))),
    }
}

// ── M997 ─────────────────────────────────────────────────────

async fn update_firmware(
    executor: &Arc<CodeExecutor>,
    code: &Code,
) -> Result<Option<CodeResult>, ControlError> {
    let modules = match code.parameter('S') {
        Some(p) => p.as_i32_vec()?,
        None => vec![0],
    };
    if modules.iter().any(|&m| m != 0) {
        return Ok(Some(CodeResult::error(
            "Only firmware module 0 can be updated",
        )));
    }

    let dirs = executor.model().read().await.directories.clone();
    let iap = FilePath::resolve(
        &executor.settings().iap_file,
        KnownDirectory::Firmware,
        &dirs,
        executor.settings(),
    );
    let firmware = FilePath::resolve(
        &executor.settings().firmware_file,
        KnownDirectory::Firmware,
        &dirs,
        executor.settings(),
    );
    if tokio::fs::metadata(&iap).await.is_err() {
        return Ok(Some(CodeResult::error(format!(
            "Failed to find IAP file {}",
            FilePath::to_virtual(&iap, executor.settings())
        ))));
    }
    if tokio::fs::metadata(&firmware).await.is_err() {
        return Ok(Some(CodeResult::error(format!(
            "Failed to find firmware file {}",
            FilePath::to_virtual(&firmware, executor.settings())
        ))));
    }

    executor.flush(code).await?;
    executor.model().write().await.state.status = MachineStatus::Updating;
    let iap_content = tokio::fs::read(&iap).await?;
    let firmware_content = tokio::fs::read(&firmware).await?;
    let update = executor
        .firmware()
        .update_firmware(iap_content, firmware_content)
        .await;
    executor.model().write().await.state.status = MachineStatus::Idle;
    update?;
    Ok(Some(CodeResult::empty()))
}

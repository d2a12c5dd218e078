//! End-to-end pipeline behavior: local handling, forwarding, framing,
//! error policy.

mod common;

use common::{text, Rig};
use gmux_code::{Code, CodeParserError};
use gmux_control::ControlError;
use gmux_types::{CodeChannel, CodeResult, Compatibility, MessageType};

#[tokio::test]
async fn unknown_codes_are_forwarded() {
    let rig = Rig::new();
    rig.firmware
        .script("M115", CodeResult::success("FIRMWARE_NAME: test"));

    let result = rig.run_ok("M115", CodeChannel::Sbc).await;
    assert!(result.is_successful());
    assert_eq!(text(&result), "FIRMWARE_NAME: test\n");
    assert_eq!(rig.firmware.sent(), vec!["M115".to_string()]);
}

#[tokio::test]
async fn comments_produce_empty_results_without_firmware() {
    let rig = Rig::new();
    let result = rig.run_ok("; just chatter", CodeChannel::Http).await;
    assert!(result.is_empty());
    assert!(rig.firmware.sent().is_empty());
}

#[tokio::test]
async fn host_diagnostics_skip_the_firmware() {
    let rig = Rig::new();
    // Warm the counters up with one forwarded code.
    rig.run_ok("G4 S0", CodeChannel::Usb).await;

    let result = rig.run_ok("M122 B0 \"DSF\"", CodeChannel::Usb).await;
    let report = text(&result);
    assert!(report.contains("Control daemon diagnostics"));
    assert!(report.contains("Codes executed:"));
    // Only the warm-up reached the transport.
    assert_eq!(rig.firmware.sent(), vec!["G4 S0".to_string()]);
}

#[tokio::test]
async fn forwarded_diagnostics_get_host_report_appended() {
    let rig = Rig::new();
    rig.firmware
        .script("M122", CodeResult::success("=== Firmware ==="));

    let result = rig.run_ok("M122", CodeChannel::Http).await;
    let content = text(&result);
    assert!(content.contains("=== Firmware ==="));
    assert!(content.contains("Control daemon diagnostics"));
}

#[tokio::test]
async fn not_supported_codes_become_error_results() {
    let rig = Rig::new();
    let result = rig.run_ok("M998", CodeChannel::Telnet).await;
    assert!(!result.is_successful());
    let content = text(&result);
    assert!(content.contains("M998: Code is not supported"));
    assert!(rig.firmware.sent().is_empty());
}

#[tokio::test]
async fn emergency_stop_bypasses_flush() {
    let rig = Rig::new();
    rig.firmware.set_flush_ok(false); // a flush would cancel
    let result = rig.run_ok("M112", CodeChannel::Usb).await;
    assert!(result.is_successful());
    assert_eq!(rig.firmware.emergency_stops(), 1);
    assert_eq!(rig.firmware.flushes(), 0);
    assert!(rig.firmware.sent().is_empty());

    let result = rig.run_ok("M999", CodeChannel::Usb).await;
    assert!(result.is_successful());
    assert_eq!(rig.firmware.resets(), 1);
}

#[tokio::test]
async fn marlin_framing_is_applied_per_channel() {
    let rig = Rig::new();
    rig.firmware.script("M105", CodeResult::success("T:25.0"));

    // USB defaults to Marlin.
    let result = rig.run_ok("M105", CodeChannel::Usb).await;
    assert_eq!(text(&result), "ok T:25.0");

    // HTTP defaults to RepRapFirmware: newline only.
    let result = rig.run_ok("M105", CodeChannel::Http).await;
    assert_eq!(text(&result), "T:25.0\n");
}

#[tokio::test]
async fn m555_switches_channel_compatibility() {
    let rig = Rig::new();
    rig.run_ok("M555 P2", CodeChannel::Telnet).await;
    assert_eq!(
        rig.executor.model().compatibility(CodeChannel::Telnet).await,
        Compatibility::Marlin
    );

    // Forwarded to the firmware as well.
    assert_eq!(rig.firmware.sent(), vec!["M555 P2".to_string()]);
}

#[tokio::test]
async fn relative_extrusion_follows_m82_m83() {
    let rig = Rig::new();
    rig.run_ok("M83", CodeChannel::File).await;
    assert!(
        rig.executor
            .model()
            .read()
            .await
            .input(CodeChannel::File)
            .drives_relative
    );

    rig.run_ok("M82", CodeChannel::File).await;
    assert!(
        !rig.executor
            .model()
            .read()
            .await
            .input(CodeChannel::File)
            .drives_relative
    );
}

#[tokio::test]
async fn echo_evaluates_against_the_model() {
    let rig = Rig::new();
    let result = rig
        .run_ok("echo \"host: \" ^ network.hostname", CodeChannel::Sbc)
        .await;
    assert_eq!(text(&result), "host: gmux\n");
    assert!(rig.firmware.sent().is_empty());
    // Echo waits for quiescent firmware state first.
    assert_eq!(rig.firmware.flushes(), 1);
}

#[tokio::test]
async fn expression_parameters_are_evaluated_before_handling() {
    let rig = Rig::new();
    rig.run_ok("M550 P{network.hostname}", CodeChannel::Sbc).await;
    // The handler saw the evaluated hostname and kept it unchanged.
    let hostname = rig.executor.model().read().await.network.hostname.clone();
    assert_eq!(hostname, "gmux");
}

#[tokio::test]
async fn control_keywords_are_a_pipeline_invariant_violation() {
    let rig = Rig::new();
    let err = rig.run("if true", CodeChannel::File).await.unwrap_err();
    assert!(matches!(err, ControlError::Protocol(_)));
}

#[tokio::test]
async fn transport_failures_propagate() {
    let rig = Rig::new();
    rig.firmware.script_transport_failure("G28", "link down");
    let err = rig.run("G28", CodeChannel::Usb).await.unwrap_err();
    assert!(matches!(err, ControlError::Transport(_)));
}

#[tokio::test]
async fn file_channel_respects_pause() {
    let rig = Rig::new();
    {
        let mut model = rig.executor.model().write().await;
        model.job.file = Some(gmux_control::PrintFile {
            file_name: "/sd/gcodes/part.g".into(),
            virtual_name: "0:/gcodes/part.g".into(),
            size: 100,
        });
        model.job.is_paused = true;
    }
    let err = rig.run("G1 X5", CodeChannel::File).await.unwrap_err();
    assert!(matches!(err, ControlError::Cancelled));
    assert!(rig.firmware.sent().is_empty());
}

#[tokio::test]
async fn asynchronous_codes_return_no_result() {
    let rig = Rig::new();
    let mut code = Code::parse_on("G4 P100", CodeChannel::Daemon).unwrap();
    code.flags |= gmux_code::CodeFlags::ASYNCHRONOUS;

    let outcome = rig.executor.execute(code).await.unwrap();
    assert!(outcome.is_none());
    common::wait_until(|| !rig.firmware.sent().is_empty()).await;
    assert_eq!(rig.firmware.sent(), vec!["G4 P100".to_string()]);
}

#[tokio::test]
async fn parse_errors_reject_at_construction() {
    assert!(matches!(
        Code::parse("M117 \"open"),
        Err(CodeParserError::UnterminatedString)
    ));
    assert!(matches!(
        Code::parse("G1 (oops"),
        Err(CodeParserError::UnterminatedComment)
    ));
}

#[tokio::test]
async fn error_messages_carry_the_short_form_prefix() {
    let rig = Rig::new();
    let result = rig.run_ok("M23 missing.g", CodeChannel::Http).await;
    assert!(!result.is_successful());
    let message = &result.messages()[0];
    assert_eq!(message.kind, MessageType::Error);
    assert!(message.content.starts_with("M23: "));
}

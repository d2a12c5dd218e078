//! Interception bus behavior through the pipeline.

mod common;

use common::{text, Rig};
use gmux_code::Code;
use gmux_control::ControlError;
use gmux_intercept::{testing::MockInterceptor, InterceptionMode};
use gmux_types::{CodeChannel, CodeResult};
use std::sync::Arc;

#[tokio::test]
async fn pre_resolve_short_circuits_firmware_dispatch() {
    let rig = Rig::new();
    let resolver = MockInterceptor::resolver(
        InterceptionMode::Pre,
        CodeResult::success("handled upstream"),
    );
    let observer = MockInterceptor::pass_through(InterceptionMode::Executed);
    let observer_seen = observer.seen();
    rig.executor.register_interceptor(Arc::new(resolver)).await;
    rig.executor.register_interceptor(Arc::new(observer)).await;

    let result = rig.run_ok("G28", CodeChannel::Http).await;
    assert_eq!(text(&result), "handled upstream\n");

    // No firmware dispatch, no internal handling; executed hooks still
    // fired on the other interceptors.
    assert!(rig.firmware.sent().is_empty());
    assert_eq!(observer_seen.lock().as_slice(), ["G28"]);
}

#[tokio::test]
async fn post_resolve_runs_after_internal_handlers_decline() {
    let rig = Rig::new();
    let pre = MockInterceptor::pass_through(InterceptionMode::Pre);
    let pre_calls = pre.calls();
    let post = MockInterceptor::resolver(InterceptionMode::Post, CodeResult::success("post"));
    rig.executor.register_interceptor(Arc::new(pre)).await;
    rig.executor.register_interceptor(Arc::new(post)).await;

    let result = rig.run_ok("G28", CodeChannel::Http).await;
    assert_eq!(text(&result), "post\n");
    assert_eq!(pre_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert!(rig.firmware.sent().is_empty());
}

#[tokio::test]
async fn cancel_verdict_cancels_the_code() {
    let rig = Rig::new();
    rig.executor
        .register_interceptor(Arc::new(MockInterceptor::canceller(InterceptionMode::Pre)))
        .await;

    let err = rig.run("G28", CodeChannel::Http).await.unwrap_err();
    assert!(matches!(err, ControlError::Cancelled));
    assert!(rig.firmware.sent().is_empty());
}

#[tokio::test]
async fn locally_handled_codes_still_reach_executed_interceptors() {
    let rig = Rig::new();
    let observer = MockInterceptor::pass_through(InterceptionMode::Executed);
    let seen = observer.seen();
    rig.executor.register_interceptor(Arc::new(observer)).await;

    rig.run_ok("M27", CodeChannel::Http).await;
    rig.run_ok("; comment", CodeChannel::Http).await;
    assert_eq!(seen.lock().as_slice(), ["M27", "; comment"]);
}

#[tokio::test]
async fn channel_filters_limit_interception() {
    let rig = Rig::new();
    let usb_only = MockInterceptor::resolver(InterceptionMode::Pre, CodeResult::success("usb"))
        .with_channels(vec![CodeChannel::Usb]);
    rig.executor.register_interceptor(Arc::new(usb_only)).await;

    // HTTP codes pass through untouched.
    let result = rig.run_ok("G28", CodeChannel::Http).await;
    assert!(result.is_empty());
    assert_eq!(rig.firmware.sent(), vec!["G28".to_string()]);

    // USB codes are taken over.
    let result = rig.run_ok("G28", CodeChannel::Usb).await;
    assert!(text(&result).contains("usb"));
    assert_eq!(rig.firmware.sent().len(), 1);
}

#[tokio::test]
async fn nested_codes_from_interceptors_bypass_scheduling() {
    // An interceptor that, while holding a code, executes a code of its
    // own on the same connection. Without the bypass this deadlocks on
    // the channel's ordering locks.
    struct Nesting {
        source: gmux_types::SourceId,
        executor: tokio::sync::OnceCell<Arc<gmux_control::CodeExecutor>>,
        nested_result: parking_lot::Mutex<Option<CodeResult>>,
    }

    #[async_trait::async_trait]
    impl gmux_intercept::Interceptor for Nesting {
        fn source(&self) -> gmux_types::SourceId {
            self.source
        }

        fn mode(&self) -> InterceptionMode {
            InterceptionMode::Pre
        }

        async fn intercept(&self, code: &Code) -> gmux_intercept::Verdict {
            if code.is(gmux_code::CodeType::M, 400) {
                let executor = self.executor.get().expect("wired");
                let mut nested = Code::parse_on("M27", code.channel).unwrap();
                nested.source = Some(self.source);
                let result = executor
                    .execute(nested)
                    .await
                    .expect("nested execution")
                    .expect("synchronous result");
                *self.nested_result.lock() = Some(result);
            }
            gmux_intercept::Verdict::Ignore
        }
    }

    let rig = Rig::new();
    let interceptor = Arc::new(Nesting {
        source: gmux_types::SourceId::new(),
        executor: tokio::sync::OnceCell::new(),
        nested_result: parking_lot::Mutex::new(None),
    });
    interceptor
        .executor
        .set(Arc::clone(&rig.executor))
        .ok()
        .expect("wire executor");
    rig.executor
        .register_interceptor(Arc::clone(&interceptor) as Arc<dyn gmux_intercept::Interceptor>)
        .await;

    let outer = tokio::time::timeout(
        std::time::Duration::from_secs(2),
        rig.run("M400", CodeChannel::Http),
    )
    .await
    .expect("no deadlock")
    .unwrap()
    .unwrap();
    assert!(outer.is_successful());

    let nested = interceptor.nested_result.lock().clone().expect("nested ran");
    assert!(text(&nested).contains("Not SD printing."));
}

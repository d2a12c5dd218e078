//! Code interception bus.
//!
//! External observers can attach to the pipeline at three points and either
//! watch codes fly by or take them over:
//!
//! ```text
//!          ┌──────────────┐   Pre    ┌──────────────┐
//! Code ──► │  scheduler   │ ───────► │ interceptors │ ─┬─ Resolve ──► finalize
//!          └──────────────┘          └──────────────┘  ├─ Cancel ───► cancelled
//!                                                      └─ Ignore
//!                                                            │
//!                                    internal handlers ◄─────┘
//!                                                            │ unresolved
//!                                         Post intercept ◄───┘
//!                                                            │
//!                                       firmware dispatch ◄──┘
//!                                                            │
//!                                      Executed intercept ◄──┴── (notify only)
//! ```
//!
//! Interceptors are visited in registration order. A [`Verdict::Resolve`]
//! short-circuits the rest of the pipeline; [`Verdict::Cancel`] aborts the
//! code. `Executed`-mode interceptors are notified after finalization and
//! cannot change the outcome.
//!
//! A code emitted by an interceptor **while it holds a code under
//! interception** must bypass scheduling, or the pipeline would deadlock on
//! the ordering locks its own code still occupies. The registry tracks the
//! in-flight code per connection ([`InterceptorRegistry::code_being_intercepted`])
//! so the scheduler can detect this case.

mod interceptor;
mod mode;
mod registry;
pub mod testing;
mod verdict;

pub use interceptor::Interceptor;
pub use mode::InterceptionMode;
pub use registry::{InterceptedCode, InterceptionOutcome, InterceptorRegistry};
pub use verdict::Verdict;

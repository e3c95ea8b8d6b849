//! Message router.
//!
//! The [`Router`] delivers one message to the listener chain:
//!
//! ```text
//! ordered_listeners(extra)
//!   └─► for each listener (ascending priority)
//!         ├─ filter denies?      → skip
//!         ├─ Err / panic         → log, continue
//!         ├─ Ok(Continue)        → continue
//!         └─ Ok(Handled)         → stop
//! ```
//!
//! Failures are contained: one broken listener never prevents the others
//! from seeing the message. Each failure is logged with its error chain and a
//! backtrace, which is captured when `RUST_BACKTRACE` or `RUST_LIB_BACKTRACE`
//! enables it.
//!
//! The chain is walked on a snapshot: listeners registered or unregistered
//! by a handler take effect from the next message.

use std::backtrace::Backtrace;
use std::error::Error;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{Instrument, Level, debug, error, span};

use crate::context::Context;
use crate::listener::{Listener, Outcome};
use crate::message::Message;
use crate::registry::ListenerRegistry;

/// What happened to one dispatched message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Listeners whose handler ran (including ones that failed).
    pub delivered: usize,
    /// Listeners skipped by their filter.
    pub filtered: usize,
    /// Name of the listener that stopped dispatch, if any.
    pub handled_by: Option<String>,
}

/// Walks the listener chain for each message.
#[derive(Debug, Clone)]
pub struct Router {
    registry: Arc<ListenerRegistry>,
}

impl Router {
    /// Creates a router over a shared registry.
    pub fn new(registry: Arc<ListenerRegistry>) -> Self {
        Self { registry }
    }

    /// The persistent listener registry.
    pub fn registry(&self) -> &Arc<ListenerRegistry> {
        &self.registry
    }

    /// Dispatches `msg` to `extra` plus every registered listener.
    pub async fn dispatch(
        &self,
        ctx: &Context,
        msg: &Message,
        extra: &[Arc<dyn Listener>],
    ) -> DispatchSummary {
        let mut summary = DispatchSummary::default();
        let Some(command) = msg.command() else {
            debug!(raw = ?msg.raw(), "Unparsable line, not dispatched");
            return summary;
        };

        for listener in self.registry.ordered_listeners(extra) {
            if let Some(policy) = listener.filter()
                && !policy.allows(msg)
            {
                summary.filtered += 1;
                continue;
            }

            let name = listener.name().to_string();
            let span = span!(Level::DEBUG, "listener", listener = %name, command = %command);
            summary.delivered += 1;

            let result = AssertUnwindSafe(listener.receive_message(ctx, msg))
                .catch_unwind()
                .instrument(span)
                .await;

            match result {
                Ok(Ok(Outcome::Handled)) => {
                    debug!(listener = %name, command = %command, "Message handled, stopping dispatch");
                    summary.handled_by = Some(name);
                    break;
                }
                Ok(Ok(Outcome::Continue)) => {}
                Ok(Err(e)) => {
                    error!(
                        listener = %name,
                        command = %command,
                        error = %error_chain(e.as_ref()),
                        backtrace = %Backtrace::capture(),
                        "Listener failed"
                    );
                }
                Err(panic) => {
                    error!(
                        listener = %name,
                        command = %command,
                        error = %panic_message(panic.as_ref()),
                        backtrace = %Backtrace::capture(),
                        "Listener panicked"
                    );
                }
            }
        }

        summary
    }
}

/// `err` followed by each of its sources, separated by `: `.
pub fn error_chain(err: &(dyn Error + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::context::RecordingOutbound;
    use crate::error::BoxError;
    use crate::filter::FilterPolicy;
    use crate::listener::ListenerResult;
    use crate::parser::{ParseOptions, Parser};

    enum Behaviour {
        Continue,
        Handle,
        Fail,
        Panic,
    }

    struct Scripted {
        name: &'static str,
        priority: i32,
        behaviour: Behaviour,
        filter: Option<FilterPolicy>,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl Listener for Scripted {
        fn name(&self) -> &str {
            self.name
        }
        fn priority(&self) -> i32 {
            self.priority
        }
        fn filter(&self) -> Option<&FilterPolicy> {
            self.filter.as_ref()
        }
        async fn receive_message(&self, _ctx: &Context, _msg: &Message) -> ListenerResult {
            self.log.lock().push(self.name);
            match self.behaviour {
                Behaviour::Continue => Ok(Outcome::Continue),
                Behaviour::Handle => Ok(Outcome::Handled),
                Behaviour::Fail => Err("boom".into()),
                Behaviour::Panic => panic!("listener exploded"),
            }
        }
    }

    struct Fixture {
        router: Router,
        ctx: Context,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                router: Router::new(Arc::new(ListenerRegistry::new())),
                ctx: Context::new(Arc::new(RecordingOutbound::new("bot"))),
                log: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn add(&self, name: &'static str, priority: i32, behaviour: Behaviour) {
            self.add_filtered(name, priority, behaviour, None);
        }

        fn add_filtered(
            &self,
            name: &'static str,
            priority: i32,
            behaviour: Behaviour,
            filter: Option<FilterPolicy>,
        ) {
            self.router.registry().register(Arc::new(Scripted {
                name,
                priority,
                behaviour,
                filter,
                log: Arc::clone(&self.log),
            }));
        }

        fn log(&self) -> Vec<&'static str> {
            self.log.lock().clone()
        }
    }

    fn parse(line: &str) -> Message {
        Parser::new(ParseOptions {
            own_nick: Some("bot".into()),
            ..ParseOptions::default()
        })
        .parse(line)
    }

    #[tokio::test]
    async fn test_priority_order() {
        let f = Fixture::new();
        f.add("a", 10, Behaviour::Continue);
        f.add("b", -5, Behaviour::Continue);
        f.add("c", 0, Behaviour::Continue);
        let summary = f.router.dispatch(&f.ctx, &parse("PING :x"), &[]).await;
        assert_eq!(f.log(), ["b", "c", "a"]);
        assert_eq!(summary.delivered, 3);
        assert_eq!(summary.handled_by, None);
    }

    #[tokio::test]
    async fn test_handled_stops_dispatch() {
        let f = Fixture::new();
        f.add("first", 0, Behaviour::Handle);
        f.add("second", 1, Behaviour::Continue);
        let summary = f.router.dispatch(&f.ctx, &parse("PING :x"), &[]).await;
        assert_eq!(f.log(), ["first"]);
        assert_eq!(summary.handled_by.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn test_errors_and_panics_are_contained() {
        let f = Fixture::new();
        f.add("fails", 0, Behaviour::Fail);
        f.add("panics", 1, Behaviour::Panic);
        f.add("survivor", 2, Behaviour::Continue);
        let summary = f.router.dispatch(&f.ctx, &parse("PING :x"), &[]).await;
        assert_eq!(f.log(), ["fails", "panics", "survivor"]);
        assert_eq!(summary.delivered, 3);
    }

    #[tokio::test]
    async fn test_unparsed_message_is_not_dispatched() {
        let f = Fixture::new();
        f.add("a", 0, Behaviour::Continue);
        let summary = f.router.dispatch(&f.ctx, &parse(""), &[]).await;
        assert!(f.log().is_empty());
        assert_eq!(summary, DispatchSummary::default());
    }

    #[tokio::test]
    async fn test_filter_scenario() {
        let f = Fixture::new();
        f.add_filtered(
            "only_a",
            0,
            Behaviour::Continue,
            Some(FilterPolicy::new().channel("#a", true).otherwise(false)),
        );
        f.add_filtered(
            "private_only",
            1,
            Behaviour::Continue,
            Some(FilterPolicy::new().private(true).otherwise(false)),
        );
        f.add("everything", 2, Behaviour::Continue);

        f.router.dispatch(&f.ctx, &parse(":x!y@z PRIVMSG #a :hi"), &[]).await;
        assert_eq!(f.log(), ["only_a", "everything"]);
        f.log.lock().clear();

        let summary = f.router.dispatch(&f.ctx, &parse(":x!y@z PRIVMSG #b :hi"), &[]).await;
        assert_eq!(f.log(), ["everything"]);
        assert_eq!(summary.filtered, 2);
        f.log.lock().clear();

        f.router.dispatch(&f.ctx, &parse(":x!y@z PRIVMSG bot :hi"), &[]).await;
        assert_eq!(f.log(), ["private_only", "everything"]);
    }

    #[tokio::test]
    async fn test_extra_listeners_run_before_plugins() {
        let f = Fixture::new();
        f.add("plugin", 0, Behaviour::Continue);
        let transient: Arc<dyn Listener> = Arc::new(Scripted {
            name: "transient",
            priority: -1000,
            behaviour: Behaviour::Handle,
            filter: None,
            log: Arc::clone(&f.log),
        });
        f.router.dispatch(&f.ctx, &parse("PING :x"), &[transient]).await;
        assert_eq!(f.log(), ["transient"]);
    }

    /// Swaps registrations from inside a handler.
    struct Reshuffler {
        registry: Arc<ListenerRegistry>,
        leaving: Arc<dyn Listener>,
        joining: Arc<dyn Listener>,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl Listener for Reshuffler {
        fn name(&self) -> &str {
            "reshuffler"
        }
        async fn receive_message(&self, _ctx: &Context, _msg: &Message) -> ListenerResult {
            self.log.lock().push("reshuffler");
            self.registry.unregister(&self.leaving);
            self.registry.register(Arc::clone(&self.joining));
            Ok(Outcome::Continue)
        }
    }

    #[tokio::test]
    async fn test_dispatch_walks_a_snapshot() {
        let f = Fixture::new();
        let scripted = |name, priority| -> Arc<dyn Listener> {
            Arc::new(Scripted {
                name,
                priority,
                behaviour: Behaviour::Continue,
                filter: None,
                log: Arc::clone(&f.log),
            })
        };
        let leaving = scripted("leaving", 10);
        let joining = scripted("joining", 5);
        f.router.registry().register(Arc::clone(&leaving));
        f.router.registry().register(Arc::new(Reshuffler {
            registry: Arc::clone(f.router.registry()),
            leaving,
            joining,
            log: Arc::clone(&f.log),
        }));

        let summary = f.router.dispatch(&f.ctx, &parse("PING :x"), &[]).await;
        assert_eq!(f.log(), ["reshuffler", "leaving"]);
        assert_eq!(summary.delivered, 2);
        f.log.lock().clear();

        f.router.dispatch(&f.ctx, &parse("PING :y"), &[]).await;
        assert_eq!(f.log(), ["reshuffler", "joining"]);
    }

    #[derive(Debug, thiserror::Error)]
    #[error("plugin storage unavailable")]
    struct Outer(#[source] std::io::Error);

    #[test]
    fn test_error_chain_includes_sources() {
        let err: BoxError = Box::new(Outer(std::io::Error::other("disk full")));
        assert_eq!(
            error_chain(err.as_ref()),
            "plugin storage unavailable: disk full"
        );
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
    }
}

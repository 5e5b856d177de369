//! The control loop.
//!
//! [`ControlLoop`] owns the configuration, a [`DisplayQuery`] and a
//! [`CommandRunner`], and repeats one cycle until cancelled or a fatal
//! error occurs:
//!
//! 1. query the screens (fatal on failure);
//! 2. find the configured screen (absent: skip to 6);
//! 3. resolve a scale for its resolution (no match: skip to 6);
//! 4. run the command with `scale`, `width`, `height` (failure is logged);
//! 5. wait out the debounce window;
//! 6. wait for the next notification from the watcher.
//!
//! Steps 5 and 6 also end early on cancellation or a fatal watcher error.
//! The watcher runs as a separate task for the lifetime of
//! [`run`](ControlLoop::run) and is torn down before it returns.

use crate::command::Invocation;
use crate::config::Config;
use crate::error::Error;
use crate::signal::{self, Shutdown, SlotReceiver};
use crate::traits::{CommandRunner, DisplayQuery, EventSource};
use crate::watcher::EventWatcher;
use log::{debug, info, warn};
use tokio::sync::oneshot;

/// What one cycle did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    /// The command was run (successfully or not) for this invocation.
    Acted(Invocation),
    /// The configured screen was not in the query result.
    ScreenMissing,
    /// No scale rule matched the screen's resolution.
    NoRule { width: u32, height: u32 },
}

/// Drives query → resolve → act → debounce → wait.
pub struct ControlLoop<Q, R> {
    config: Config,
    query: Q,
    runner: R,
}

impl<Q, R> ControlLoop<Q, R>
where
    Q: DisplayQuery + Sync,
    R: CommandRunner + Sync,
{
    pub fn new(config: Config, query: Q, runner: R) -> Self {
        Self {
            config,
            query,
            runner,
        }
    }

    /// Run a single query/resolve/act cycle.
    pub async fn cycle(&self) -> Result<Outcome, Error> {
        let screens = self
            .query
            .query()
            .await
            .map_err(|e| Error::Query(e.to_string()))?;

        let Some(screen) = screens.find(&self.config.screen) else {
            warn!("missing screen {}", self.config.screen);
            return Ok(Outcome::ScreenMissing);
        };

        let (width, height) = screen.resolution();
        let Some(rule) = self.config.scales.resolve(width, height) else {
            info!("{} is {}x{}, no scale rule matches", screen.name, width, height);
            return Ok(Outcome::NoRule { width, height });
        };

        let invocation = Invocation {
            scale: rule.scale,
            width,
            height,
        };
        info!(
            "{} is {}x{}, running command with scale {}",
            screen.name, width, height, rule.scale
        );
        if let Err(e) = self.runner.run(&invocation).await {
            warn!("command error: {}", e);
        }
        Ok(Outcome::Acted(invocation))
    }

    /// Start `source` in the background and loop until `shutdown` fires
    /// or something fatal happens.
    ///
    /// Cancellation returns `Ok(())`.  The watcher task is stopped before
    /// this returns, whatever the reason.
    pub async fn run<S: EventSource>(&self, source: S, shutdown: Shutdown) -> Result<(), Error> {
        let (notify_tx, notifications) = signal::slot();
        let (error_tx, errors) = oneshot::channel();
        let watcher = EventWatcher::new(self.config.events.clone());

        let mut watcher_shutdown = shutdown.clone();
        let task = tokio::spawn(async move {
            tokio::select! {
                res = source.run(watcher, notify_tx) => match res {
                    Ok(()) => info!("event source ended, no further notifications"),
                    Err(e) => {
                        let _ = error_tx.send(Error::Watcher(e.to_string()));
                    }
                },
                _ = watcher_shutdown.cancelled() => debug!("watcher cancelled"),
            }
        });

        let result = self.drive(notifications, errors, shutdown).await;

        task.abort();
        let _ = task.await;
        result
    }

    async fn drive(
        &self,
        notifications: SlotReceiver<String>,
        errors: oneshot::Receiver<Error>,
        mut shutdown: Shutdown,
    ) -> Result<(), Error> {
        let mut errors = Some(errors);
        let mut notifications = Some(notifications);
        let debounce = self.config.debounce();

        loop {
            let outcome = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Ok(()),
                outcome = self.cycle() => outcome?,
            };

            if matches!(outcome, Outcome::Acted(_)) && !debounce.is_zero() {
                debug!("debouncing for {:?}", debounce);
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => return Ok(()),
                    err = fatal(&mut errors) => return Err(err),
                    _ = tokio::time::sleep(debounce) => {}
                }
            }

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Ok(()),
                err = fatal(&mut errors) => return Err(err),
                event = notification(&mut notifications) => debug!("woken by {}", event),
            }
        }
    }
}

/// Resolve with the watcher's fatal error.  Never resolves if the watcher
/// ended without one.
async fn fatal(errors: &mut Option<oneshot::Receiver<Error>>) -> Error {
    if let Some(rx) = errors.as_mut() {
        if let Ok(err) = rx.await {
            return err;
        }
        *errors = None;
    }
    std::future::pending().await
}

/// Resolve with the next coalesced notification.  Never resolves once the
/// watcher has gone away.
async fn notification(rx: &mut Option<SlotReceiver<String>>) -> String {
    if let Some(inner) = rx.as_mut() {
        if let Some(event) = inner.recv().await {
            return event;
        }
        *rx = None;
    }
    std::future::pending().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale::{ScaleRule, ScaleTable};
    use crate::screen::{Geometry, Screen, Screens};
    use crate::signal::SlotSender;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    //  Test doubles

    #[derive(Debug, thiserror::Error)]
    #[error("mock error")]
    struct MockError;

    /// Returns a fixed screen list, or fails every call.
    struct MockQuery {
        screens: Option<Vec<Screen>>,
        calls: Arc<AtomicUsize>,
    }

    impl MockQuery {
        fn new(screens: Vec<Screen>) -> Self {
            Self {
                screens: Some(screens),
                calls: Arc::default(),
            }
        }

        fn failing() -> Self {
            Self {
                screens: None,
                calls: Arc::default(),
            }
        }
    }

    impl DisplayQuery for MockQuery {
        type Error = MockError;

        async fn query(&self) -> Result<Screens, MockError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.screens.clone().map(Screens::from).ok_or(MockError)
        }
    }

    /// Records every invocation; optionally fails each one.
    #[derive(Default, Clone)]
    struct MockRunner {
        log: Arc<Mutex<Vec<Invocation>>>,
        fail: bool,
    }

    impl MockRunner {
        fn invocations(&self) -> Vec<Invocation> {
            self.log.lock().unwrap().clone()
        }
    }

    impl CommandRunner for MockRunner {
        type Error = MockError;

        async fn run(&self, invocation: &Invocation) -> Result<(), MockError> {
            self.log.lock().unwrap().push(*invocation);
            if self.fail {
                Err(MockError)
            } else {
                Ok(())
            }
        }
    }

    /// Sets a flag when dropped, to observe that the watcher was torn down.
    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    /// Emits scripted lines after scripted delays, then either idles
    /// forever or ends with the scripted result.
    struct MockSource {
        lines: Vec<(Duration, &'static str)>,
        end: Option<Result<(), ()>>,
        guard: DropFlag,
    }

    impl MockSource {
        fn idle() -> Self {
            Self::lines(Vec::new())
        }

        fn lines(lines: Vec<(Duration, &'static str)>) -> Self {
            Self {
                lines,
                end: None,
                guard: DropFlag(Arc::default()),
            }
        }

        /// Set once the source (or the future running it) is dropped.
        fn dropped(&self) -> Arc<AtomicBool> {
            self.guard.0.clone()
        }
    }

    impl EventSource for MockSource {
        type Error = MockError;

        async fn run(self, watcher: EventWatcher, sink: SlotSender<String>) -> Result<(), MockError> {
            let MockSource { lines, end, guard: _guard } = self;
            for (delay, line) in lines {
                tokio::time::sleep(delay).await;
                watcher.handle_line(line, &sink);
            }
            match end {
                Some(res) => res.map_err(|()| MockError),
                None => std::future::pending().await,
            }
        }
    }

    fn screen(name: &str, width: u32, height: u32) -> Screen {
        Screen {
            name: name.into(),
            connected: true,
            geometry: Geometry { width, height, x: 0, y: 0 },
        }
    }

    fn config(debounce_ms: u64) -> Config {
        Config {
            screen: "DP-1".into(),
            command: "true".into(),
            events: vec!["RRScreenChangeNotify".into()],
            scales: ScaleTable::new(vec![
                ScaleRule::new(0, 0, 1.0),
                ScaleRule::new(1920, 1080, 1.5),
            ]),
            debounce_ms,
        }
    }

    const CHANGE: &str = "RRScreenChangeNotify event, serial 1, synthetic NO";

    //  Single cycles

    #[tokio::test]
    async fn end_to_end_invokes_command_once() {
        let runner = MockRunner::default();
        let control = ControlLoop::new(
            config(0),
            MockQuery::new(vec![screen("DP-1", 1920, 1080)]),
            runner.clone(),
        );

        let outcome = control.cycle().await.unwrap();
        let expected = Invocation {
            scale: 1.5,
            width: 1920,
            height: 1080,
        };
        assert_eq!(outcome, Outcome::Acted(expected));
        assert_eq!(runner.invocations(), vec![expected]);
    }

    #[tokio::test]
    async fn missing_screen_is_not_an_error() {
        let runner = MockRunner::default();
        let control = ControlLoop::new(
            config(0),
            MockQuery::new(vec![screen("HDMI-1", 1920, 1080)]),
            runner.clone(),
        );
        assert_eq!(control.cycle().await.unwrap(), Outcome::ScreenMissing);
        assert!(runner.invocations().is_empty());
    }

    #[tokio::test]
    async fn no_matching_rule_takes_no_action() {
        let mut cfg = config(0);
        cfg.scales = ScaleTable::new(vec![ScaleRule::new(1280, 720, 2.0)]);
        let runner = MockRunner::default();
        let control = ControlLoop::new(cfg, MockQuery::new(vec![screen("DP-1", 1920, 1080)]), runner.clone());

        assert_eq!(
            control.cycle().await.unwrap(),
            Outcome::NoRule { width: 1920, height: 1080 }
        );
        assert!(runner.invocations().is_empty());
    }

    #[tokio::test]
    async fn query_failure_is_fatal() {
        let control = ControlLoop::new(config(0), MockQuery::failing(), MockRunner::default());
        assert!(matches!(control.cycle().await, Err(Error::Query(_))));
    }

    #[tokio::test]
    async fn command_failure_is_recoverable() {
        let runner = MockRunner {
            fail: true,
            ..Default::default()
        };
        let control = ControlLoop::new(
            config(0),
            MockQuery::new(vec![screen("DP-1", 800, 600)]),
            runner.clone(),
        );
        assert!(matches!(control.cycle().await, Ok(Outcome::Acted(_))));
        assert_eq!(runner.invocations().len(), 1);
    }

    //  Full loop

    #[tokio::test(start_paused = true)]
    async fn burst_within_debounce_window_causes_one_cycle() {
        let runner = MockRunner::default();
        let control = Arc::new(ControlLoop::new(
            config(1000),
            MockQuery::new(vec![screen("DP-1", 1920, 1080)]),
            runner.clone(),
        ));
        let source = MockSource::lines(
            (0..5)
                .map(|_| (Duration::from_millis(100), CHANGE))
                .collect(),
        );

        let (trigger, shutdown) = signal::shutdown();
        let handle = tokio::spawn({
            let control = control.clone();
            async move { control.run(source, shutdown).await }
        });

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(runner.invocations().len(), 2);

        trigger.trigger();
        handle.await.unwrap().unwrap();
        assert_eq!(runner.invocations().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn spaced_notifications_each_cause_a_cycle() {
        let runner = MockRunner::default();
        let control = Arc::new(ControlLoop::new(
            config(100),
            MockQuery::new(vec![screen("DP-1", 1920, 1080)]),
            runner.clone(),
        ));
        let source = MockSource::lines(vec![
            (Duration::from_secs(1), CHANGE),
            (Duration::from_secs(1), "MotionNotify event, serial 2"),
            (Duration::from_secs(1), CHANGE),
        ]);

        let (trigger, shutdown) = signal::shutdown();
        let handle = tokio::spawn({
            let control = control.clone();
            async move { control.run(source, shutdown).await }
        });

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(runner.invocations().len(), 3);

        trigger.trigger();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_debounce_stops_everything() {
        let runner = MockRunner::default();
        let control = Arc::new(ControlLoop::new(
            config(60_000),
            MockQuery::new(vec![screen("DP-1", 1920, 1080)]),
            runner.clone(),
        ));
        let source = MockSource::lines(vec![(Duration::from_millis(10), CHANGE)]);
        let dropped = source.dropped();

        let (trigger, shutdown) = signal::shutdown();
        let handle = tokio::spawn({
            let control = control.clone();
            async move { control.run(source, shutdown).await }
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(runner.invocations().len(), 1);

        trigger.trigger();
        let res = tokio::time::timeout(Duration::from_millis(1), handle)
            .await
            .expect("loop did not stop promptly");
        res.unwrap().unwrap();
        assert!(dropped.load(Ordering::SeqCst));
        assert_eq!(runner.invocations().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn watcher_failure_ends_the_run() {
        let control = ControlLoop::new(
            config(0),
            MockQuery::new(vec![screen("DP-1", 1920, 1080)]),
            MockRunner::default(),
        );
        let mut source = MockSource::lines(vec![(Duration::from_secs(1), CHANGE)]);
        source.end = Some(Err(()));

        let (_trigger, shutdown) = signal::shutdown();
        let err = control.run(source, shutdown).await.unwrap_err();
        assert!(matches!(err, Error::Watcher(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn watcher_failure_supersedes_debounce() {
        let runner = MockRunner::default();
        let control = ControlLoop::new(
            config(60_000),
            MockQuery::new(vec![screen("DP-1", 1920, 1080)]),
            runner.clone(),
        );
        let mut source = MockSource::lines(vec![(Duration::from_millis(10), CHANGE)]);
        source.end = Some(Err(()));

        let (_trigger, shutdown) = signal::shutdown();
        let start = tokio::time::Instant::now();
        let err = control.run(source, shutdown).await.unwrap_err();
        assert!(matches!(err, Error::Watcher(_)));
        assert!(start.elapsed() < Duration::from_secs(60));
        assert_eq!(runner.invocations().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn clean_watcher_exit_keeps_the_loop_alive() {
        let runner = MockRunner::default();
        let control = Arc::new(ControlLoop::new(
            config(0),
            MockQuery::new(vec![screen("DP-1", 1920, 1080)]),
            runner.clone(),
        ));
        let mut source = MockSource::lines(vec![(Duration::from_millis(10), CHANGE)]);
        source.end = Some(Ok(()));

        let (trigger, shutdown) = signal::shutdown();
        let handle = tokio::spawn({
            let control = control.clone();
            async move { control.run(source, shutdown).await }
        });

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!handle.is_finished());
        assert_eq!(runner.invocations().len(), 2);

        trigger.trigger();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn query_failure_ends_the_run_and_stops_the_watcher() {
        let control = ControlLoop::new(config(0), MockQuery::failing(), MockRunner::default());
        let source = MockSource::idle();
        let dropped = source.dropped();

        let (_trigger, shutdown) = signal::shutdown();
        let err = control.run(source, shutdown).await.unwrap_err();
        assert!(matches!(err, Error::Query(_)));
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_screen_waits_for_next_notification() {
        let query = MockQuery::new(vec![screen("HDMI-1", 1920, 1080)]);
        let calls = query.calls.clone();
        let control = Arc::new(ControlLoop::new(config(1000), query, MockRunner::default()));
        let source = MockSource::lines(vec![(Duration::from_secs(2), CHANGE)]);

        let (trigger, shutdown) = signal::shutdown();
        let handle = tokio::spawn({
            let control = control.clone();
            async move { control.run(source, shutdown).await }
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        trigger.trigger();
        handle.await.unwrap().unwrap();
    }
}

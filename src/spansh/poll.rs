//! Submitting a plot and polling it to completion.

use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::model::{Route, Ship};

use super::backoff::{Backoff, MAX_POLL_DELAY};
use super::decode::{self, JobStatus};
use super::{PlotError, PlotKind, Transport};

// ── Requests ──

/// Neutron plotter parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct NeutronRequest {
    /// How far the route may deviate from a straight line to reach neutron
    /// stars, in percent.
    pub efficiency: u8,
    /// Laden jump range in light years.
    pub range: f64,
    pub from: String,
    pub to: String,
}

/// Routing switches for the exact plotter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExactOptions {
    /// The ship starts with a supercharged drive.
    pub is_supercharged: bool,
    /// Route through neutron stars.
    pub use_supercharge: bool,
    /// Use FSD synthesis injections.
    pub use_injections: bool,
    /// Avoid secondary stars.
    pub exclude_secondary: bool,
}

/// Exact plotter parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ExactRequest {
    pub source: String,
    pub destination: String,
    pub options: ExactOptions,
    pub ship: Ship,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlotRequest {
    Neutron(NeutronRequest),
    Exact(ExactRequest),
}

impl PlotRequest {
    pub fn kind(&self) -> PlotKind {
        match self {
            Self::Neutron(_) => PlotKind::Neutron,
            Self::Exact(_) => PlotKind::Exact,
        }
    }

    /// Submit path, relative to the API root.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Neutron(_) => "/route",
            Self::Exact(_) => "/generic/route",
        }
    }

    pub fn query(&self) -> Vec<(String, String)> {
        fn pair(key: &str, value: impl ToString) -> (String, String) {
            (key.to_string(), value.to_string())
        }
        fn flag(key: &str, value: bool) -> (String, String) {
            pair(key, u8::from(value))
        }

        match self {
            Self::Neutron(r) => vec![
                pair("efficiency", r.efficiency),
                pair("range", r.range),
                pair("from", &r.from),
                pair("to", &r.to),
            ],
            Self::Exact(r) => {
                let ship = &r.ship;
                vec![
                    pair("source", &r.source),
                    pair("destination", &r.destination),
                    flag("is_supercharged", r.options.is_supercharged),
                    flag("use_supercharge", r.options.use_supercharge),
                    flag("use_injections", r.options.use_injections),
                    flag("exclude_secondary", r.options.exclude_secondary),
                    pair("fuel_power", ship.fsd.size_const),
                    pair("fuel_multiplier", ship.fsd.rating_const / 1000.0),
                    pair("optimal_mass", ship.fsd.optimal_mass),
                    pair("base_mass", ship.unladen_mass),
                    pair("tank_size", ship.tank_size),
                    pair("internal_tank_size", ship.reserve_size),
                    pair("max_fuel_per_jump", ship.fsd.max_fuel_per_jump),
                    pair("range_boost", ship.jump_range_boost),
                ]
            }
        }
    }
}

// ── Cancellation ──

/// A one-way cancel flag that wakes sleeping pollers.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let (cancelled, wake) = &*self.inner;
        *cancelled.lock().unwrap_or_else(PoisonError::into_inner) = true;
        wake.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep for `timeout` unless cancelled first. Returns whether cancelled.
    pub fn wait(&self, timeout: Duration) -> bool {
        let (cancelled, wake) = &*self.inner;
        let guard = cancelled.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = wake
            .wait_timeout_while(guard, timeout, |cancelled| !*cancelled)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

// ── Polling ──

/// Progress reported while a plot runs.
#[derive(Debug)]
pub enum PlotUpdate {
    /// The job is queued; the next poll happens after `retry_in`.
    Queued { job: String, retry_in: Duration },

    /// The plot ended.
    Finished(Result<Route, PlotError>),
}

/// Drives one plot job from submission to a route.
pub struct JobPoller<T> {
    transport: T,
    api_url: String,
    backoff: Backoff,
    cancel: CancelToken,
}

impl<T: Transport> JobPoller<T> {
    pub fn new(transport: T, api_url: impl Into<String>) -> Self {
        Self {
            transport,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            backoff: Backoff::default(),
            cancel: CancelToken::new(),
        }
    }

    #[must_use]
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Submit `request` and poll until the job finishes.
    ///
    /// Every queued response is reported through `on_status` before the wait.
    /// A cancel during the wait returns at once without another request.
    pub fn run(
        &self,
        request: &PlotRequest,
        mut on_status: impl FnMut(PlotUpdate),
    ) -> Result<Route, PlotError> {
        if self.cancel.is_cancelled() {
            return Err(PlotError::Cancelled);
        }

        let kind = request.kind();
        let submit_url = format!("{}{}", self.api_url, request.endpoint());
        log::info!("submitting {kind:?} plot to {submit_url}");
        let mut body = self.get(&submit_url, &request.query())?;
        let mut delays = self.backoff.clone();

        loop {
            match decode::job_status(&body, kind)? {
                JobStatus::Complete(route) => {
                    log::info!("plot finished with {} waypoints", route.len());
                    return Ok(route);
                }
                JobStatus::Queued { job } => {
                    let delay = delays.next().unwrap_or(MAX_POLL_DELAY);
                    log::debug!("job {job} queued; re-polling in {delay:?}");
                    on_status(PlotUpdate::Queued {
                        job: job.clone(),
                        retry_in: delay,
                    });

                    if self.cancel.wait(delay) {
                        log::info!("plot of job {job} cancelled");
                        return Err(PlotError::Cancelled);
                    }
                    body = self.get(&format!("{}/results/{job}", self.api_url), &[])?;
                }
            }
        }
    }

    fn get(&self, url: &str, query: &[(String, String)]) -> Result<String, PlotError> {
        self.transport
            .get(url, query)
            .map_err(decode::transport_failure)
    }
}

/// A plot running on its own thread.
pub struct PlotHandle {
    pub updates: Receiver<PlotUpdate>,
    cancel: CancelToken,
    thread: Option<JoinHandle<()>>,
}

impl PlotHandle {
    /// Abandon the plot. A pending re-poll wakes immediately.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Block until the plot ends, passing queued updates to `on_queued`.
    pub fn wait(mut self, mut on_queued: impl FnMut(&str, Duration)) -> Result<Route, PlotError> {
        let mut outcome = Err(PlotError::Cancelled);
        for update in &self.updates {
            match update {
                PlotUpdate::Queued { job, retry_in } => on_queued(&job, retry_in),
                PlotUpdate::Finished(result) => {
                    outcome = result;
                    break;
                }
            }
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        outcome
    }
}

impl Drop for PlotHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Run `request` on a background thread.
pub fn spawn_plot<T>(poller: JobPoller<T>, request: PlotRequest) -> std::io::Result<PlotHandle>
where
    T: Transport + Send + 'static,
{
    let (tx, updates) = mpsc::channel();
    let cancel = poller.cancel_token();

    let thread = thread::Builder::new()
        .name("spansh-plot".into())
        .spawn(move || {
            let progress = tx.clone();
            let result = poller.run(&request, |update| {
                let _ = progress.send(update);
            });
            let _ = tx.send(PlotUpdate::Finished(result));
        })?;

    Ok(PlotHandle {
        updates,
        cancel,
        thread: Some(thread),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;

    use crate::spansh::TransportError;

    type Request = (String, Vec<(String, String)>);

    /// Replays canned responses and records every request.
    #[derive(Clone, Default)]
    struct ScriptedTransport {
        responses: Arc<Mutex<VecDeque<Result<String, TransportError>>>>,
        requests: Arc<Mutex<Vec<Request>>>,
    }

    impl ScriptedTransport {
        fn new(responses: impl IntoIterator<Item = Result<String, TransportError>>) -> Self {
            Self {
                responses: Arc::new(Mutex::new(responses.into_iter().collect())),
                requests: Arc::default(),
            }
        }

        fn urls(&self) -> Vec<String> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|(url, _)| url.clone())
                .collect()
        }
    }

    impl Transport for ScriptedTransport {
        fn get(&self, url: &str, query: &[(String, String)]) -> Result<String, TransportError> {
            self.requests
                .lock()
                .unwrap()
                .push((url.to_string(), query.to_vec()));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::new("no more responses")))
        }
    }

    const QUEUED: &str = r#"{ "status":"queued", "job":"ABC" }"#;
    const NEUTRON_DONE: &str = r#"{ "status":"ok", "job":"ABC", "result":{ "system_jumps":[
        { "system":"Sol", "distance_jumped":0, "distance_left":20, "jumps":0 },
        { "system":"Alpha Centauri", "distance_jumped":4.38, "distance_left":0, "jumps":1 }
    ] } }"#;

    fn neutron_request() -> PlotRequest {
        PlotRequest::Neutron(NeutronRequest {
            efficiency: 60,
            range: 50.5,
            from: "Sol".into(),
            to: "Alpha Centauri".into(),
        })
    }

    fn fast_backoff() -> Backoff {
        Backoff::new(Duration::from_millis(1), Duration::from_millis(5))
    }

    #[test]
    fn neutron_query() {
        let query = neutron_request().query();
        assert_eq!(
            query,
            [
                ("efficiency".to_string(), "60".to_string()),
                ("range".to_string(), "50.5".to_string()),
                ("from".to_string(), "Sol".to_string()),
                ("to".to_string(), "Alpha Centauri".to_string()),
            ]
        );
        assert_eq!(neutron_request().endpoint(), "/route");
    }

    #[test]
    fn exact_query_uses_flags_and_ship() {
        let request = PlotRequest::Exact(ExactRequest {
            source: "Sol".into(),
            destination: "Colonia".into(),
            options: ExactOptions {
                use_supercharge: true,
                ..ExactOptions::default()
            },
            ship: Ship {
                fsd: crate::model::FrameShiftDrive {
                    optimal_mass: 1800.0,
                    max_fuel_per_jump: 8.0,
                    size_const: 2.45,
                    rating_const: 12.0,
                },
                unladen_mass: 400.0,
                tank_size: 32.0,
                reserve_size: 0.63,
                max_cargo: 0,
                jump_range_boost: 10.5,
            },
        });

        let query = request.query();
        let get = |key: &str| {
            query
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
                .unwrap()
        };
        assert_eq!(request.endpoint(), "/generic/route");
        assert_eq!(get("is_supercharged"), "0");
        assert_eq!(get("use_supercharge"), "1");
        assert_eq!(get("fuel_power"), "2.45");
        assert_eq!(get("fuel_multiplier"), "0.012");
        assert_eq!(get("internal_tank_size"), "0.63");
        assert_eq!(get("range_boost"), "10.5");
        assert_eq!(query.len(), 14);
    }

    #[test]
    fn completes_immediately() {
        let transport = ScriptedTransport::new([Ok(NEUTRON_DONE.to_string())]);
        let poller = JobPoller::new(transport.clone(), "https://example.test/api/");

        let route = poller.run(&neutron_request(), |_| panic!("not queued")).unwrap();

        assert_eq!(route.len(), 2);
        assert_eq!(transport.urls(), ["https://example.test/api/route"]);
    }

    #[test]
    fn repolls_once_per_queued_response() {
        let mut responses: Vec<_> = (0..5).map(|_| Ok(QUEUED.to_string())).collect();
        responses.push(Ok(NEUTRON_DONE.to_string()));
        let transport = ScriptedTransport::new(responses);
        let poller = JobPoller::new(transport.clone(), "https://example.test/api")
            .with_backoff(fast_backoff());

        let mut delays = Vec::new();
        let route = poller
            .run(&neutron_request(), |update| {
                if let PlotUpdate::Queued { job, retry_in } = update {
                    assert_eq!(job, "ABC");
                    delays.push(retry_in);
                }
            })
            .unwrap();

        assert_eq!(route[1].system(), "Alpha Centauri");
        let urls = transport.urls();
        assert_eq!(urls.len(), 6);
        assert_eq!(
            urls.iter().filter(|u| u.ends_with("/results/ABC")).count(),
            5
        );
        assert_eq!(delays.len(), 5);
        assert!(delays.windows(2).all(|w| w[1] >= w[0]));
        assert!(delays.iter().all(|d| *d <= Duration::from_millis(5)));
    }

    #[test]
    fn cancel_wakes_pending_repoll() {
        let transport = ScriptedTransport::new([Ok(QUEUED.to_string())]);
        let poller = JobPoller::new(transport.clone(), "https://example.test/api")
            .with_backoff(Backoff::new(Duration::from_secs(60), Duration::from_secs(60)));

        let handle = spawn_plot(poller, neutron_request()).unwrap();
        let first = handle.updates.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(matches!(first, PlotUpdate::Queued { .. }));

        handle.cancel();
        let last = handle.updates.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(matches!(last, PlotUpdate::Finished(Err(PlotError::Cancelled))));
        // Only the submit went out.
        assert_eq!(transport.urls().len(), 1);
    }

    #[test]
    fn cancelled_before_submit() {
        let transport = ScriptedTransport::new([]);
        let poller = JobPoller::new(transport.clone(), "https://example.test/api");
        poller.cancel_token().cancel();

        let err = poller.run(&neutron_request(), |_| {}).unwrap_err();

        assert!(matches!(err, PlotError::Cancelled));
        assert!(transport.urls().is_empty());
    }

    #[test]
    fn service_error_beats_transport_message() {
        let transport = ScriptedTransport::new([Err(TransportError {
            message: "400 Bad Request".into(),
            body: Some(r#"{ "error":"Could not find starting system" }"#.into()),
        })]);
        let poller = JobPoller::new(transport, "https://example.test/api");

        let err = poller.run(&neutron_request(), |_| {}).unwrap_err();

        assert_eq!(
            err.to_string(),
            "Received error from Spansh: Could not find starting system"
        );
    }

    #[test]
    fn network_error_during_repoll() {
        let transport = ScriptedTransport::new([
            Ok(QUEUED.to_string()),
            Err(TransportError::new("connection reset")),
        ]);
        let poller = JobPoller::new(transport, "https://example.test/api")
            .with_backoff(fast_backoff());

        let err = poller.run(&neutron_request(), |_| {}).unwrap_err();

        assert!(matches!(err, PlotError::Network(ref m) if m == "connection reset"));
    }

    #[test]
    fn handle_wait_collects_route() {
        let transport = ScriptedTransport::new([
            Ok(QUEUED.to_string()),
            Ok(NEUTRON_DONE.to_string()),
        ]);
        let poller = JobPoller::new(transport, "https://example.test/api")
            .with_backoff(fast_backoff());

        let mut queued = 0;
        let route = spawn_plot(poller, neutron_request())
            .unwrap()
            .wait(|_, _| queued += 1)
            .unwrap();

        assert_eq!(queued, 1);
        assert_eq!(route.len(), 2);
    }
}

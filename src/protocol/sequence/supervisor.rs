//! Run supervisor: owns the driver, the timer and the plan, and guarantees that at
//! most one run uses the CAN channel at a time.
//!
//! [`RunSupervisor::start`] splits a run into two parts:
//!
//! * a [`RunHandle`] kept by the caller to cancel, poll progress, or join;
//! * a [`RunWorker`] to be driven by whatever executes background work (a spawned
//!   task, a dedicated thread's `block_on`, or a `select!` next to the UI loop).
//!
//! The worker opens the channel, runs the plan and closes the channel on every
//! path where the open succeeded. Nothing is allocated; the supervisor usually
//! lives in a `static` and the two parts borrow it.
use core::cell::RefCell;
use core::fmt::Debug;

use embassy_sync::{
    blocking_mutex::{raw::RawMutex, Mutex as BlockingMutex},
    mutex::Mutex,
    signal::Signal,
};
use futures_util::{future::select, future::Either, pin_mut};

use crate::error::{RunFailure, StartError};
use crate::protocol::sequence::{
    cancel::CancelToken,
    plan::{total_delay_ms, Plan, Step},
    progress::{Progress, ProgressSink},
    runner::{run_plan, RunOutcome},
};
use crate::protocol::transport::channel_config::ChannelConfig;
use crate::protocol::transport::traits::{can_driver::CanDriver, step_timer::StepTimer};

//==================================================================================STATE
#[derive(Clone, Debug, PartialEq, Eq)]
/// Lifecycle of the supervised run. Transitions only from `Running` to one of the
/// terminal states, and back to `Running` on the next accepted start.
pub enum RunState<E: Debug> {
    /// No run was started yet.
    Idle,
    Running,
    Completed(Progress),
    /// Stopped on request (or because the worker was dropped).
    Cancelled(Progress),
    Failed(RunFailure<E>),
}

impl<E: Debug> RunState<E> {
    pub fn is_running(&self) -> bool {
        matches!(self, RunState::Running)
    }

    /// `Completed`, `Cancelled` or `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Completed(_) | RunState::Cancelled(_) | RunState::Failed(_)
        )
    }

    /// Final progress for runs that ended without failing.
    pub fn progress(&self) -> Option<Progress> {
        match self {
            RunState::Completed(progress) | RunState::Cancelled(progress) => Some(*progress),
            _ => None,
        }
    }
}

impl<E: Debug> From<Result<RunOutcome, RunFailure<E>>> for RunState<E> {
    fn from(result: Result<RunOutcome, RunFailure<E>>) -> Self {
        match result {
            Ok(RunOutcome::Completed(progress)) => RunState::Completed(progress),
            Ok(RunOutcome::Cancelled(progress)) => RunState::Cancelled(progress),
            Err(failure) => RunState::Failed(failure),
        }
    }
}

//==================================================================================CONTROL
struct Inner<E: Debug> {
    state: RunState<E>,
    /// Bumped on every accepted start; ties handles and workers to their run.
    generation: u32,
    progress: Progress,
    /// Terminal state of the run before the current one.
    previous: Option<(u32, RunState<E>)>,
}

/// State shared by the supervisor, its handle and its worker.
pub(crate) struct RunControl<M: RawMutex, E: Debug> {
    cancel: CancelToken<M>,
    inner: BlockingMutex<M, RefCell<Inner<E>>>,
    /// Carries the generation of the run that just reached a terminal state.
    finished: Signal<M, u32>,
}

impl<M: RawMutex, E: Debug + Clone> RunControl<M, E> {
    const fn new() -> Self {
        Self {
            cancel: CancelToken::new(),
            inner: BlockingMutex::new(RefCell::new(Inner {
                state: RunState::Idle,
                generation: 0,
                progress: Progress::new(0, 0),
                previous: None,
            })),
            finished: Signal::new(),
        }
    }

    /// Move to `Running` unless a run is already active. Returns the new generation.
    fn begin(&self, total: usize) -> Result<u32, StartError> {
        self.inner.lock(|inner| {
            let mut inner = inner.borrow_mut();
            if inner.state.is_running() {
                return Err(StartError::AlreadyRunning);
            }
            let generation = inner.generation.wrapping_add(1);
            let previous = core::mem::replace(&mut inner.state, RunState::Running);
            if previous.is_terminal() {
                inner.previous = Some((inner.generation, previous));
            }
            inner.generation = generation;
            inner.progress = Progress::new(0, total);
            self.cancel.reset();
            self.finished.reset();
            Ok(generation)
        })
    }

    fn record_progress(&self, generation: u32, progress: Progress) {
        self.inner.lock(|inner| {
            let mut inner = inner.borrow_mut();
            if inner.generation == generation {
                inner.progress = progress;
            }
        });
    }

    fn finish(&self, generation: u32, state: RunState<E>) {
        self.inner.lock(|inner| {
            let mut inner = inner.borrow_mut();
            if inner.generation == generation && inner.state.is_running() {
                if let Some(progress) = state.progress() {
                    inner.progress = progress;
                }
                inner.state = state;
            }
        });
        self.finished.signal(generation);
    }

    /// Progress of the latest run, used when a worker disappears mid-run.
    fn progress_of(&self, generation: u32) -> Option<Progress> {
        self.inner.lock(|inner| {
            let inner = inner.borrow();
            (inner.generation == generation).then_some(inner.progress)
        })
    }

    /// Request cancellation of `generation` if it is still the active run.
    fn cancel_run(&self, generation: u32) {
        self.inner.lock(|inner| {
            let inner = inner.borrow();
            if inner.generation == generation && inner.state.is_running() {
                self.cancel.cancel();
            }
        });
    }

    fn cancel_current(&self) {
        self.inner.lock(|inner| {
            if inner.borrow().state.is_running() {
                self.cancel.cancel();
            }
        });
    }

    /// `Some` once `generation` has reached a terminal state. A run whose outcome was
    /// overwritten by two later runs reports `Idle`.
    fn outcome_of(&self, generation: u32) -> Option<RunState<E>> {
        self.inner.lock(|inner| {
            let inner = inner.borrow();
            if inner.generation == generation {
                return inner.state.is_terminal().then(|| inner.state.clone());
            }
            match &inner.previous {
                Some((previous, state)) if *previous == generation => Some(state.clone()),
                _ => Some(RunState::Idle),
            }
        })
    }

    fn state(&self) -> RunState<E> {
        self.inner.lock(|inner| inner.borrow().state.clone())
    }

    fn progress(&self) -> Progress {
        self.inner.lock(|inner| inner.borrow().progress)
    }
}

//==================================================================================SUPERVISOR
struct Resources<D: CanDriver, T> {
    driver: D,
    timer: T,
    /// Open channel of the current run. Left here when a worker is dropped mid-run,
    /// so it is still closed once, before the next `open`.
    channel: Option<D::Channel>,
}

/// Close a channel abandoned by a dropped worker. `true` if there was one.
async fn close_parked<D: CanDriver>(driver: &mut D, parked: &mut Option<D::Channel>) -> bool {
    match parked.take() {
        Some(channel) => {
            warn!("Closing channel left open by an abandoned run");
            if driver.close(channel).await.is_err() {
                warn!("Abandoned channel close failed, ignored");
            }
            true
        }
        None => false,
    }
}

/// Single-run gate around a [`CanDriver`], a [`StepTimer`] and a plan.
pub struct RunSupervisor<M, D, T, P = Plan>
where
    M: RawMutex,
    D: CanDriver,
    T: StepTimer,
    P: AsRef<[Step]>,
{
    config: ChannelConfig,
    plan: P,
    resources: Mutex<M, Resources<D, T>>,
    control: RunControl<M, D::Error>,
}

impl<M, D, T> RunSupervisor<M, D, T, Plan>
where
    M: RawMutex,
    D: CanDriver,
    T: StepTimer,
{
    /// Supervisor running the standard diagnostic plan.
    pub const fn new(driver: D, timer: T, config: ChannelConfig) -> Self {
        Self::with_plan(driver, timer, config, Plan::build())
    }
}

impl<M, D, T, P> RunSupervisor<M, D, T, P>
where
    M: RawMutex,
    D: CanDriver,
    T: StepTimer,
    P: AsRef<[Step]>,
{
    /// Supervisor running a custom list of steps.
    pub const fn with_plan(driver: D, timer: T, config: ChannelConfig, plan: P) -> Self {
        Self {
            config,
            plan,
            resources: Mutex::new(Resources {
                driver,
                timer,
                channel: None,
            }),
            control: RunControl::new(),
        }
    }

    /// Begin a run. Fails with [`StartError::AlreadyRunning`] while another run is
    /// active; terminal states never block a new start.
    ///
    /// Nothing touches the bus until the returned worker is driven.
    #[allow(clippy::type_complexity)]
    pub fn start<S: ProgressSink>(
        &self,
        sink: S,
    ) -> Result<(RunHandle<'_, M, D::Error>, RunWorker<'_, M, D, T, S, P>), StartError> {
        let total = self.plan.as_ref().len();
        let generation = match self.control.begin(total) {
            Ok(generation) => generation,
            Err(error) => {
                warn!("Start rejected: a run is already in progress");
                return Err(error);
            }
        };
        info!("Run {} started: {} steps", generation, total);

        Ok((
            RunHandle {
                control: &self.control,
                generation,
            },
            RunWorker {
                supervisor: self,
                sink,
                generation,
                finished: false,
            },
        ))
    }

    /// Ask the active run, if any, to stop at the next step boundary.
    pub fn cancel(&self) {
        self.control.cancel_current();
    }

    pub fn state(&self) -> RunState<D::Error> {
        self.control.state()
    }

    pub fn is_running(&self) -> bool {
        self.control.state().is_running()
    }

    /// Progress of the latest run.
    pub fn progress(&self) -> Progress {
        self.control.progress()
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn plan(&self) -> &[Step] {
        self.plan.as_ref()
    }

    /// Sum of every step delay of the supervised plan.
    pub fn nominal_duration_ms(&self) -> u64 {
        total_delay_ms(self.plan.as_ref())
    }

    /// Close the channel of a run whose worker was dropped mid-run, if any. Waits
    /// for an active worker to release the driver first.
    pub async fn release_channel(&self) -> bool {
        let mut resources = self.resources.lock().await;
        let Resources {
            driver, channel, ..
        } = &mut *resources;
        close_parked(driver, channel).await
    }

    /// Give the driver and timer back. A channel still parked by an abandoned run is
    /// dropped without `close`; call [`release_channel`](Self::release_channel) first.
    pub fn into_parts(self) -> (D, T) {
        let Resources { driver, timer, .. } = self.resources.into_inner();
        (driver, timer)
    }
}

//==================================================================================HANDLE
/// Caller side of a run: cancel, observe, join.
///
/// A handle only ever acts on its own run; once a later run starts, `cancel` on a
/// stale handle is a no-op.
pub struct RunHandle<'s, M: RawMutex, E: Debug> {
    control: &'s RunControl<M, E>,
    generation: u32,
}

impl<'s, M: RawMutex, E: Debug + Clone> RunHandle<'s, M, E> {
    /// Request cancellation. The run stops before its next transmit, or right after
    /// the transmit in flight; the current delay is never cut short.
    pub fn cancel(&self) {
        self.control.cancel_run(self.generation);
    }

    pub fn is_finished(&self) -> bool {
        self.control.outcome_of(self.generation).is_some()
    }

    /// Frames sent so far by this run, `(0, total)` before the first transmit.
    pub fn progress(&self) -> Option<Progress> {
        self.control.progress_of(self.generation)
    }

    /// Wait for the run to reach a terminal state.
    ///
    /// Returns `RunState::Idle` if the outcome was already overwritten by later runs.
    pub async fn join(self) -> RunState<E> {
        self.wait_terminal().await
    }

    /// Like [`join`](Self::join) but gives up after `millis`, handing the handle back.
    pub async fn join_within<T: StepTimer>(
        self,
        timer: &mut T,
        millis: u32,
    ) -> Result<RunState<E>, Self> {
        let outcome = {
            let wait = self.wait_terminal();
            let deadline = timer.delay_ms(millis);
            pin_mut!(wait);
            pin_mut!(deadline);
            match select(wait, deadline).await {
                Either::Left((state, _)) => Some(state),
                Either::Right(_) => None,
            }
        };
        match outcome {
            Some(state) => Ok(state),
            None => {
                debug!("Run {} still going after {} ms", self.generation, millis);
                Err(self)
            }
        }
    }

    async fn wait_terminal(&self) -> RunState<E> {
        loop {
            if let Some(state) = self.control.outcome_of(self.generation) {
                return state;
            }
            self.control.finished.wait().await;
        }
    }
}

//==================================================================================WORKER
/// Background side of a run. Must be driven (see [`drive`](Self::drive)) for the run
/// to make progress. Dropping it mid-run records the run as `Cancelled` with the
/// frames sent so far; its open channel stays with the supervisor and is closed by
/// the next `drive` or by [`RunSupervisor::release_channel`].
pub struct RunWorker<'s, M, D, T, S, P = Plan>
where
    M: RawMutex,
    D: CanDriver,
    T: StepTimer,
    S: ProgressSink,
    P: AsRef<[Step]>,
{
    supervisor: &'s RunSupervisor<M, D, T, P>,
    sink: S,
    generation: u32,
    finished: bool,
}

impl<'s, M, D, T, S, P> RunWorker<'s, M, D, T, S, P>
where
    M: RawMutex,
    D: CanDriver,
    T: StepTimer,
    S: ProgressSink,
    P: AsRef<[Step]>,
{
    /// Open the channel, run every step, close the channel, publish the outcome.
    ///
    /// A channel left open by an abandoned run is closed first. When `open` fails
    /// no frame is sent and `close` is not called. Otherwise `close` is called
    /// exactly once; a close error is logged and ignored.
    pub async fn drive(mut self) -> RunState<D::Error> {
        let supervisor = self.supervisor;
        let control = &supervisor.control;
        let config = &supervisor.config;

        let result = {
            let mut resources = supervisor.resources.lock().await;
            let Resources {
                driver,
                timer,
                channel: parked,
            } = &mut *resources;
            close_parked(driver, parked).await;

            match driver.open(config).await {
                Err(error) => {
                    error!(
                        "Run {}: channel {:#X} failed to open",
                        self.generation, config.channel
                    );
                    Err(RunFailure::Init(error))
                }
                Ok(opened) => {
                    let channel = parked.insert(opened);
                    info!(
                        "Run {}: channel {:#X} open at {} bit/s",
                        self.generation,
                        config.channel,
                        config.bitrate.bits_per_second()
                    );
                    let mut sink = TrackingSink {
                        control,
                        generation: self.generation,
                        sink: &mut self.sink,
                    };
                    let result = run_plan(
                        supervisor.plan.as_ref(),
                        driver,
                        channel,
                        timer,
                        &mut sink,
                        &control.cancel,
                    )
                    .await;

                    if let Some(channel) = parked.take() {
                        if driver.close(channel).await.is_err() {
                            warn!("Run {}: channel close failed, ignored", self.generation);
                        }
                    }
                    result
                }
            }
        };

        let state = RunState::from(result);
        match &state {
            RunState::Completed(progress) => {
                info!("Run {} completed: {}/{}", self.generation, progress.completed, progress.total)
            }
            RunState::Cancelled(progress) => {
                info!("Run {} cancelled at {}/{}", self.generation, progress.completed, progress.total)
            }
            _ => warn!("Run {} failed", self.generation),
        }
        control.finish(self.generation, state.clone());
        self.finished = true;
        state
    }
}

impl<M, D, T, S, P> Drop for RunWorker<'_, M, D, T, S, P>
where
    M: RawMutex,
    D: CanDriver,
    T: StepTimer,
    S: ProgressSink,
    P: AsRef<[Step]>,
{
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let control = &self.supervisor.control;
        let progress = control
            .progress_of(self.generation)
            .unwrap_or(Progress::new(0, self.supervisor.plan.as_ref().len()));
        warn!("Run {} abandoned at {}/{}", self.generation, progress.completed, progress.total);
        control.finish(self.generation, RunState::Cancelled(progress));
    }
}

/// Records progress for the handle before forwarding it to the caller's sink.
struct TrackingSink<'a, M: RawMutex, E: Debug, S: ProgressSink> {
    control: &'a RunControl<M, E>,
    generation: u32,
    sink: &'a mut S,
}

impl<M: RawMutex, E: Debug + Clone, S: ProgressSink> ProgressSink for TrackingSink<'_, M, E, S> {
    fn on_transmitted(&mut self, progress: Progress) {
        self.control.record_progress(self.generation, progress);
        self.sink.on_transmitted(progress);
    }

    fn on_progress(&mut self, progress: Progress) {
        self.control.record_progress(self.generation, progress);
        self.sink.on_progress(progress);
    }
}

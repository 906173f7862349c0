mod helpers {
    include!("../../helpers/mod.rs");
}

use chimera_stim::{
    build_plan, Bitrate, ChannelConfig, NullSink, Progress, RunFailure, RunState, RunSupervisor,
    SignalSink, StartError, Step,
};
use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, NoopRawMutex};
use embassy_sync::signal::Signal;
use helpers::{
    GatedTimer, InstantTimer, MockDriver, SleepTimer, ERR_BUSOFF, ERR_ILLOPERATION,
    ERR_INITIALIZE,
};
use static_cell::StaticCell;

/// First `len` steps of the diagnostic plan.
fn short_plan(len: usize) -> Vec<Step> {
    build_plan()[..len].to_vec()
}

#[tokio::test]
async fn completed_run_opens_and_closes_once() {
    let driver = MockDriver::new();
    let config = ChannelConfig::default().with_bitrate(Bitrate::Kbps500);
    let supervisor = RunSupervisor::<NoopRawMutex, _, _, _>::with_plan(
        driver.clone(),
        InstantTimer::new(),
        config,
        short_plan(12),
    );

    let (handle, worker) = supervisor.start(NullSink).expect("first start must succeed");
    assert!(supervisor.is_running());
    let (driven, joined) = tokio::join!(worker.drive(), handle.join());

    let expected = RunState::Completed(Progress::new(12, 12));
    assert_eq!(driven, expected);
    assert_eq!(joined, expected);
    assert_eq!(supervisor.state(), expected);
    assert_eq!(supervisor.progress(), Progress::new(12, 12));

    assert_eq!(driver.open_calls(), 1);
    assert_eq!(driver.close_calls(), 1);
    assert_eq!(driver.sent().len(), 12);
    assert_eq!(driver.with_log(|log| log.config), Some(config));
    assert_eq!(driver.open_channels(), 0);
    assert_eq!(supervisor.config(), &config);
    assert_eq!(supervisor.plan().len(), 12);
}

#[tokio::test]
async fn nominal_duration_sums_plan_delays() {
    let standard = RunSupervisor::<NoopRawMutex, _, _>::new(
        MockDriver::new(),
        InstantTimer::new(),
        ChannelConfig::default(),
    );
    assert_eq!(standard.nominal_duration_ms(), 93_700);

    let plan = short_plan(3);
    let expected: u64 = plan.iter().map(|step| step.delay_ms as u64).sum();
    let custom = RunSupervisor::<NoopRawMutex, _, _, _>::with_plan(
        MockDriver::new(),
        InstantTimer::new(),
        ChannelConfig::default(),
        plan,
    );
    assert_eq!(custom.nominal_duration_ms(), expected);
}

#[tokio::test]
/// Nothing is sent and nothing is closed when the channel never opened.
async fn init_failure_skips_transmit_and_close() {
    let driver = MockDriver::new().failing_open(ERR_INITIALIZE);
    let supervisor = RunSupervisor::<NoopRawMutex, _, _>::new(
        driver.clone(),
        InstantTimer::new(),
        ChannelConfig::default(),
    );

    let (handle, worker) = supervisor.start(NullSink).expect("start must succeed");
    let (_, state) = tokio::join!(worker.drive(), handle.join());

    assert_eq!(state, RunState::Failed(RunFailure::Init(ERR_INITIALIZE)));
    assert_eq!(driver.open_calls(), 1);
    assert_eq!(driver.transmit_calls(), 0);
    assert_eq!(driver.close_calls(), 0);
}

#[tokio::test]
async fn transmit_failure_still_closes_channel() {
    let driver = MockDriver::new().failing_at(3, ERR_BUSOFF);
    let supervisor = RunSupervisor::<NoopRawMutex, _, _, _>::with_plan(
        driver.clone(),
        InstantTimer::new(),
        ChannelConfig::default(),
        short_plan(8),
    );

    let (_handle, worker) = supervisor.start(NullSink).expect("start must succeed");
    let state = worker.drive().await;

    assert_eq!(
        state,
        RunState::Failed(RunFailure::Transmit {
            step_index: 3,
            error: ERR_BUSOFF
        })
    );
    assert_eq!(driver.transmit_calls(), 4);
    assert_eq!(driver.close_calls(), 1);
}

#[tokio::test]
async fn cancelled_run_closes_channel() {
    let driver = MockDriver::new();
    let (timer, gate) = GatedTimer::new(5);
    let supervisor = RunSupervisor::<NoopRawMutex, _, _>::new(
        driver.clone(),
        timer,
        ChannelConfig::default(),
    );

    let (handle, worker) = supervisor.start(NullSink).expect("start must succeed");
    let (state, _) = tokio::join!(worker.drive(), async {
        gate.reached().await;
        // The frame of the parked step already went out.
        assert_eq!(handle.progress(), Some(Progress::new(5, 245)));
        handle.cancel();
        gate.release();
        handle.join().await
    });

    assert_eq!(state, RunState::Cancelled(Progress::new(5, 245)));
    assert_eq!(driver.sent().len(), 5);
    assert_eq!(driver.close_calls(), 1);
}

#[tokio::test]
/// Close errors are logged and dropped; the outcome stays `Completed`.
async fn close_error_is_swallowed() {
    let driver = MockDriver::new().failing_close(ERR_ILLOPERATION);
    let supervisor = RunSupervisor::<NoopRawMutex, _, _, _>::with_plan(
        driver.clone(),
        InstantTimer::new(),
        ChannelConfig::default(),
        short_plan(3),
    );

    let (_handle, worker) = supervisor.start(NullSink).expect("start must succeed");
    assert_eq!(
        worker.drive().await,
        RunState::Completed(Progress::new(3, 3))
    );
    assert_eq!(driver.close_calls(), 1);
}

#[tokio::test]
async fn second_start_is_rejected_while_running() {
    let driver = MockDriver::new();
    let supervisor = RunSupervisor::<NoopRawMutex, _, _, _>::with_plan(
        driver.clone(),
        InstantTimer::new(),
        ChannelConfig::default(),
        short_plan(4),
    );

    let (_handle, worker) = supervisor.start(NullSink).expect("first start must succeed");
    assert_eq!(
        supervisor.start(NullSink).err(),
        Some(StartError::AlreadyRunning)
    );
    // The rejected start touched nothing.
    assert_eq!(driver.open_calls(), 0);

    worker.drive().await;
    assert_eq!(driver.open_calls(), 1);

    // Terminal states never block a new run.
    let (_handle, worker) = supervisor.start(NullSink).expect("restart must succeed");
    assert_eq!(
        worker.drive().await,
        RunState::Completed(Progress::new(4, 4))
    );
    assert_eq!(driver.open_calls(), 2);
    assert_eq!(driver.close_calls(), 2);
    assert_eq!(driver.sent().len(), 8);
}

#[tokio::test]
/// A handle from a finished run can no longer cancel the next one, and still joins
/// to its own outcome.
async fn stale_handle_does_not_touch_next_run() {
    let driver = MockDriver::new();
    let supervisor = RunSupervisor::<NoopRawMutex, _, _, _>::with_plan(
        driver.clone(),
        InstantTimer::new(),
        ChannelConfig::default(),
        short_plan(6),
    );

    let (first, worker) = supervisor.start(NullSink).expect("start must succeed");
    worker.drive().await;
    assert!(first.is_finished());

    let (second, worker) = supervisor.start(NullSink).expect("restart must succeed");
    first.cancel();
    assert!(!second.is_finished());
    assert_eq!(
        worker.drive().await,
        RunState::Completed(Progress::new(6, 6))
    );

    assert_eq!(first.join().await, RunState::Completed(Progress::new(6, 6)));
    assert_eq!(second.join().await, RunState::Completed(Progress::new(6, 6)));
    assert_eq!(driver.sent().len(), 12);
}

#[tokio::test]
async fn supervisor_cancel_before_drive_sends_nothing() {
    let driver = MockDriver::new();
    let supervisor = RunSupervisor::<NoopRawMutex, _, _>::new(
        driver.clone(),
        InstantTimer::new(),
        ChannelConfig::default(),
    );

    let (handle, worker) = supervisor.start(NullSink).expect("start must succeed");
    supervisor.cancel();
    let state = worker.drive().await;

    assert_eq!(state, RunState::Cancelled(Progress::new(0, 245)));
    assert_eq!(handle.join().await, state);
    // The channel was opened, so it is closed even though no frame left.
    assert_eq!(driver.open_calls(), 1);
    assert_eq!(driver.close_calls(), 1);
    assert_eq!(driver.transmit_calls(), 0);
}

#[tokio::test]
/// A worker dropped before being driven marks its run cancelled.
async fn dropped_worker_cancels_run() {
    let driver = MockDriver::new();
    let supervisor = RunSupervisor::<NoopRawMutex, _, _>::new(
        driver.clone(),
        InstantTimer::new(),
        ChannelConfig::default(),
    );

    let (handle, worker) = supervisor.start(NullSink).expect("start must succeed");
    drop(worker);

    assert!(!supervisor.is_running());
    assert_eq!(handle.join().await, RunState::Cancelled(Progress::new(0, 245)));
    assert_eq!(driver.open_calls(), 0);
    assert!(supervisor.start(NullSink).is_ok());
}

#[tokio::test]
/// A worker dropped mid-run counts every frame it sent, and the supervisor closes
/// its channel before the next run opens the adapter again.
async fn abandoned_run_channel_closed_by_next_drive() {
    let driver = MockDriver::new();
    let (timer, gate) = GatedTimer::new(3);
    let supervisor = RunSupervisor::<NoopRawMutex, _, _>::new(
        driver.clone(),
        timer,
        ChannelConfig::default(),
    );

    let (handle, worker) = supervisor.start(NullSink).expect("start must succeed");
    tokio::select! {
        state = worker.drive() => panic!("run cannot end while the timer is parked: {:?}", state),
        _ = gate.reached() => {}
    }

    let abandoned = RunState::Cancelled(Progress::new(3, 245));
    assert_eq!(supervisor.state(), abandoned);
    assert_eq!(handle.join().await, abandoned);
    assert_eq!(driver.sent().len(), 3);
    assert_eq!(driver.open_calls(), 1);
    assert_eq!(driver.close_calls(), 0);
    assert_eq!(driver.open_channels(), 1);

    let (_handle, worker) = supervisor.start(NullSink).expect("restart must succeed");
    assert_eq!(
        worker.drive().await,
        RunState::Completed(Progress::new(245, 245))
    );
    assert_eq!(driver.open_calls(), 2);
    assert_eq!(driver.close_calls(), 2);
    assert_eq!(driver.open_channels(), 0);
    assert_eq!(driver.sent().len(), 3 + 245);
}

#[tokio::test]
async fn release_channel_closes_abandoned_channel_once() {
    let driver = MockDriver::new();
    let (timer, gate) = GatedTimer::new(2);
    let supervisor = RunSupervisor::<NoopRawMutex, _, _, _>::with_plan(
        driver.clone(),
        timer,
        ChannelConfig::default(),
        short_plan(6),
    );

    // Nothing parked yet.
    assert!(!supervisor.release_channel().await);

    let (_handle, worker) = supervisor.start(NullSink).expect("start must succeed");
    tokio::select! {
        state = worker.drive() => panic!("run cannot end while the timer is parked: {:?}", state),
        _ = gate.reached() => {}
    }
    assert_eq!(driver.open_channels(), 1);

    assert!(supervisor.release_channel().await);
    assert!(!supervisor.release_channel().await);
    assert_eq!(driver.close_calls(), 1);
    assert_eq!(driver.open_channels(), 0);

    let (returned, _timer) = supervisor.into_parts();
    assert_eq!(returned.open_calls(), 1);
    assert_eq!(returned.sent().len(), 2);
}

#[tokio::test]
async fn join_within_hands_back_the_handle_on_timeout() {
    let (timer, gate) = GatedTimer::new(2);
    let supervisor = RunSupervisor::<NoopRawMutex, _, _, _>::with_plan(
        MockDriver::new(),
        timer,
        ChannelConfig::default(),
        short_plan(5),
    );

    let (handle, worker) = supervisor.start(NullSink).expect("start must succeed");
    let (_, state) = tokio::join!(worker.drive(), async {
        gate.reached().await;
        let handle = match handle.join_within(&mut SleepTimer, 20).await {
            Ok(state) => panic!("run cannot end while the timer is parked: {:?}", state),
            Err(handle) => handle,
        };
        handle.cancel();
        gate.release();
        handle
            .join_within(&mut SleepTimer, 1_000)
            .await
            .unwrap_or_else(|_| panic!("run must end once released"))
    });

    assert_eq!(state, RunState::Cancelled(Progress::new(2, 5)));
}

type ThreadedSupervisor =
    RunSupervisor<CriticalSectionRawMutex, MockDriver, InstantTimer, Vec<Step>>;

static THREADED: StaticCell<ThreadedSupervisor> = StaticCell::new();
static LATEST: Signal<CriticalSectionRawMutex, Progress> = Signal::new();

#[tokio::test]
/// The worker runs on its own thread while the caller joins from a tokio task.
async fn worker_on_dedicated_thread() {
    let driver = MockDriver::new();
    let supervisor: &'static ThreadedSupervisor = THREADED.init(RunSupervisor::with_plan(
        driver.clone(),
        InstantTimer::new(),
        ChannelConfig::default(),
        short_plan(30),
    ));

    let (handle, worker) = supervisor
        .start(SignalSink::new(&LATEST))
        .expect("start must succeed");

    let thread = std::thread::spawn(move || {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime")
            .block_on(worker.drive())
    });

    let state = handle.join().await;
    assert_eq!(state, RunState::Completed(Progress::new(30, 30)));
    assert_eq!(thread.join().expect("worker thread"), state);
    assert_eq!(LATEST.try_take(), Some(Progress::new(30, 30)));
    assert_eq!(driver.sent().len(), 30);
    assert_eq!(driver.close_calls(), 1);
}

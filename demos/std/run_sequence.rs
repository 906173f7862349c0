//! Run the diagnostic sequence against a simulated adapter.
//!
//! The worker runs on its own thread (as it would next to a UI event loop) while
//! the main task polls progress and joins the run.
//!
//! Usage:
//!   cargo run --example run_sequence --features log
//!   cargo run --example run_sequence --features log -- --fast
//!   cargo run --example run_sequence --features log -- --fast --stop-after 120
//!
//! `--fast` divides every delay by 100. `--stop-after N` cancels from the progress
//! sink once N steps completed. Set RUST_LOG=trace to see every frame.

use chimera_stim::{
    CanDriver, CanFrame, ChannelConfig, Progress, ProgressSink, RunState, RunSupervisor, SignalSink,
    StepTimer,
};
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, signal::Signal};
use log::{debug, error, info, warn};
use static_cell::StaticCell;
use tokio::time::{sleep, Duration};

/// PCAN-Basic style status code.
type Status = u32;

/// Adapter stand-in that accepts every frame and logs it.
struct SimulatedAdapter {
    frames: usize,
}

impl CanDriver for SimulatedAdapter {
    type Error = Status;
    type Channel = u16;

    async fn open<'a>(&'a mut self, config: &'a ChannelConfig) -> Result<u16, Status> {
        info!(
            "Initialize channel {:#X} at {} bit/s (BTR0BTR1 {:#06X})",
            config.channel,
            config.bitrate.bits_per_second(),
            config.bitrate.btr0btr1()
        );
        Ok(config.channel)
    }

    async fn transmit<'a>(&'a mut self, channel: &'a mut u16, frame: &'a CanFrame) -> Result<(), Status> {
        self.frames += 1;
        debug!(
            "[{:#X}] id={:#05X} data={:02X?}",
            channel,
            frame.can_id().raw(),
            frame.payload()
        );
        Ok(())
    }

    async fn close<'a>(&'a mut self, channel: u16) -> Result<(), Status> {
        info!("Uninitialize channel {:#X} after {} frames", channel, self.frames);
        Ok(())
    }
}

/// Tokio sleep, optionally sped up.
struct HostTimer {
    divisor: u32,
}

impl StepTimer for HostTimer {
    async fn delay_ms(&mut self, millis: u32) {
        sleep(Duration::from_millis((millis / self.divisor) as u64)).await;
    }
}

type Supervisor = RunSupervisor<CriticalSectionRawMutex, SimulatedAdapter, HostTimer>;

static SUPERVISOR: StaticCell<Supervisor> = StaticCell::new();
static LATEST: Signal<CriticalSectionRawMutex, Progress> = Signal::new();

struct Options {
    fast: bool,
    stop_after: Option<usize>,
}

fn parse_args() -> Result<Options, String> {
    let mut options = Options {
        fast: false,
        stop_after: None,
    };
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--fast" => options.fast = true,
            "--stop-after" => {
                let value = args.next().ok_or("--stop-after needs a step count")?;
                let steps = value
                    .parse()
                    .map_err(|e| format!("invalid step count {value:?}: {e}"))?;
                options.stop_after = Some(steps);
            }
            other => return Err(format!("unknown argument {other:?}")),
        }
    }
    Ok(options)
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = match parse_args() {
        Ok(options) => options,
        Err(message) => {
            error!("{message}");
            std::process::exit(2);
        }
    };

    let supervisor: &'static Supervisor = SUPERVISOR.init(RunSupervisor::new(
        SimulatedAdapter { frames: 0 },
        HostTimer {
            divisor: if options.fast { 100 } else { 1 },
        },
        ChannelConfig::default(),
    ));
    info!(
        "Plan: {} steps, nominal duration {} s",
        supervisor.plan().len(),
        supervisor.nominal_duration_ms() / 1_000
    );

    let stop_after = options.stop_after;
    let mut latest = SignalSink::new(&LATEST);
    let sink = move |progress: Progress| {
        latest.on_progress(progress);
        if stop_after.is_some_and(|limit| progress.completed == limit) {
            warn!("Stopping after {} steps", progress.completed);
            supervisor.cancel();
        }
    };

    let (mut handle, worker) = match supervisor.start(sink) {
        Ok(parts) => parts,
        Err(error) => {
            error!("{error}");
            std::process::exit(1);
        }
    };

    let thread = std::thread::spawn(move || {
        tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map(|runtime| runtime.block_on(worker.drive()))
    });

    let mut poll_timer = HostTimer { divisor: 1 };
    let state = loop {
        match handle.join_within(&mut poll_timer, 250).await {
            Ok(state) => break state,
            Err(pending) => handle = pending,
        }
        if let Some(progress) = LATEST.try_take() {
            info!(
                "Progress {:>3}% ({}/{})",
                progress.percent(),
                progress.completed,
                progress.total
            );
        }
    };

    match thread.join() {
        Ok(Ok(_)) => {}
        Ok(Err(io)) => error!("Worker runtime failed to start: {io}"),
        Err(panic) => error!("Worker thread panicked: {panic:?}"),
    }

    match state {
        RunState::Completed(progress) => info!("Completed {}/{}", progress.completed, progress.total),
        RunState::Cancelled(progress) => {
            info!("Cancelled after {}/{}", progress.completed, progress.total)
        }
        RunState::Failed(failure) => {
            error!("{failure}");
            std::process::exit(1);
        }
        RunState::Idle | RunState::Running => {}
    }
}

use chimera_stim::{EmbassyTimer, StepTimer};
use std::time::{Duration, Instant};

#[tokio::test]
/// The embassy-backed timer waits at least the requested time on the host driver.
async fn embassy_timer_waits_full_delay() {
    let mut timer = EmbassyTimer;

    let start = Instant::now();
    timer.delay_ms(20).await;
    assert!(start.elapsed() >= Duration::from_millis(20));

    let start = Instant::now();
    timer.delay_ms(0).await;
    assert!(start.elapsed() < Duration::from_millis(500));
}

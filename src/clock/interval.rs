//! Interval-timer clock.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::Clock;
use crate::core::{PendingSignals, SignalKind};
use crate::error::ClockError;

struct Running {
    period: Duration,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Clock backed by a kernel interval timer.
///
/// On Linux this is a `timerfd` on `CLOCK_MONOTONIC`, so sub-millisecond
/// periods keep their precision. The first tick fires one full period after
/// arming. Each read of the timer reports how many periods elapsed since the
/// previous read and every one of them is raised: if the scheduler falls
/// behind, the pending counter climbs above one and it sees the overrun.
///
/// Elsewhere a tokio interval stands in, with millisecond resolution.
#[derive(Default)]
pub struct IntervalClock {
    running: Option<Running>,
}

impl IntervalClock {
    /// Creates a disarmed clock.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for IntervalClock {
    fn arm(&mut self, period: Duration, pending: Arc<PendingSignals>) -> Result<(), ClockError> {
        if period.is_zero() {
            return Err(ClockError::ZeroPeriod);
        }
        if let Some(r) = &self.running {
            return Err(ClockError::AlreadyArmed { period: r.period });
        }

        let mut ticks = source::Ticks::start(period)?;
        let token = CancellationToken::new();
        let stop = token.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = stop.cancelled() => break,
                    elapsed = ticks.next() => match elapsed {
                        Ok(n) => {
                            for _ in 0..n {
                                pending.raise(SignalKind::ClockFired);
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "interval timer failed, clock stopped");
                            break;
                        }
                    },
                }
            }
        });

        self.running = Some(Running {
            period,
            token,
            handle,
        });
        Ok(())
    }

    fn disarm(&mut self) {
        if let Some(r) = self.running.take() {
            r.token.cancel();
            r.handle.abort();
        }
    }

    fn is_armed(&self) -> bool {
        self.running.is_some()
    }
}

impl Drop for IntervalClock {
    fn drop(&mut self) {
        self.disarm();
    }
}

#[cfg(target_os = "linux")]
mod source {
    use std::io;
    use std::os::fd::{AsFd, AsRawFd, RawFd};
    use std::time::Duration;

    use nix::sys::time::TimeSpec;
    use nix::sys::timerfd::{ClockId, Expiration, TimerFd, TimerFlags, TimerSetTimeFlags};
    use nix::unistd::read;
    use tokio::io::Interest;
    use tokio::io::unix::AsyncFd;

    struct Timer(TimerFd);

    impl AsRawFd for Timer {
        fn as_raw_fd(&self) -> RawFd {
            self.0.as_fd().as_raw_fd()
        }
    }

    impl Timer {
        /// Periods elapsed since the last read; `WouldBlock` if none.
        fn expirations(&self) -> io::Result<u64> {
            let mut buf = [0u8; 8];
            read(self.as_raw_fd(), &mut buf)?;
            Ok(u64::from_ne_bytes(buf))
        }
    }

    pub(super) struct Ticks {
        fd: AsyncFd<Timer>,
    }

    impl Ticks {
        pub(super) fn start(period: Duration) -> io::Result<Self> {
            let timer = TimerFd::new(
                ClockId::CLOCK_MONOTONIC,
                TimerFlags::TFD_NONBLOCK | TimerFlags::TFD_CLOEXEC,
            )?;
            timer.set(
                Expiration::Interval(TimeSpec::from_duration(period)),
                TimerSetTimeFlags::empty(),
            )?;
            Ok(Self {
                fd: AsyncFd::with_interest(Timer(timer), Interest::READABLE)?,
            })
        }

        /// Waits for the next expiration and returns how many periods passed.
        pub(super) async fn next(&mut self) -> io::Result<u64> {
            loop {
                let mut guard = self.fd.readable().await?;
                match guard.try_io(|fd| fd.get_ref().expirations()) {
                    Ok(result) => return result,
                    Err(_would_block) => continue,
                }
            }
        }
    }
}

#[cfg(not(target_os = "linux"))]
mod source {
    use std::io;
    use std::time::Duration;

    use tokio::time::{self, Instant, Interval, MissedTickBehavior};

    pub(super) struct Ticks {
        interval: Interval,
    }

    impl Ticks {
        pub(super) fn start(period: Duration) -> io::Result<Self> {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
            Ok(Self { interval })
        }

        pub(super) async fn next(&mut self) -> io::Result<u64> {
            self.interval.tick().await;
            Ok(1)
        }
    }
}

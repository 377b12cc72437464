/// Time source for every wait in the drivers (poll intervals, retry settles, tuner settles).
pub trait Clock: Clone {
    fn now(&self) -> std::time::Instant;

    fn sleep(&self, duration: std::time::Duration);
}

#[derive(Debug, Default, Copy, Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> std::time::Instant {
        std::time::Instant::now()
    }

    fn sleep(&self, duration: std::time::Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

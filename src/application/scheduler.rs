use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::domain::stream::LoopMetrics;

/// Marca el ritmo fijo del bucle de proceso. El trabajo que excede su
/// presupuesto se contabiliza, nunca se interrumpe.
pub struct Scheduler {
    tick_budget: Duration,
    deadline_misses: u64,
    worst_case: Duration,
    total_ticks: u64,
}

impl Scheduler {
    pub fn new(tick_hz: u32) -> Self {
        let tick_budget = Duration::from_millis(1000 / tick_hz.max(1) as u64);

        Self {
            tick_budget,
            deadline_misses: 0,
            worst_case: Duration::ZERO,
            total_ticks: 0,
        }
    }

    pub fn tick_budget(&self) -> Duration {
        self.tick_budget
    }

    pub fn metrics(&self) -> LoopMetrics {
        LoopMetrics {
            total_ticks: self.total_ticks,
            deadline_misses: self.deadline_misses,
            worst_tick_ms: self.worst_case.as_secs_f32() * 1000.0,
        }
    }

    pub fn tick<F>(&mut self, step: F)
    where
        F: FnOnce(LoopMetrics),
    {
        let start = Instant::now();

        step(self.metrics());

        let elapsed = start.elapsed();

        if elapsed > self.tick_budget {
            self.deadline_misses += 1;
            debug!("Tick {} excedió el presupuesto: {:?}", self.total_ticks, elapsed);
        }

        if elapsed > self.worst_case {
            self.worst_case = elapsed;
        }

        self.total_ticks += 1;
    }

    /// Ejecuta ticks hasta que se activa `stop`, que sólo se mira entre ticks.
    pub fn run<F>(&mut self, stop: &AtomicBool, mut step: F)
    where
        F: FnMut(LoopMetrics),
    {
        while !stop.load(Ordering::Relaxed) {
            let cycle_start = Instant::now();

            self.tick(&mut step);

            let elapsed = cycle_start.elapsed();

            if elapsed < self.tick_budget {
                std::thread::sleep(self.tick_budget - elapsed);
            }
        }
    }
}

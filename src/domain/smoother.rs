use std::collections::VecDeque;

/// Frames recientes que cuentan para la confianza de presencia.
pub const PRESENCE_WINDOW: usize = 10;

/// Ventana deslizante sobre la marca "hay alguien" del detector en cada frame.
#[derive(Debug, Clone)]
pub struct DetectionSmoother {
    window: VecDeque<bool>,
    capacity: usize,
}

impl DetectionSmoother {
    pub fn new() -> Self {
        Self {
            window: VecDeque::with_capacity(PRESENCE_WINDOW),
            capacity: PRESENCE_WINDOW,
        }
    }

    pub fn record(&mut self, presence: bool) {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(presence);
    }

    /// Fracción de frames de la ventana con persona, 0 si está vacía.
    pub fn confidence(&self) -> f32 {
        if self.window.is_empty() {
            return 0.0;
        }
        let hits = self.window.iter().filter(|&&p| p).count();
        hits as f32 / self.window.len() as f32
    }
}

impl Default for DetectionSmoother {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_window_is_zero() {
        assert_eq!(DetectionSmoother::new().confidence(), 0.0);
    }

    #[test]
    fn window_never_exceeds_capacity() {
        let mut s = DetectionSmoother::new();
        for _ in 0..25 {
            s.record(true);
        }
        assert_eq!(s.window.len(), PRESENCE_WINDOW);
        assert_eq!(s.confidence(), 1.0);
    }

    #[test]
    fn matches_fraction_of_last_ten() {
        let mut s = DetectionSmoother::new();
        let mut seen = Vec::new();
        // patrón determinista pero irregular
        for i in 0u32..37 {
            let presence = (i * 7 + 3) % 5 < 2;
            s.record(presence);
            seen.push(presence);

            let tail = &seen[seen.len().saturating_sub(PRESENCE_WINDOW)..];
            let expected = tail.iter().filter(|&&p| p).count() as f32 / tail.len() as f32;
            assert!((s.confidence() - expected).abs() < 1e-6, "after {} records", i + 1);
        }
    }

    #[test]
    fn oldest_entry_evicted_first() {
        let mut s = DetectionSmoother::new();
        s.record(true);
        for _ in 0..9 {
            s.record(false);
        }
        assert!((s.confidence() - 0.1).abs() < 1e-6);
        s.record(false);
        assert_eq!(s.confidence(), 0.0);
    }
}

use std::collections::VecDeque;

/// Bounded rolling window of (timestamp, y) samples. Oldest samples fall
/// off the back once capacity is reached.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    deque: VecDeque<(f64, f32)>,
    capacity: usize,
}

impl SampleWindow {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            deque: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, t: f64, y: f32) {
        if self.deque.len() == self.capacity {
            self.deque.pop_front();
        }
        self.deque.push_back((t, y));
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.deque.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.deque.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.deque.len() == self.capacity
    }

    #[inline]
    pub fn clear(&mut self) {
        self.deque.clear()
    }

    #[inline]
    pub fn oldest(&self) -> Option<(f64, f32)> {
        self.deque.front().copied()
    }

    #[inline]
    pub fn newest(&self) -> Option<(f64, f32)> {
        self.deque.back().copied()
    }

    /// Vertical displacement between the window endpoints.
    pub fn displacement(&self) -> Option<f32> {
        let (_, y0) = self.oldest()?;
        let (_, y1) = self.newest()?;

        Some((y1 - y0).abs())
    }

    /// Endpoint velocity |dy|/dt, None while the window spans no time.
    pub fn velocity(&self) -> Option<f32> {
        let (t0, y0) = self.oldest()?;
        let (t1, y1) = self.newest()?;

        let dt = (t1 - t0) as f32;
        if dt <= 0.0 {
            return None;
        }

        Some((y1 - y0).abs() / dt)
    }

    pub fn mean_y(&self) -> Option<f32> {
        if self.deque.is_empty() {
            return None;
        }

        Some(self.deque.iter().map(|(_, y)| y).sum::<f32>() / self.deque.len() as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_drops_oldest_at_capacity() {
        let mut w = SampleWindow::with_capacity(3);
        for i in 0..5 {
            w.push(i as f64, i as f32);
        }

        assert_eq!(w.len(), 3);
        assert_eq!(w.oldest(), Some((2.0, 2.0)));
        assert_eq!(w.newest(), Some((4.0, 4.0)));
    }

    #[test]
    fn velocity_from_endpoints() {
        let mut w = SampleWindow::with_capacity(10);
        w.push(0.0, 0.10);
        w.push(0.1, 0.12);
        w.push(0.2, 0.20);

        // |0.20 - 0.10| / 0.2
        assert!((w.velocity().unwrap() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn velocity_needs_elapsed_time() {
        let mut w = SampleWindow::with_capacity(10);
        assert!(w.velocity().is_none());
        w.push(1.0, 0.5);
        assert!(w.velocity().is_none());
    }

    #[test]
    fn mean_y_averages_the_window() {
        let mut w = SampleWindow::with_capacity(4);
        w.push(0.0, 0.2);
        w.push(0.1, 0.4);
        assert!((w.mean_y().unwrap() - 0.3).abs() < 1e-6);
    }
}

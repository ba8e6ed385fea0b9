//! Round-robin selection strategy.

use std::sync::Arc;

use crate::load_balancer::endpoint::Endpoint;

/// Round-robin cursor.
///
/// The cursor points at the last endpoint handed out; `None` means the next
/// selection starts at the first endpoint.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursor: Option<usize>,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance past the last selection, scanning at most one full lap, and
    /// return the first endpoint that is not dead.
    pub fn select(&mut self, endpoints: &[Arc<Endpoint>]) -> Option<Arc<Endpoint>> {
        let len = endpoints.len();
        for _ in 0..len {
            let index = match self.cursor {
                Some(c) if c + 1 < len => c + 1,
                _ => 0,
            };
            self.cursor = Some(index);
            let endpoint = &endpoints[index];
            if !endpoint.is_dead() {
                return Some(endpoint.clone());
            }
        }
        None
    }

    /// Restart the rotation at the first endpoint.
    pub fn reset(&mut self) {
        self.cursor = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn endpoints(n: usize) -> Vec<Arc<Endpoint>> {
        (0..n)
            .map(|i| {
                let url = Url::parse(&format!("http://127.0.0.1:{}", 9200 + i)).unwrap();
                Arc::new(Endpoint::new(url.as_str(), url.clone()))
            })
            .collect()
    }

    #[test]
    fn test_round_robin() {
        let mut rr = RoundRobin::new();
        let eps = endpoints(2);

        let s1 = rr.select(&eps).unwrap();
        assert_eq!(s1.url(), eps[0].url());

        let s2 = rr.select(&eps).unwrap();
        assert_eq!(s2.url(), eps[1].url());

        let s3 = rr.select(&eps).unwrap();
        assert_eq!(s3.url(), eps[0].url());
    }

    #[test]
    fn test_skips_dead() {
        let mut rr = RoundRobin::new();
        let eps = endpoints(3);
        eps[1].mark_dead();

        let picked: Vec<_> = (0..3).map(|_| rr.select(&eps).unwrap().url().port()).collect();
        assert_eq!(picked, vec![Some(9200), Some(9202), Some(9200)]);
    }

    #[test]
    fn test_all_dead_and_empty() {
        let mut rr = RoundRobin::new();
        assert!(rr.select(&[]).is_none());

        let eps = endpoints(2);
        eps.iter().for_each(|e| e.mark_dead());
        assert!(rr.select(&eps).is_none());
    }

    #[test]
    fn test_cursor_survives_shrinking_list() {
        let mut rr = RoundRobin::new();
        let eps = endpoints(3);
        rr.select(&eps);
        rr.select(&eps);
        rr.select(&eps);
        // cursor now at index 2, list shrinks to 2 entries
        let shorter = &eps[..2];
        assert_eq!(rr.select(shorter).unwrap().url(), eps[0].url());
    }
}

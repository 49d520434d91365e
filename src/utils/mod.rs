use std::time::Instant;
use tracing::info;

/// Logs when a stage starts and how long it took once dropped.
pub struct Timer {
    stage: &'static str,
    started: Instant,
}

impl Timer {
    pub fn start(stage: &'static str) -> Self {
        info!("{} ...", stage);
        Self {
            stage,
            started: Instant::now(),
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        info!("{} finished in {:.1?}", self.stage, self.started.elapsed());
    }
}

/// 1234567 → "1,234,567"
pub fn fmt_number(n: u64) -> String {
    let digits = n.to_string();
    let head = digits.len() % 3;
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (i + 3 - head) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thousands_separators() {
        assert_eq!(fmt_number(0), "0");
        assert_eq!(fmt_number(999), "999");
        assert_eq!(fmt_number(1_000), "1,000");
        assert_eq!(fmt_number(42_000), "42,000");
        assert_eq!(fmt_number(1_234_567), "1,234,567");
    }
}

//! Daily price bar representation.

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub ticker: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl Bar {
    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bar() -> Bar {
        Bar {
            ticker: "IBM".into(),
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            open: 100.0,
            high: 110.0,
            low: 90.0,
            close: 105.0,
            volume: 50_000,
        }
    }

    #[test]
    fn typical_price() {
        let bar = sample_bar();
        let expected = (110.0 + 90.0 + 105.0) / 3.0;
        assert!((bar.typical_price() - expected).abs() < f64::EPSILON);
    }
}

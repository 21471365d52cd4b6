use avida_derive::BinaryCodec;
use std::fmt;

/// Non-negative fitness proxy; the scheduler's selection weight.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd, BinaryCodec)]
pub struct Merit(f64);

impl Merit {
    pub const ZERO: Merit = Merit(0.0);

    /// Negative and NaN inputs become zero.
    pub fn new(value: f64) -> Self {
        if value > 0.0 { Merit(value) } else { Merit(0.0) }
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0.0
    }

    pub fn scaled(&self, factor: f64) -> Merit {
        Merit::new(self.0 * factor)
    }
}

impl fmt::Display for Merit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// How an offspring's base merit is derived from its size statistics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SizeMeritMethod {
    Constant = 0,
    Copied = 1,
    Executed = 2,
    Full = 3,
    LeastSize = 4,
    SqrtLeastSize = 5,
}

impl SizeMeritMethod {
    pub fn from_index(index: i64) -> Option<Self> {
        Some(match index {
            0 => SizeMeritMethod::Constant,
            1 => SizeMeritMethod::Copied,
            2 => SizeMeritMethod::Executed,
            3 => SizeMeritMethod::Full,
            4 => SizeMeritMethod::LeastSize,
            5 => SizeMeritMethod::SqrtLeastSize,
            _ => return None,
        })
    }
}

pub fn calc_size_merit(
    method: SizeMeritMethod,
    full: usize,
    copied: usize,
    executed: usize,
    base_const: f64,
) -> f64 {
    let least = full.min(copied).min(executed) as f64;
    match method {
        SizeMeritMethod::Constant => base_const,
        SizeMeritMethod::Copied => copied as f64,
        SizeMeritMethod::Executed => executed as f64,
        SizeMeritMethod::Full => full as f64,
        SizeMeritMethod::LeastSize => least,
        SizeMeritMethod::SqrtLeastSize => least.sqrt(),
    }
}

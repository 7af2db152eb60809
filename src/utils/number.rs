use std::ops::{Add, Div, Sub};

pub trait Number:
    Add<Output = Self> + Sub<Output = Self> + Div<Output = Self> + PartialEq + Copy
{
    fn one() -> Self;
}

impl Number for u32 {
    fn one() -> Self {
        1
    }
}

impl Number for u64 {
    fn one() -> Self {
        1
    }
}

impl Number for usize {
    fn one() -> Self {
        1
    }
}

/// Division rounded up, `b` must be positive and `a + b` must not
/// overflow.
pub fn ceil_div<T: Number>(a: T, b: T) -> T {
    (a + b - T::one()) / b
}

pub fn floor_div<T: Number>(a: T, b: T) -> T {
    a / b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_div() {
        assert_eq!(ceil_div(0usize, 8), 0);
        assert_eq!(ceil_div(1usize, 8), 1);
        assert_eq!(ceil_div(8usize, 8), 1);
        assert_eq!(ceil_div(9u64, 8), 2);
        assert_eq!(floor_div(32768usize, 161), 203);
    }
}

//! Fitness evaluation.

use crate::{EvolutionError, Result};

/// Cost of `code` measured against `goal`.
///
/// The cost is the sum over positions of the squared difference of the
/// character codes, so it is zero exactly when `code == goal`.
pub fn evaluate(code: &str, goal: &str) -> Result<u64> {
    let expected = goal.chars().count();
    let actual = code.chars().count();
    if expected != actual {
        return Err(EvolutionError::InvalidCandidate { expected, actual });
    }

    Ok(code
        .chars()
        .zip(goal.chars())
        .map(|(c, g)| {
            let diff = c as i64 - g as i64;
            (diff * diff) as u64
        })
        .sum())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_iff_equal() {
        assert_eq!(evaluate("Hello, World!", "Hello, World!").unwrap(), 0);
        assert!(evaluate("Hello, World?", "Hello, World!").unwrap() > 0);
    }

    #[test]
    fn test_sum_of_squares() {
        // 'A' - 'A' = 0, 'D' - 'B' = 2
        assert_eq!(evaluate("AD", "AB").unwrap(), 4);
        assert_eq!(evaluate("@C", "AB").unwrap(), 2);
    }

    #[test]
    fn test_order_sensitive() {
        assert_eq!(evaluate("AB", "AB").unwrap(), 0);
        assert_eq!(evaluate("BA", "AB").unwrap(), 2);
    }

    #[test]
    fn test_length_mismatch() {
        let err = evaluate("ABC", "AB").unwrap_err();
        assert!(matches!(err, EvolutionError::InvalidCandidate { expected: 2, actual: 3 }));
    }
}

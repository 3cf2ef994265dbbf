//! `delays=a/b/c/d` tuples attached to delivery lines
//!
//! The four values are seconds spent before the queue manager, inside the
//! queue manager, on connection setup and on transmission. A tuple is all or
//! nothing: one bad part rejects the whole string, so an observation can never
//! land in the wrong stage.

use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DelayParseError {
    #[error("expected 4 slash-separated parts, found {0}")]
    PartCount(usize),

    #[error("part {index} ('{part}') is not a number")]
    NotANumber { index: usize, part: String },

    #[error("part {index} ({value}) is negative or not finite")]
    OutOfRange { index: usize, value: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayTuple {
    pub before_queue_manager: f64,
    pub queue_manager: f64,
    pub connection_setup: f64,
    pub transmission: f64,
}

impl DelayTuple {
    /// Values in stage order, matching `metrics::DELAY_STAGES`.
    pub fn stages(&self) -> [f64; 4] {
        [
            self.before_queue_manager,
            self.queue_manager,
            self.connection_setup,
            self.transmission,
        ]
    }
}

impl FromStr for DelayTuple {
    type Err = DelayParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        if parts.len() != 4 {
            return Err(DelayParseError::PartCount(parts.len()));
        }

        let mut values = [0.0f64; 4];
        for (index, (part, slot)) in parts.iter().zip(values.iter_mut()).enumerate() {
            let value: f64 = part.trim().parse().map_err(|_| DelayParseError::NotANumber {
                index,
                part: part.to_string(),
            })?;
            if !value.is_finite() || value < 0.0 {
                return Err(DelayParseError::OutOfRange { index, value });
            }
            *slot = value;
        }

        Ok(DelayTuple {
            before_queue_manager: values[0],
            queue_manager: values[1],
            connection_setup: values[2],
            transmission: values[3],
        })
    }
}

pub fn parse_delays(s: &str) -> Result<DelayTuple, DelayParseError> {
    s.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_four_parts_in_order() {
        let tuple = parse_delays("0.01/0.02/0.03/0.06").unwrap();
        assert_eq!(tuple.before_queue_manager, 0.01);
        assert_eq!(tuple.queue_manager, 0.02);
        assert_eq!(tuple.connection_setup, 0.03);
        assert_eq!(tuple.transmission, 0.06);
        assert_eq!(tuple.stages(), [0.01, 0.02, 0.03, 0.06]);
    }

    #[test]
    fn accepts_integers_and_exponents() {
        let tuple = parse_delays("0/1e-3/12/3.5").unwrap();
        assert_eq!(tuple.stages(), [0.0, 0.001, 12.0, 3.5]);
    }

    #[test]
    fn one_bad_part_fails_the_whole_tuple() {
        assert_eq!(
            parse_delays("0.01/abc/0.03/0.06"),
            Err(DelayParseError::NotANumber {
                index: 1,
                part: "abc".to_string()
            })
        );
    }

    #[test]
    fn wrong_part_count() {
        assert_eq!(parse_delays("0.01/0.02/0.03"), Err(DelayParseError::PartCount(3)));
        assert_eq!(parse_delays("1/2/3/4/5"), Err(DelayParseError::PartCount(5)));
        assert_eq!(parse_delays(""), Err(DelayParseError::PartCount(1)));
    }

    #[test]
    fn rejects_negative_and_non_finite() {
        assert!(matches!(
            parse_delays("0.1/-1/0/0"),
            Err(DelayParseError::OutOfRange { index: 1, .. })
        ));
        assert!(matches!(
            parse_delays("inf/0/0/0"),
            Err(DelayParseError::OutOfRange { index: 0, .. })
        ));
        assert!(matches!(
            parse_delays("0/0/NaN/0"),
            Err(DelayParseError::OutOfRange { index: 2, .. })
        ));
    }

    #[test]
    fn empty_part_is_not_a_number() {
        assert!(matches!(
            parse_delays("0.1//0.2/0.3"),
            Err(DelayParseError::NotANumber { index: 1, .. })
        ));
    }
}

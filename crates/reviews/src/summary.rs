//! Rating aggregation over published reviews.

use serde::{Deserialize, Serialize};

/// Count and mean rating of a product's published reviews.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct RatingSummary {
    pub review_count: u64,
    /// Mean of the integer ratings, rounded to one decimal. Zero when there
    /// are no published reviews.
    pub average_rating: f64,
}

impl RatingSummary {
    pub fn from_ratings(ratings: impl IntoIterator<Item = u8>) -> Self {
        let mut count: u64 = 0;
        let mut total: u64 = 0;
        for rating in ratings {
            count += 1;
            total += u64::from(rating);
        }

        if count == 0 {
            return Self::default();
        }

        let mean = total as f64 / count as f64;
        Self {
            review_count: count,
            average_rating: (mean * 10.0).round() / 10.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_zeroes() {
        let summary = RatingSummary::from_ratings([]);
        assert_eq!(summary.review_count, 0);
        assert_eq!(summary.average_rating, 0.0);
    }

    #[test]
    fn two_reviews_average_to_one_decimal() {
        let summary = RatingSummary::from_ratings([4, 5]);
        assert_eq!(summary.review_count, 2);
        assert_eq!(summary.average_rating, 4.5);
    }

    #[test]
    fn mean_is_rounded_not_truncated() {
        // 1 + 2 + 2 = 5, mean 1.666... -> 1.7
        let summary = RatingSummary::from_ratings([1, 2, 2]);
        assert_eq!(summary.review_count, 3);
        assert_eq!(summary.average_rating, 1.7);
    }

    #[test]
    fn single_rating_is_its_own_mean() {
        let summary = RatingSummary::from_ratings([3]);
        assert_eq!(summary.review_count, 1);
        assert_eq!(summary.average_rating, 3.0);
    }
}

//! Team ratings for 2v2 matches.
//!
//! A team plays as a single rating: the mean of its members' 2v2 ratings.

/// Mean of the members' ratings, substituting `default` for a missing one.
///
/// An empty team averages to `default`.
pub fn team_average(ratings: &[Option<i64>], default: i64) -> f64 {
    if ratings.is_empty() {
        return default as f64;
    }
    let total: i64 = ratings.iter().map(|r| r.unwrap_or(default)).sum();
    total as f64 / ratings.len() as f64
}

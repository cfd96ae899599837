//! Bucketed downsampling shared by the reference backends.
//!
//! A window `(start, end]` is cut into `buckets` equal-width buckets; each
//! non-empty bucket contributes its latest sample. Bucket `i` covers
//! `(start + i·w, start + (i+1)·w]`, and the last bucket extends to `end` so
//! that rounding never drops samples.

use crate::model::Sample;

/// Downsamples time-ordered samples lying in `(start, end]`.
///
/// With `buckets == 0` the input is returned untouched.
pub fn last_per_bucket(samples: Vec<Sample>, start: i64, end: i64, buckets: usize) -> Vec<Sample> {
    if buckets == 0 || samples.len() <= 1 || end <= start {
        return samples;
    }

    let span = (end as i128) - (start as i128);
    let width = (span / buckets as i128).max(1);
    let last_bucket = buckets as i128 - 1;
    let bucket_of = |ts: i64| -> i128 {
        // (start, start + w] -> 0
        let offset = ts as i128 - start as i128 - 1;
        (offset / width).clamp(0, last_bucket)
    };

    let mut out: Vec<Sample> = Vec::with_capacity(buckets.min(samples.len()));
    let mut current: Option<i128> = None;
    for sample in samples {
        let bucket = bucket_of(sample.timestamp);
        match out.last_mut() {
            Some(last) if current == Some(bucket) => *last = sample,
            _ => {
                current = Some(bucket);
                out.push(sample);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(timestamps: &[i64]) -> Vec<Sample> {
        timestamps
            .iter()
            .map(|ts| Sample::new(*ts, vec![*ts as f64]))
            .collect()
    }

    #[test]
    fn should_keep_last_sample_of_each_bucket() {
        // given: window (0, 100] in 4 buckets of width 25
        let input = samples(&[1, 10, 25, 26, 49, 80, 100]);

        // when
        let out = last_per_bucket(input, 0, 100, 4);

        // then
        let timestamps: Vec<i64> = out.iter().map(|s| s.timestamp).collect();
        assert_eq!(timestamps, vec![25, 49, 100]);
    }

    #[test]
    fn should_return_raw_samples_when_disabled() {
        // given
        let input = samples(&[1, 2, 3]);

        // when
        let out = last_per_bucket(input.clone(), 0, 10, 0);

        // then
        assert_eq!(out, input);
    }

    #[test]
    fn should_fold_remainder_into_last_bucket() {
        // given: width 3 over (0, 10], the tail (9, 10] belongs to bucket 2
        let input = samples(&[8, 9, 10]);

        // when
        let out = last_per_bucket(input, 0, 10, 3);

        // then
        let timestamps: Vec<i64> = out.iter().map(|s| s.timestamp).collect();
        assert_eq!(timestamps, vec![10]);
    }

    #[test]
    fn should_produce_at_most_one_sample_per_bucket() {
        // given
        let input = samples(&(1..=1000).collect::<Vec<_>>());

        // when
        let out = last_per_bucket(input, 0, 1000, 100);

        // then
        assert_eq!(out.len(), 100);
        assert!(out.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(out[0].timestamp, 10);
        assert_eq!(out[99].timestamp, 1000);
    }
}

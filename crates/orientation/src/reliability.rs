//! Test-retest reliability statistics: ICC(2,1), SEM, MDC95.
//!
//! Used by reporting tooling over recorded joint-angle summaries. Length
//! mismatches are programmer errors and panic.

/// Two-way random-effects, absolute-agreement, single-measure ICC over two
/// measurement vectors (test and retest per subject).
///
/// # Panics
/// Panics on mismatched lengths or fewer than 2 subjects.
pub fn icc_2_1(test: &[f64], retest: &[f64]) -> f64 {
    assert_eq!(
        test.len(),
        retest.len(),
        "icc requires equal-length measurement vectors"
    );
    let n = test.len();
    assert!(n >= 2, "icc requires at least 2 subjects");

    let k = 2.0;
    let nf = n as f64;
    let grand: f64 = test.iter().chain(retest.iter()).sum::<f64>() / (k * nf);

    let mut ss_subjects = 0.0;
    for i in 0..n {
        let subject_mean = (test[i] + retest[i]) / k;
        ss_subjects += (subject_mean - grand).powi(2);
    }
    ss_subjects *= k;

    let rater_means = [
        test.iter().sum::<f64>() / nf,
        retest.iter().sum::<f64>() / nf,
    ];
    let ss_raters: f64 = nf * rater_means.iter().map(|m| (m - grand).powi(2)).sum::<f64>();

    let ss_total: f64 = test
        .iter()
        .chain(retest.iter())
        .map(|x| (x - grand).powi(2))
        .sum();

    let ss_error = (ss_total - ss_subjects - ss_raters).max(0.0);

    let ms_subjects = ss_subjects / (nf - 1.0);
    let ms_raters = ss_raters / (k - 1.0);
    let ms_error = ss_error / ((nf - 1.0) * (k - 1.0));

    let denom = ms_subjects + (k - 1.0) * ms_error + k * (ms_raters - ms_error) / nf;
    if denom.abs() < 1e-12 {
        // No variance anywhere: perfect (degenerate) agreement.
        return 1.0;
    }
    (ms_subjects - ms_error) / denom
}

/// Standard error of measurement from a pooled SD and an ICC.
pub fn sem(pooled_sd: f64, icc: f64) -> f64 {
    pooled_sd * (1.0 - icc).max(0.0).sqrt()
}

/// Minimal detectable change at 95% confidence: `SEM · 1.96 · √2`.
pub fn mdc95(sem: f64) -> f64 {
    sem * 1.96 * std::f64::consts::SQRT_2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_vectors_near_one() {
        let a = [10.0, 20.0, 30.0, 40.0, 50.0];
        assert!(icc_2_1(&a, &a) >= 0.99);
    }

    #[test]
    fn test_unit_disagreement_stays_high() {
        let test = [10.0, 20.0, 30.0, 40.0, 50.0];
        let retest = [11.0, 19.0, 31.0, 39.0, 51.0];
        assert!(icc_2_1(&test, &retest) > 0.95);
    }

    #[test]
    fn test_uncorrelated_is_low() {
        let test = [10.0, 20.0, 30.0, 40.0, 50.0];
        let retest = [30.0, 50.0, 10.0, 40.0, 20.0];
        assert!(icc_2_1(&test, &retest) < 0.5);
    }

    #[test]
    fn test_mdc95_reference_value() {
        let mdc = mdc95(5.0);
        assert!((mdc - 13.86).abs() < 0.01, "MDC95(SEM=5) = {mdc}");
    }

    #[test]
    fn test_sem_bounds() {
        assert_eq!(sem(10.0, 1.0), 0.0);
        assert!((sem(10.0, 0.75) - 5.0).abs() < 1e-9);
    }

    #[test]
    #[should_panic(expected = "equal-length")]
    fn test_mismatched_lengths_panic() {
        icc_2_1(&[1.0, 2.0], &[1.0]);
    }
}

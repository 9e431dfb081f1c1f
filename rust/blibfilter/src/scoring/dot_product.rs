use crate::models::Peak;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DotProductMatch {
    pub score: f64,
    pub matched_ions: usize,
}

/// Cosine similarity between two processed peak lists.
///
/// Both lists must be sorted by m/z. Peaks only match on exactly equal m/z,
/// which is what binning produces for peaks in the same bin.
///
/// # Example
///
/// ```
/// use blibfilter::models::Peak;
/// use blibfilter::scoring::dot_product::compare;
///
/// let a = vec![Peak::new(100.0, 1.0), Peak::new(200.0, 1.0)];
/// let b = vec![Peak::new(200.0, 1.0), Peak::new(300.0, 1.0)];
/// let res = compare(&a, &b);
/// assert_eq!(res.matched_ions, 1);
/// assert!((res.score - 0.5).abs() < 1e-12);
/// ```
pub fn compare(a: &[Peak], b: &[Peak]) -> DotProductMatch {
    let mut a_sum_sq = 0.0f64;
    let mut b_sum_sq = 0.0f64;
    let mut dot = 0.0f64;
    let mut matched_ions = 0;

    let mut i = 0;
    let mut j = 0;
    while i < a.len() && j < b.len() {
        let a_int = a[i].intensity as f64;
        let b_int = b[j].intensity as f64;
        if a[i].mz == b[j].mz {
            a_sum_sq += a_int * a_int;
            b_sum_sq += b_int * b_int;
            dot += a_int * b_int;
            matched_ions += 1;
            i += 1;
            j += 1;
        } else if a[i].mz < b[j].mz {
            a_sum_sq += a_int * a_int;
            i += 1;
        } else {
            b_sum_sq += b_int * b_int;
            j += 1;
        }
    }
    a_sum_sq += a[i..].iter().map(|p| (p.intensity as f64).powi(2)).sum::<f64>();
    b_sum_sq += b[j..].iter().map(|p| (p.intensity as f64).powi(2)).sum::<f64>();

    let denom = (a_sum_sq * b_sum_sq).sqrt();
    let score = if denom == 0.0 { 0.0 } else { dot / denom };
    DotProductMatch {
        score: if score.is_nan() { 0.0 } else { score },
        matched_ions,
    }
}

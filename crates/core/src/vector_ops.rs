//! Numeric kernels over `f32` slices.
//!
//! Every kernel assumes `a.len() == b.len()`; dimensionality is validated once when
//! vectors enter the index, never per call. On x86_64 an AVX2+FMA path is chosen at
//! runtime; elsewhere (and as fallback) an 8-lane chunked loop is used, which the
//! compiler auto-vectorizes for NEON and SSE.

/// Lane count of the portable chunked loops.
const LANES: usize = 8;

/// Default relative epsilon for [`almost_equal`].
pub const DEFAULT_EPSILON: f64 = 1.0e-5;

// ============================================================================
// Public dispatch functions
// ============================================================================

/// Dot product between two f32 slices.
#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    #[cfg(target_arch = "x86_64")]
    {
        if avx2::available() {
            return unsafe { avx2::dot(a, b) };
        }
    }
    chunked_dot(a, b)
}

/// Squared Euclidean distance between two f32 slices.
#[inline]
pub fn euclidean_sq(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    #[cfg(target_arch = "x86_64")]
    {
        if avx2::available() {
            return unsafe { avx2::euclidean_sq(a, b) };
        }
    }
    chunked_euclidean_sq(a, b)
}

/// Cosine similarity in `[-1, 1]`.
///
/// Returns `0.0` when either operand has zero magnitude instead of `NaN`.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let (dot, norm_a, norm_b) = chunked_dot_and_norms(a, b);
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return 0.0;
    }
    dot / denom
}

/// Cosine similarity of two unit vectors, which is just their dot product.
#[inline]
pub fn cosine_similarity_unit(a: &[f32], b: &[f32]) -> f32 {
    dot(a, b)
}

/// Euclidean norm of `v`.
#[inline]
pub fn magnitude(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}

/// Scales `v` to unit length in place. A zero vector is left untouched.
pub fn normalize(v: &mut [f32]) {
    let mag = magnitude(v);
    if mag == 0.0 {
        return;
    }
    let factor = 1.0 / mag;
    let mut chunks = v.chunks_exact_mut(LANES);
    for chunk in &mut chunks {
        for x in chunk.iter_mut() {
            *x *= factor;
        }
    }
    for x in chunks.into_remainder() {
        *x *= factor;
    }
}

/// Returns a unit-length copy of `v`.
pub fn normalized(v: &[f32]) -> Vec<f32> {
    let mut out = v.to_vec();
    normalize(&mut out);
    out
}

/// Relative-epsilon float comparison.
///
/// `abs(x - y) / (abs(x) + abs(y)) < epsilon`, with an absolute `epsilon²` bound when
/// either side is exactly zero. Scores produced by different evaluation orders are
/// not bit-identical, so exact equality must never be used on them.
pub fn almost_equal(x: f64, y: f64, epsilon: f64) -> bool {
    if x == y {
        return true;
    }
    let abs_x = x.abs();
    let abs_y = y.abs();
    let diff = (x - y).abs();
    if x * y == 0.0 {
        diff < epsilon * epsilon
    } else if abs_x + abs_y == diff {
        diff < epsilon
    } else {
        diff / (abs_x + abs_y) < epsilon
    }
}

// ============================================================================
// Portable chunked loops
// ============================================================================

fn chunked_dot(a: &[f32], b: &[f32]) -> f32 {
    let mut acc = [0.0f32; LANES];
    let a_chunks = a.chunks_exact(LANES);
    let b_chunks = b.chunks_exact(LANES);
    let tail: f32 = a_chunks
        .remainder()
        .iter()
        .zip(b_chunks.remainder())
        .map(|(x, y)| x * y)
        .sum();
    for (ca, cb) in a_chunks.zip(b_chunks) {
        for i in 0..LANES {
            acc[i] += ca[i] * cb[i];
        }
    }
    acc.iter().sum::<f32>() + tail
}

fn chunked_euclidean_sq(a: &[f32], b: &[f32]) -> f32 {
    let mut acc = [0.0f32; LANES];
    let a_chunks = a.chunks_exact(LANES);
    let b_chunks = b.chunks_exact(LANES);
    let tail: f32 = a_chunks
        .remainder()
        .iter()
        .zip(b_chunks.remainder())
        .map(|(x, y)| (x - y) * (x - y))
        .sum();
    for (ca, cb) in a_chunks.zip(b_chunks) {
        for i in 0..LANES {
            let d = ca[i] - cb[i];
            acc[i] += d * d;
        }
    }
    acc.iter().sum::<f32>() + tail
}

/// Single pass computing `(a·b, |a|², |b|²)`.
fn chunked_dot_and_norms(a: &[f32], b: &[f32]) -> (f32, f32, f32) {
    let mut dot = [0.0f32; LANES];
    let mut na = [0.0f32; LANES];
    let mut nb = [0.0f32; LANES];
    let a_chunks = a.chunks_exact(LANES);
    let b_chunks = b.chunks_exact(LANES);
    let (mut dot_tail, mut na_tail, mut nb_tail) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a_chunks.remainder().iter().zip(b_chunks.remainder()) {
        dot_tail += x * y;
        na_tail += x * x;
        nb_tail += y * y;
    }
    for (ca, cb) in a_chunks.zip(b_chunks) {
        for i in 0..LANES {
            dot[i] += ca[i] * cb[i];
            na[i] += ca[i] * ca[i];
            nb[i] += cb[i] * cb[i];
        }
    }
    (
        dot.iter().sum::<f32>() + dot_tail,
        na.iter().sum::<f32>() + na_tail,
        nb.iter().sum::<f32>() + nb_tail,
    )
}

// ============================================================================
// AVX2+FMA implementations (x86_64)
// ============================================================================

#[cfg(target_arch = "x86_64")]
mod avx2 {
    use std::arch::x86_64::*;
    use std::sync::OnceLock;

    static AVAILABLE: OnceLock<bool> = OnceLock::new();

    #[inline]
    pub(super) fn available() -> bool {
        *AVAILABLE.get_or_init(|| {
            std::arch::is_x86_feature_detected!("avx2") && std::arch::is_x86_feature_detected!("fma")
        })
    }

    /// Horizontal sum of the 8 lanes of a `__m256`.
    #[inline]
    #[target_feature(enable = "avx2")]
    unsafe fn hsum(v: __m256) -> f32 {
        let hi = _mm256_extractf128_ps(v, 1);
        let lo = _mm256_castps256_ps128(v);
        let sum4 = _mm_add_ps(lo, hi);
        let sum2 = _mm_add_ps(sum4, _mm_movehl_ps(sum4, sum4));
        let sum1 = _mm_add_ss(sum2, _mm_shuffle_ps(sum2, sum2, 0x55));
        _mm_cvtss_f32(sum1)
    }

    #[target_feature(enable = "avx2,fma")]
    pub(super) unsafe fn dot(a: &[f32], b: &[f32]) -> f32 {
        let len = a.len().min(b.len());
        let (pa, pb) = (a.as_ptr(), b.as_ptr());
        let mut s0 = _mm256_setzero_ps();
        let mut s1 = _mm256_setzero_ps();

        let blocks = len / 16;
        for i in 0..blocks {
            let base = i * 16;
            s0 = _mm256_fmadd_ps(_mm256_loadu_ps(pa.add(base)), _mm256_loadu_ps(pb.add(base)), s0);
            s1 = _mm256_fmadd_ps(
                _mm256_loadu_ps(pa.add(base + 8)),
                _mm256_loadu_ps(pb.add(base + 8)),
                s1,
            );
        }

        let mut sum = hsum(_mm256_add_ps(s0, s1));
        for i in (blocks * 16)..len {
            sum += *pa.add(i) * *pb.add(i);
        }
        sum
    }

    #[target_feature(enable = "avx2,fma")]
    pub(super) unsafe fn euclidean_sq(a: &[f32], b: &[f32]) -> f32 {
        let len = a.len().min(b.len());
        let (pa, pb) = (a.as_ptr(), b.as_ptr());
        let mut s0 = _mm256_setzero_ps();
        let mut s1 = _mm256_setzero_ps();

        let blocks = len / 16;
        for i in 0..blocks {
            let base = i * 16;
            let d0 = _mm256_sub_ps(_mm256_loadu_ps(pa.add(base)), _mm256_loadu_ps(pb.add(base)));
            let d1 = _mm256_sub_ps(
                _mm256_loadu_ps(pa.add(base + 8)),
                _mm256_loadu_ps(pb.add(base + 8)),
            );
            s0 = _mm256_fmadd_ps(d0, d0, s0);
            s1 = _mm256_fmadd_ps(d1, d1, s1);
        }

        let mut sum = hsum(_mm256_add_ps(s0, s1));
        for i in (blocks * 16)..len {
            let d = *pa.add(i) - *pb.add(i);
            sum += d * d;
        }
        sum
    }
}

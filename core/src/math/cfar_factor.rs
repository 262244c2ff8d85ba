//! Threshold multipliers that hold a requested false-alarm probability.
//!
//! All expressions assume square-law detected Gaussian noise, i.e. exponentially distributed
//! cell power. `half` is the number of training cells on one side of the cell under test; the
//! full window holds `2 * half` cells.

const BISECTION_STEPS: usize = 200;
const MAX_FACTOR: f64 = 1e12;

/// Cell-averaging: `α = N (Pfa^(-1/N) - 1)` for a mean over `N` cells.
pub fn ca_scale_factor(pfa: f64, half: usize) -> f64 {
    let n = (2 * half) as f64;
    n * (pfa.powf(-1.0 / n) - 1.0)
}

/// False-alarm probability of smallest-of CFAR with multiplier `alpha` on `min(sum) / half`.
pub fn soca_false_alarm(alpha: f64, half: usize) -> f64 {
    2.0 * smallest_of_core(alpha / half as f64, half)
}

/// False-alarm probability of greatest-of CFAR with multiplier `alpha` on `max(sum) / half`.
pub fn goca_false_alarm(alpha: f64, half: usize) -> f64 {
    let tau = alpha / half as f64;
    2.0 * (1.0 + tau).powi(-(half as i32)) - 2.0 * smallest_of_core(tau, half)
}

/// False-alarm probability of ordered-statistic CFAR picking the `rank`-th smallest of `2 * half`.
pub fn os_false_alarm(alpha: f64, half: usize, rank: usize) -> f64 {
    let n = 2 * half;
    (0..rank.min(n))
        .map(|i| {
            let remaining = (n - i) as f64;
            remaining / (remaining + alpha)
        })
        .product()
}

pub fn soca_scale_factor(pfa: f64, half: usize) -> f64 {
    invert(pfa, |alpha| soca_false_alarm(alpha, half))
}

pub fn goca_scale_factor(pfa: f64, half: usize) -> f64 {
    invert(pfa, |alpha| goca_false_alarm(alpha, half))
}

pub fn os_scale_factor(pfa: f64, half: usize, rank: usize) -> f64 {
    invert(pfa, |alpha| os_false_alarm(alpha, half, rank))
}

/// `(2+τ)^-n Σ_{k<n} C(n-1+k, k) (2+τ)^-k`, accumulated term by term so the binomials never
/// materialise.
fn smallest_of_core(tau: f64, half: usize) -> f64 {
    let q = 1.0 / (2.0 + tau);
    let mut term = q.powi(half as i32);
    let mut total = term;
    for k in 1..half {
        term *= (half - 1 + k) as f64 / k as f64 * q;
        total += term;
    }
    total
}

/// Solves `false_alarm(alpha) = pfa` for a strictly decreasing `false_alarm`.
fn invert<F: Fn(f64) -> f64>(pfa: f64, false_alarm: F) -> f64 {
    if pfa >= 1.0 {
        return 0.0;
    }
    let mut lo = 0.0;
    let mut hi = 1.0;
    while false_alarm(hi) > pfa && hi < MAX_FACTOR {
        lo = hi;
        hi *= 2.0;
    }
    for _ in 0..BISECTION_STEPS {
        let mid = 0.5 * (lo + hi);
        if false_alarm(mid) > pfa {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo <= 1e-12 * hi {
            break;
        }
    }
    0.5 * (lo + hi)
}

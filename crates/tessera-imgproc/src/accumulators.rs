use std::ops::{Add, AddAssign};

use num_complex::Complex64;
use tessera_image::ImageError;

/// Running minimum and maximum.
///
/// NaN values pushed are ignored, unless the accumulator has seen nothing else.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MinMaxAccumulator {
    min: f64,
    max: f64,
}

impl Default for MinMaxAccumulator {
    fn default() -> Self {
        Self {
            min: f64::MAX,
            max: f64::MIN,
        }
    }
}

impl MinMaxAccumulator {
    /// Adds a value.
    pub fn push(&mut self, x: f64) {
        self.max = self.max.max(x);
        self.min = self.min.min(x);
    }

    /// Adds two values, one comparison cheaper than two calls to [`MinMaxAccumulator::push`].
    pub fn push_pair(&mut self, x: f64, y: f64) {
        let (lo, hi) = if x > y { (y, x) } else { (x, y) };
        self.max = self.max.max(hi);
        self.min = self.min.min(lo);
    }

    /// The smallest value seen, `f64::MAX` if none.
    pub fn minimum(&self) -> f64 {
        self.min
    }

    /// The largest value seen, `f64::MIN` if none.
    pub fn maximum(&self) -> f64 {
        self.max
    }
}

impl AddAssign for MinMaxAccumulator {
    fn add_assign(&mut self, other: Self) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }
}

/// Mean, variance, skewness and excess kurtosis, updated one value at a time.
///
/// Uses the central-moment update of Pébay (2008), which stays accurate for long series and
/// merges exactly.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StatisticsAccumulator {
    n: usize,
    m1: f64,
    m2: f64,
    m3: f64,
    m4: f64,
}

impl StatisticsAccumulator {
    /// Adds a value.
    pub fn push(&mut self, x: f64) {
        self.n += 1;
        let n = self.n as f64;
        let delta = x - self.m1;
        let term1 = delta / n;
        let term2 = term1 * term1;
        let term3 = delta * term1 * (n - 1.0);
        // m4 uses the old m2 and m3, m3 the old m2
        self.m4 += term3 * term2 * (n * n - 3.0 * n + 3.0) + 6.0 * term2 * self.m2
            - 4.0 * term1 * self.m3;
        self.m3 += term3 * term1 * (n - 2.0) - 3.0 * term1 * self.m2;
        self.m2 += term3;
        self.m1 += term1;
    }

    /// Number of values added.
    pub fn number(&self) -> usize {
        self.n
    }

    /// The mean.
    pub fn mean(&self) -> f64 {
        self.m1
    }

    /// The unbiased variance, 0 for fewer than two values.
    pub fn variance(&self) -> f64 {
        if self.n > 1 {
            self.m2 / (self.n as f64 - 1.0)
        } else {
            0.0
        }
    }

    /// The square root of the variance.
    pub fn standard_deviation(&self) -> f64 {
        self.variance().sqrt()
    }

    /// The sample skewness, 0 for fewer than three values or zero variance.
    pub fn skewness(&self) -> f64 {
        if self.n > 2 && self.m2 != 0.0 {
            let n = self.n as f64;
            (n * n / ((n - 1.0) * (n - 2.0))) * (self.m3 / (n * self.variance().powf(1.5)))
        } else {
            0.0
        }
    }

    /// The sample excess kurtosis, 0 for fewer than four values or zero variance.
    pub fn excess_kurtosis(&self) -> f64 {
        if self.n > 3 && self.m2 != 0.0 {
            let n = self.n as f64;
            (n - 1.0) / ((n - 2.0) * (n - 3.0))
                * ((n + 1.0) * n * self.m4 / (self.m2 * self.m2) - 3.0 * (n - 1.0))
        } else {
            0.0
        }
    }
}

impl AddAssign for StatisticsAccumulator {
    fn add_assign(&mut self, b: Self) {
        if b.n == 0 {
            return;
        }
        if self.n == 0 {
            *self = b;
            return;
        }
        let an = self.n as f64;
        let an2 = an * an;
        let bn = b.n as f64;
        let bn2 = bn * bn;
        let xn2 = an * bn;
        self.n += b.n;
        let nn = self.n as f64;
        let n2 = nn * nn;
        let delta = b.m1 - self.m1;
        let delta2 = delta * delta;
        self.m4 += b.m4
            + delta2 * delta2 * xn2 * (an2 - xn2 + bn2) / (n2 * nn)
            + 6.0 * delta2 * (an2 * b.m2 + bn2 * self.m2) / n2
            + 4.0 * delta * (an * b.m3 - bn * self.m3) / nn;
        self.m3 += b.m3
            + delta * delta2 * xn2 * (an - bn) / n2
            + 3.0 * delta * (an * b.m2 - bn * self.m2) / nn;
        self.m2 += b.m2 + delta2 * xn2 / nn;
        self.m1 += bn * delta / nn;
    }
}

/// Mean and variance with Welford's update. Values can also be removed.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VarianceAccumulator {
    n: usize,
    m1: f64,
    m2: f64,
}

impl VarianceAccumulator {
    /// Adds a value.
    pub fn push(&mut self, x: f64) {
        self.n += 1;
        let delta = x - self.m1;
        self.m1 += delta / self.n as f64;
        self.m2 += delta * (x - self.m1);
    }

    /// Removes a value previously added.
    pub fn pop(&mut self, x: f64) {
        match self.n {
            0 => {}
            1 => *self = Self::default(),
            n => {
                let delta = x - self.m1;
                self.m1 = (self.m1 * n as f64 - x) / (n - 1) as f64;
                self.m2 -= delta * (x - self.m1);
                self.n -= 1;
            }
        }
    }

    /// Number of values added.
    pub fn number(&self) -> usize {
        self.n
    }

    /// The mean.
    pub fn mean(&self) -> f64 {
        self.m1
    }

    /// The unbiased variance, 0 for fewer than two values.
    pub fn variance(&self) -> f64 {
        if self.n > 1 {
            self.m2 / (self.n as f64 - 1.0)
        } else {
            0.0
        }
    }

    /// The square root of the variance.
    pub fn standard_deviation(&self) -> f64 {
        self.variance().sqrt()
    }
}

impl AddAssign for VarianceAccumulator {
    fn add_assign(&mut self, b: Self) {
        if b.n == 0 {
            return;
        }
        if self.n == 0 {
            *self = b;
            return;
        }
        let old_n = self.n as f64;
        self.n += b.n;
        let n = self.n as f64;
        let bn = b.n as f64;
        let delta = b.m1 - self.m1;
        self.m1 += bn * delta / n;
        self.m2 += b.m2 + delta * delta * (old_n * bn) / n;
    }
}

/// Mean and variance from plain sums of `x` and `x²`.
///
/// Faster than [`VarianceAccumulator`] but loses precision when the mean is large compared
/// to the spread. Fine for 8- and 16-bit samples.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FastVarianceAccumulator {
    n: usize,
    m1: f64,
    m2: f64,
}

impl FastVarianceAccumulator {
    /// Adds a value.
    pub fn push(&mut self, x: f64) {
        self.n += 1;
        self.m1 += x;
        self.m2 += x * x;
    }

    /// Removes a value previously added.
    pub fn pop(&mut self, x: f64) {
        if self.n > 0 {
            self.n -= 1;
            self.m1 -= x;
            self.m2 -= x * x;
        }
    }

    /// Number of values added.
    pub fn number(&self) -> usize {
        self.n
    }

    /// The mean, 0 without values.
    pub fn mean(&self) -> f64 {
        if self.n > 0 {
            self.m1 / self.n as f64
        } else {
            0.0
        }
    }

    /// The unbiased variance, 0 for fewer than two values.
    pub fn variance(&self) -> f64 {
        if self.n > 1 {
            let n = self.n as f64;
            ((self.m2 - self.m1 * self.m1 / n) / (n - 1.0)).max(0.0)
        } else {
            0.0
        }
    }

    /// The square root of the variance.
    pub fn standard_deviation(&self) -> f64 {
        self.variance().sqrt()
    }
}

impl AddAssign for FastVarianceAccumulator {
    fn add_assign(&mut self, b: Self) {
        self.n += b.n;
        self.m1 += b.m1;
        self.m2 += b.m2;
    }
}

/// Slope and intercept of a least-squares line fit.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RegressionParameters {
    /// Slope of the line.
    pub slope: f64,
    /// Value of the line at x = 0.
    pub intercept: f64,
}

/// Variances and covariance of pairs of values.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CovarianceAccumulator {
    n: usize,
    mean_x: f64,
    m2_x: f64,
    mean_y: f64,
    m2_y: f64,
    c: f64,
}

impl CovarianceAccumulator {
    /// Adds a pair of values.
    pub fn push(&mut self, x: f64, y: f64) {
        self.n += 1;
        let n = self.n as f64;
        let dx = x - self.mean_x;
        self.mean_x += dx / n;
        self.m2_x += dx * (x - self.mean_x);
        let dy = y - self.mean_y;
        self.mean_y += dy / n;
        let dy_new = y - self.mean_y;
        self.m2_y += dy * dy_new;
        self.c += dx * dy_new;
    }

    /// Number of pairs added.
    pub fn number(&self) -> usize {
        self.n
    }

    /// Mean of the first values.
    pub fn mean_x(&self) -> f64 {
        self.mean_x
    }

    /// Mean of the second values.
    pub fn mean_y(&self) -> f64 {
        self.mean_y
    }

    fn unbiased(&self, m2: f64) -> f64 {
        if self.n > 1 {
            m2 / (self.n as f64 - 1.0)
        } else {
            0.0
        }
    }

    /// Unbiased variance of the first values.
    pub fn variance_x(&self) -> f64 {
        self.unbiased(self.m2_x)
    }

    /// Unbiased variance of the second values.
    pub fn variance_y(&self) -> f64 {
        self.unbiased(self.m2_y)
    }

    /// Standard deviation of the first values.
    pub fn standard_deviation_x(&self) -> f64 {
        self.variance_x().sqrt()
    }

    /// Standard deviation of the second values.
    pub fn standard_deviation_y(&self) -> f64 {
        self.variance_y().sqrt()
    }

    /// Unbiased covariance.
    pub fn covariance(&self) -> f64 {
        self.unbiased(self.c)
    }

    /// Pearson correlation coefficient, 0 if either variance is 0.
    pub fn correlation(&self) -> f64 {
        let s = (self.m2_x * self.m2_y).sqrt();
        if self.n > 1 && s != 0.0 {
            self.c / s
        } else {
            0.0
        }
    }

    /// Slope of the least-squares fit of y against x.
    pub fn slope(&self) -> f64 {
        if self.m2_x != 0.0 {
            self.c / self.m2_x
        } else {
            0.0
        }
    }

    /// The least-squares fit of y against x.
    pub fn regression(&self) -> RegressionParameters {
        let slope = self.slope();
        RegressionParameters {
            slope,
            intercept: self.mean_y - slope * self.mean_x,
        }
    }
}

impl AddAssign for CovarianceAccumulator {
    fn add_assign(&mut self, other: Self) {
        if other.n == 0 {
            return;
        }
        if self.n == 0 {
            *self = other;
            return;
        }
        let (an, bn) = (self.n as f64, other.n as f64);
        let n = an + bn;
        let dx = other.mean_x - self.mean_x;
        let dy = other.mean_y - self.mean_y;
        self.mean_x = (an * self.mean_x + bn * other.mean_x) / n;
        self.mean_y = (an * self.mean_y + bn * other.mean_y) / n;
        let f = an * bn / n;
        self.m2_x += other.m2_x + dx * dx * f;
        self.m2_y += other.m2_y + dy * dy * f;
        self.c += other.c + dx * dy * f;
        self.n += other.n;
    }
}

/// Statistics of angles, in radians.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DirectionalStatisticsAccumulator {
    n: usize,
    sum: Complex64,
}

impl DirectionalStatisticsAccumulator {
    /// Adds an angle.
    pub fn push(&mut self, x: f64) {
        self.n += 1;
        self.sum += Complex64::from_polar(1.0, x);
    }

    /// Number of angles added.
    pub fn number(&self) -> usize {
        self.n
    }

    /// The circular mean, in `(-π, π]`.
    pub fn mean(&self) -> f64 {
        self.sum.arg()
    }

    /// The circular variance, in `[0, 1]`.
    pub fn variance(&self) -> f64 {
        if self.n > 0 {
            1.0 - self.sum.norm() / self.n as f64
        } else {
            0.0
        }
    }

    /// The circular standard deviation.
    pub fn standard_deviation(&self) -> f64 {
        if self.n > 0 {
            // rounding can push the resultant length over 1
            (-2.0 * (self.sum.norm() / self.n as f64).ln()).max(0.0).sqrt()
        } else {
            0.0
        }
    }
}

impl AddAssign for DirectionalStatisticsAccumulator {
    fn add_assign(&mut self, b: Self) {
        self.n += b.n;
        self.sum += b.sum;
    }
}

/// Zeroth, first and second order moments of weighted points in `N` dimensions.
///
/// Second order moments are stored as the `N` diagonal elements followed by the elements
/// below the diagonal, row by row: `xx, yy, zz, xy, xz, yz` for `N = 3`.
#[derive(Clone, Debug, PartialEq)]
pub struct MomentAccumulator {
    m0: f64,
    m1: Vec<f64>,
    m2: Vec<f64>,
}

impl MomentAccumulator {
    /// An empty accumulator for points in `n` dimensions.
    ///
    /// # Errors
    ///
    /// `n` must be at least 1.
    pub fn new(n: usize) -> Result<Self, ImageError> {
        if n < 1 {
            return Err(ImageError::ParameterOutOfRange(
                "moments need at least one dimension".to_string(),
            ));
        }
        Ok(Self {
            m0: 0.0,
            m1: vec![0.0; n],
            m2: vec![0.0; n * (n + 1) / 2],
        })
    }

    /// Number of dimensions.
    pub fn dimensionality(&self) -> usize {
        self.m1.len()
    }

    /// Adds a point with a weight.
    ///
    /// # Panics
    ///
    /// If `pos` does not have [`MomentAccumulator::dimensionality`] elements.
    pub fn push(&mut self, pos: &[f64], weight: f64) {
        let n = self.m1.len();
        assert_eq!(pos.len(), n, "point has the wrong dimensionality");
        self.m0 += weight;
        for ii in 0..n {
            self.m1[ii] += pos[ii] * weight;
            self.m2[ii] += pos[ii] * pos[ii] * weight;
        }
        let mut kk = n;
        for ii in 1..n {
            for jj in 0..ii {
                self.m2[kk] += pos[ii] * pos[jj] * weight;
                kk += 1;
            }
        }
    }

    /// Sum of the weights.
    pub fn sum(&self) -> f64 {
        self.m0
    }

    /// The centroid, all zeros if the weights sum to 0.
    pub fn first_order(&self) -> Vec<f64> {
        if self.m0 == 0.0 {
            return vec![0.0; self.m1.len()];
        }
        self.m1.iter().map(|v| v / self.m0).collect()
    }

    /// Normalized central second order moments, in the storage order described above.
    pub fn plain_second_order(&self) -> Vec<f64> {
        let mut out = vec![0.0; self.m2.len()];
        if self.m0 == 0.0 {
            return out;
        }
        let n = self.m1.len();
        for ii in 0..n {
            out[ii] = (self.m2[ii] - self.m1[ii] * self.m1[ii] / self.m0) / self.m0;
        }
        let mut kk = n;
        for ii in 1..n {
            for jj in 0..ii {
                out[kk] = (self.m2[kk] - self.m1[ii] * self.m1[jj] / self.m0) / self.m0;
                kk += 1;
            }
        }
        out
    }

    /// The inertia tensor: diagonal element `i` is the sum of the plain second order
    /// moments of the other dimensions, off-diagonal elements are negated.
    pub fn second_order(&self) -> Vec<f64> {
        let m2 = self.plain_second_order();
        if self.m0 == 0.0 {
            return m2;
        }
        let n = self.m1.len();
        let mut out = vec![0.0; m2.len()];
        for (ii, o) in out.iter_mut().enumerate().take(n) {
            *o = (0..n).filter(|&jj| jj != ii).map(|jj| m2[jj]).sum();
        }
        for ii in n..m2.len() {
            out[ii] = -m2[ii];
        }
        out
    }
}

impl AddAssign for MomentAccumulator {
    fn add_assign(&mut self, b: Self) {
        self.m0 += b.m0;
        for (a, b) in self.m1.iter_mut().zip(&b.m1) {
            *a += b;
        }
        for (a, b) in self.m2.iter_mut().zip(&b.m2) {
            *a += b;
        }
    }
}

macro_rules! impl_add {
    ($($t:ty),*) => {
        $(
            impl Add for $t {
                type Output = $t;

                fn add(mut self, rhs: $t) -> $t {
                    self += rhs;
                    self
                }
            }
        )*
    };
}

impl_add!(
    MinMaxAccumulator,
    StatisticsAccumulator,
    VarianceAccumulator,
    FastVarianceAccumulator,
    CovarianceAccumulator,
    DirectionalStatisticsAccumulator,
    MomentAccumulator
);

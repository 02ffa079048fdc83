use nalgebra as na;
use num_traits::Float;

/// Solves Ax = b by Gaussian elimination with partial pivoting. Small
/// step-test sample counts make the normal equations ill-conditioned, so
/// the max-magnitude pivot per column is required, not optional.
pub fn gaussian_solve(mut a: na::DMatrix<f64>, mut b: na::DVector<f64>) -> Option<na::DVector<f64>> {
    let n = a.nrows();
    debug_assert_eq!(n, a.ncols());
    debug_assert_eq!(n, b.len());

    for i in 0..n {
        let mut max_el = a[(i, i)].abs();
        let mut max_row = i;
        for k in i + 1..n {
            if a[(k, i)].abs() > max_el {
                max_el = a[(k, i)].abs();
                max_row = k;
            }
        }

        if !max_el.is_normal() {
            return None;
        }

        if max_row != i {
            a.swap_rows(i, max_row);
            b.swap_rows(i, max_row);
        }

        for k in i + 1..n {
            let c = -a[(k, i)] / a[(i, i)];
            for j in i..n {
                if i == j {
                    a[(k, j)] = 0.0;
                } else {
                    a[(k, j)] += c * a[(i, j)];
                }
            }
            b[k] += c * b[i];
        }
    }

    // Back substitution over the upper triangle.
    let mut x = na::DVector::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in i + 1..n {
            sum += a[(i, j)] * x[j];
        }
        x[i] = (b[i] - sum) / a[(i, i)];
    }

    Some(x)
}

/// Least-squares polynomial fit of the given degree via the normal
/// equations. Coefficients are returned lowest power first.
pub fn polyfit(xs: &[f64], ys: &[f64], degree: usize) -> Option<Vec<f64>> {
    if xs.len() != ys.len() || xs.len() <= degree {
        return None;
    }

    let n = degree + 1;
    let mut a = na::DMatrix::zeros(n, n);
    let mut b = na::DVector::zeros(n);

    for i in 0..n {
        for j in 0..n {
            a[(i, j)] = xs.iter().map(|&x| x.powi((i + j) as i32)).sum();
        }
        b[i] = xs
            .iter()
            .zip(ys)
            .map(|(&x, &y)| y * x.powi(i as i32))
            .sum();
    }

    let solution = gaussian_solve(a, b)?;

    Some(solution.iter().copied().collect())
}

/// Horner evaluation of coefficients ordered lowest power first.
#[inline]
pub fn poly_eval(coeffs: &[f64], x: f64) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, &c| acc * x + c)
}

/// Perpendicular distance from (px, py) to the line through (x1, y1) and
/// (x2, y2).
pub fn point_line_distance(px: f64, py: f64, x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    let dx = x2 - x1;
    let dy = y2 - y1;

    let numerator = (dy * px - dx * py + x2 * y1 - y2 * x1).abs();
    let denominator = (dy * dy + dx * dx).sqrt();

    numerator / denominator
}

/// Fractional position of `value` between `a` and `b`.
#[inline]
pub fn lerp<T: Float>(a: T, b: T, fraction: T) -> T {
    a + (b - a) * fraction
}

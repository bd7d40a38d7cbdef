//! Helpers for preparing inputs and reading predictions

/// Index of the largest value (first one on ties), `None` when empty
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, max)) if max >= v => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Concatenate rows
pub fn flatten<T: Clone>(rows: &[Vec<T>]) -> Vec<T> {
    rows.iter().flatten().cloned().collect()
}

/// Map 8-bit grayscale pixels to `[0, 1]`
pub fn normalize_pixels(image: &[Vec<u8>]) -> Vec<Vec<f64>> {
    image
        .iter()
        .map(|row| row.iter().map(|&p| f64::from(p) / 255.0).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argmax() {
        assert_eq!(argmax(&[0.1, 3.0, -2.0, 3.0]), Some(1));
        assert_eq!(argmax(&[-5.0]), Some(0));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_flatten() {
        assert_eq!(flatten(&[vec![1, 2], vec![3], vec![]]), vec![1, 2, 3]);
    }

    #[test]
    fn test_normalize_pixels() {
        let image = vec![vec![0, 255], vec![51, 102]];
        let normalized = normalize_pixels(&image);
        assert_eq!(normalized[0], vec![0.0, 1.0]);
        assert!((normalized[1][0] - 0.2).abs() < 1e-12);
        assert!((normalized[1][1] - 0.4).abs() < 1e-12);
    }
}

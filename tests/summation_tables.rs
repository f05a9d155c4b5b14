use gatematch::{RasterView, Region, SummationTables};
use rand::Rng;

#[test]
fn windowed_sums_match_naive_summation() {
    let mut rng = rand::rng();
    let width = 64usize;
    let height = 48usize;
    let data: Vec<u8> = (0..width * height).map(|_| rng.random()).collect();
    let view = RasterView::from_slice(&data, width, height).unwrap();

    let region = Region::new(5, 3, 61, 44);
    let tables = SummationTables::build(view, region).unwrap();

    for _ in 0..200 {
        let x0 = rng.random_range(0..region.width());
        let x1 = rng.random_range(x0..region.width());
        let y0 = rng.random_range(0..region.height());
        let y1 = rng.random_range(y0..region.height());

        let mut sum = 0.0f64;
        let mut sum_sq = 0.0f64;
        for y in y0..=y1 {
            for x in x0..=x1 {
                let v = data[(region.min_y + y) * width + region.min_x + x] as f64;
                sum += v;
                sum_sq += v * v;
            }
        }

        let got = tables.window_sum(x0, y0, x1, y1);
        let got_sq = tables.window_sum_sq(x0, y0, x1, y1);
        assert!(
            (got - sum).abs() < 1e-6,
            "sum mismatch at ({x0},{y0})-({x1},{y1}): {got} vs {sum}"
        );
        assert!(
            (got_sq - sum_sq).abs() < 1e-6,
            "squared-sum mismatch at ({x0},{y0})-({x1},{y1}): {got_sq} vs {sum_sq}"
        );
    }
}

#[test]
fn full_region_and_single_pixel_windows() {
    let mut rng = rand::rng();
    let width = 16usize;
    let height = 12usize;
    let data: Vec<u8> = (0..width * height).map(|_| rng.random()).collect();
    let view = RasterView::from_slice(&data, width, height).unwrap();
    let region = Region::new(0, 0, width, height);
    let tables = SummationTables::build(view, region).unwrap();

    let total: f64 = data.iter().map(|&v| v as f64).sum();
    assert!((tables.window_sum(0, 0, width - 1, height - 1) - total).abs() < 1e-6);

    for _ in 0..32 {
        let x = rng.random_range(0..width);
        let y = rng.random_range(0..height);
        let v = data[y * width + x] as f64;
        assert_eq!(tables.window_sum(x, y, x, y), v);
        assert_eq!(tables.window_sum_sq(x, y, x, y), v * v);
    }
}

use std::sync::atomic::AtomicU64;

use gatematch::{CorrelationContext, RasterView, Region, SummationTables, ZeroMeanTemplate};

const IMG_W: usize = 160;
const IMG_H: usize = 120;

fn textured_patch(width: usize, height: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            data.push((((x * 13) ^ (y * 7) ^ (x * y)) & 0xFF) as u8);
        }
    }
    data
}

fn flip_ud(data: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut out = vec![0u8; data.len()];
    for y in 0..height {
        out[(height - 1 - y) * width..(height - y) * width]
            .copy_from_slice(&data[y * width..(y + 1) * width]);
    }
    out
}

fn flip_lr(data: &[u8], width: usize) -> Vec<u8> {
    let mut out = data.to_vec();
    for row in out.chunks_exact_mut(width) {
        row.reverse();
    }
    out
}

fn blit(image: &mut [u8], patch: &[u8], width: usize, height: usize, x0: usize, y0: usize) {
    for y in 0..height {
        image[(y0 + y) * IMG_W + x0..(y0 + y) * IMG_W + x0 + width]
            .copy_from_slice(&patch[y * width..(y + 1) * width]);
    }
}

/// Self-correlation is 1.0 for every flip orientation when the raster copy
/// is flipped to match.
#[test]
fn self_correlation_is_one_for_all_orientations() {
    let tpl_w = 8usize;
    let tpl_h = 6usize;
    let patch = textured_patch(tpl_w, tpl_h);
    let tpl_bounds = Region::new(20, 20, 20 + tpl_w, 20 + tpl_h);
    let copy_at = (60usize, 40usize);

    // (flip up/down, flip left/right) flags in sweep order.
    let orientations = [(false, false), (true, false), (true, true), (false, true)];

    for (ud, lr) in orientations {
        let mut image = vec![100u8; IMG_W * IMG_H];
        blit(&mut image, &patch, tpl_w, tpl_h, 20, 20);

        let mut flipped = patch.clone();
        if ud {
            flipped = flip_ud(&flipped, tpl_w, tpl_h);
        }
        if lr {
            flipped = flip_lr(&flipped, tpl_w);
        }
        blit(&mut image, &flipped, tpl_w, tpl_h, copy_at.0, copy_at.1);

        let view = RasterView::from_slice(&image, IMG_W, IMG_H).unwrap();
        let region = Region::new(0, 0, IMG_W, IMG_H);
        let tables = SummationTables::build(view, region).unwrap();

        let mut template = ZeroMeanTemplate::from_raster(view, tpl_bounds).unwrap();
        if ud {
            template.flip_up_down();
        }
        if lr {
            template.flip_left_right();
        }

        let evaluations = AtomicU64::new(0);
        let ctx = CorrelationContext::new(view, &tables, region, &template, &evaluations);
        let score = ctx
            .score_at(copy_at.0, copy_at.1)
            .expect("textured window has variance");
        assert!(
            (score - 1.0).abs() < 1e-9,
            "orientation (ud={ud}, lr={lr}) scored {score}"
        );
    }
}

/// A constant template on a constant raster never produces a score: the
/// denominator is degenerate everywhere.
#[test]
fn flat_template_on_flat_raster_scores_nothing() {
    let image = vec![77u8; IMG_W * IMG_H];
    let view = RasterView::from_slice(&image, IMG_W, IMG_H).unwrap();
    let region = Region::new(0, 0, IMG_W, IMG_H);
    let tables = SummationTables::build(view, region).unwrap();
    let template = ZeroMeanTemplate::from_raster(view, Region::new(0, 0, 10, 10)).unwrap();

    let evaluations = AtomicU64::new(0);
    let ctx = CorrelationContext::new(view, &tables, region, &template, &evaluations);
    for (x, y) in [(0, 0), (25, 30), (150, 110)] {
        assert_eq!(ctx.score_at(x, y), None);
    }
}

/// Mean shifts of the window do not change the score: NCC is invariant to
/// additive intensity offsets.
#[test]
fn score_is_invariant_to_additive_offset() {
    let tpl_w = 8usize;
    let tpl_h = 8usize;
    // Even values so the halved copy below is an exact affine transform.
    let patch: Vec<u8> = textured_patch(tpl_w, tpl_h)
        .into_iter()
        .map(|v| v & !1)
        .collect();

    let mut image = vec![50u8; IMG_W * IMG_H];
    blit(&mut image, &patch, tpl_w, tpl_h, 30, 30);
    // Second copy at half contrast, shifted up in intensity by 40.
    let brightened: Vec<u8> = patch.iter().map(|&v| (v / 2) + 40).collect();
    blit(&mut image, &brightened, tpl_w, tpl_h, 90, 70);

    let view = RasterView::from_slice(&image, IMG_W, IMG_H).unwrap();
    let region = Region::new(0, 0, IMG_W, IMG_H);
    let tables = SummationTables::build(view, region).unwrap();
    let template =
        ZeroMeanTemplate::from_raster(view, Region::new(30, 30, 30 + tpl_w, 30 + tpl_h)).unwrap();

    let evaluations = AtomicU64::new(0);
    let ctx = CorrelationContext::new(view, &tables, region, &template, &evaluations);
    let exact = ctx.score_at(30, 30).unwrap();
    let scaled = ctx.score_at(90, 70).unwrap();
    assert!((exact - 1.0).abs() < 1e-9);
    // Halved contrast plus offset is still a perfect normalized match.
    assert!((scaled - 1.0).abs() < 1e-6, "got {scaled}");
}

#![allow(clippy::float_cmp)]

use super::*;

const EPSILON: f64 = 1e-9;

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

fn point_approx_eq(a: Point, b: Point) -> bool {
    approx_eq(a.x, b.x) && approx_eq(a.y, b.y)
}

fn rect_approx_eq(a: Rect, b: Rect) -> bool {
    approx_eq(a.left, b.left) && approx_eq(a.top, b.top) && approx_eq(a.width, b.width) && approx_eq(a.height, b.height)
}

// --- Dims ---

#[test]
fn dims_default_is_unmeasured() {
    assert!(!Dims::default().is_measured());
    assert!(!Dims::new(0, 600).is_measured());
    assert!(!Dims::new(800, 0).is_measured());
    assert!(Dims::new(1, 1).is_measured());
}

// --- Points ---

#[test]
fn normalize_point_divides_by_local_size() {
    let n = normalize_point(Point::new(100.0, 100.0), Dims::new(200, 200));
    assert!(point_approx_eq(n, Point::new(0.5, 0.5)));
}

#[test]
fn normalize_point_on_unmeasured_canvas_is_origin() {
    let n = normalize_point(Point::new(50.0, 70.0), Dims::default());
    assert_eq!(n, Point::new(0.0, 0.0));
}

#[test]
fn normalize_point_clamps_out_of_bounds_input() {
    let dims = Dims::new(400, 300);
    let n = normalize_point(Point::new(450.0, -20.0), dims);
    assert_eq!(n, Point::new(1.0, 0.0));
}

#[test]
fn denormalize_point_clamps_into_canvas() {
    let dims = Dims::new(400, 300);
    let p = denormalize_point(Point::new(1.5, -0.5), dims);
    assert_eq!(p, Point::new(400.0, 0.0));
}

#[test]
fn point_round_trip_is_identity_within_bounds() {
    let dims = Dims::new(1366, 768);
    for &(x, y) in &[(0.0, 0.0), (1366.0, 768.0), (683.0, 384.0), (12.5, 700.25), (1000.0, 1.0)] {
        let p = Point::new(x, y);
        let back = denormalize_point(normalize_point(p, dims), dims);
        assert!(point_approx_eq(back, p), "{p:?} came back as {back:?}");
    }
}

#[test]
fn cross_device_scaling_is_proportional() {
    let n = normalize_point(Point::new(100.0, 100.0), Dims::new(200, 200));
    let p = denormalize_point(n, Dims::new(400, 400));
    assert!(point_approx_eq(p, Point::new(200.0, 200.0)));
}

#[test]
fn tutor_stroke_lands_proportionally_on_smaller_student_canvas() {
    let tutor = Dims::new(1200, 800);
    let student = Dims::new(300, 200);

    let a = normalize_point(Point::new(600.0, 400.0), tutor);
    let b = normalize_point(Point::new(700.0, 450.0), tutor);
    assert!(point_approx_eq(a, Point::new(0.5, 0.5)));
    assert!(approx_eq(b.x, 700.0 / 1200.0));
    assert!(approx_eq(b.y, 0.5625));
    assert!(approx_eq(normalize_line_width(4.0), 2.0));

    assert!(point_approx_eq(denormalize_point(a, student), Point::new(150.0, 100.0)));
    assert!(point_approx_eq(denormalize_point(b, student), Point::new(175.0, 112.5)));
}

// --- Line width ---

#[test]
fn normalize_line_width_ignores_canvas_size() {
    assert!(approx_eq(normalize_line_width(2.0), 1.0));
    assert!(approx_eq(normalize_line_width(5.0), 2.5));
}

#[test]
fn denormalize_line_width_scales_by_smaller_side() {
    // Smaller side 540 is half of the virtual 1080.
    let w = denormalize_line_width(2.0, Dims::new(2000, 540));
    assert!(approx_eq(w, 2.0));
    let w = denormalize_line_width(2.0, Dims::new(1920, 1080));
    assert!(approx_eq(w, 4.0));
}

#[test]
fn denormalize_line_width_is_clamped() {
    assert!(approx_eq(denormalize_line_width(0.01, Dims::new(100, 100)), 0.5));
    assert!(approx_eq(denormalize_line_width(500.0, Dims::new(3840, 2160)), 64.0));
}

#[test]
fn lengths_on_unmeasured_canvas_are_zero() {
    assert_eq!(denormalize_line_width(2.0, Dims::default()), 0.0);
    assert_eq!(normalize_font_size(16.0, Dims::default()), 0.0);
    assert_eq!(denormalize_font_size(1.0, Dims::default()), 0.0);
    assert_eq!(canvas_scale(Dims::default()), 0.0);
}

// --- Font size ---

#[test]
fn font_size_round_trips_on_same_canvas() {
    let dims = Dims::new(1280, 720);
    let n = normalize_font_size(24.0, dims);
    assert!(approx_eq(denormalize_font_size(n, dims), 24.0));
}

#[test]
fn reference_font_on_virtual_canvas_normalizes_to_one() {
    assert!(approx_eq(normalize_font_size(16.0, Dims::new(1920, 1080)), 1.0));
}

#[test]
fn font_size_follows_smaller_side_across_aspect_ratios() {
    // Wide desktop to tall phone: smaller sides 1080 and 390.
    let n = normalize_font_size(32.0, Dims::new(1920, 1080));
    let px = denormalize_font_size(n, Dims::new(390, 844));
    assert!(approx_eq(px, 32.0 * 390.0 / 1080.0));
}

#[test]
fn denormalize_font_size_is_clamped() {
    assert_eq!(denormalize_font_size(0.01, Dims::new(1920, 1080)), 8.0);
    assert_eq!(denormalize_font_size(50.0, Dims::new(1920, 1080)), 72.0);
}

// --- Page rectangles ---

#[test]
fn rect_to_pct_is_relative_to_page_box() {
    let page = Rect::new(50.0, 100.0, 600.0, 800.0);
    let selection = Rect::new(110.0, 260.0, 180.0, 40.0);
    let pct = rect_to_pct(selection, page);
    assert!(approx_eq(pct.x_pct, 10.0));
    assert!(approx_eq(pct.y_pct, 20.0));
    assert!(approx_eq(pct.w_pct, 30.0));
    assert!(approx_eq(pct.h_pct, 5.0));
}

#[test]
fn rect_to_pct_clips_to_page() {
    let page = Rect::new(0.0, 0.0, 100.0, 100.0);
    let pct = rect_to_pct(Rect::new(-10.0, 90.0, 30.0, 20.0), page);
    assert!(approx_eq(pct.x_pct, 0.0));
    assert!(approx_eq(pct.w_pct, 20.0));
    assert!(approx_eq(pct.y_pct, 90.0));
    assert!(approx_eq(pct.h_pct, 10.0));
}

#[test]
fn rect_to_pct_on_empty_page_is_zero() {
    let pct = rect_to_pct(Rect::new(1.0, 1.0, 5.0, 5.0), Rect::default());
    assert_eq!(pct, PctRect { x_pct: 0.0, y_pct: 0.0, w_pct: 0.0, h_pct: 0.0 });
}

#[test]
fn pct_to_rect_ignores_zoom_of_receiver() {
    let pct = PctRect { x_pct: 10.0, y_pct: 20.0, w_pct: 30.0, h_pct: 5.0 };
    let at_100 = pct_to_rect(pct, 600.0, 800.0);
    let at_200 = pct_to_rect(pct, 1200.0, 1600.0);
    assert!(rect_approx_eq(at_100, Rect::new(60.0, 160.0, 180.0, 40.0)));
    assert!(rect_approx_eq(at_200, Rect::new(120.0, 320.0, 360.0, 80.0)));
}

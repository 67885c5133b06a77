//! Unit tests for mask rasterization

use std::io::Cursor;

use image::{GenericImageView, ImageFormat, Rgba, RgbaImage};
use image_edit_gateway::{mask, AppError};

fn source_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([10, 200, 30, 255]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

#[test]
fn test_mask_matches_rectangle_exactly() {
    let png = mask::create_mask(&source_png(100, 100), &[vec![25.0, 25.0, 75.0, 75.0]]).unwrap();

    let decoded = image::load_from_memory_with_format(&png, ImageFormat::Png).unwrap();
    assert_eq!(decoded.dimensions(), (100, 100));

    let gray = decoded.to_luma8();
    for (x, y, pixel) in gray.enumerate_pixels() {
        let inside = (25..=75).contains(&x) && (25..=75).contains(&y);
        let expected = if inside { mask::SELECTED } else { mask::UNSELECTED };
        assert_eq!(pixel[0], expected, "pixel ({}, {})", x, y);
    }
}

#[test]
fn test_mask_keeps_source_dimensions() {
    let png = mask::create_mask(&source_png(64, 48), &[]).unwrap();
    let decoded = image::load_from_memory(&png).unwrap();

    assert_eq!(decoded.dimensions(), (64, 48));
    assert!(decoded.to_luma8().pixels().all(|p| p[0] == mask::UNSELECTED));
}

#[test]
fn test_overlapping_and_partial_rectangles() {
    let gray = mask::rasterize(
        10,
        10,
        &[
            vec![0.0, 0.0, 3.0, 3.0],
            vec![2.0, 2.0, 4.0, 4.0],
            vec![8.0, 8.0, 50.0, 50.0],
            vec![1.0, 1.0],
        ],
    );

    assert_eq!(gray.get_pixel(0, 0)[0], mask::SELECTED);
    assert_eq!(gray.get_pixel(4, 4)[0], mask::SELECTED);
    assert_eq!(gray.get_pixel(9, 9)[0], mask::SELECTED);
    assert_eq!(gray.get_pixel(5, 5)[0], mask::UNSELECTED);
    assert_eq!(gray.get_pixel(7, 9)[0], mask::UNSELECTED);
}

#[test]
fn test_undecodable_image_is_rejected() {
    let err = mask::create_mask(b"not an image at all", &[vec![0.0, 0.0, 1.0, 1.0]]).unwrap_err();
    assert!(matches!(err, AppError::ImageDecode(_)));
}

#[test]
fn test_parse_mask_data() {
    let rects = mask::parse_mask_data("[[1, 2, 3, 4], [5.5, 6, 7, 8]]").unwrap();
    assert_eq!(rects, vec![vec![1.0, 2.0, 3.0, 4.0], vec![5.5, 6.0, 7.0, 8.0]]);

    let err = mask::parse_mask_data("{\"x\": 1}").unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

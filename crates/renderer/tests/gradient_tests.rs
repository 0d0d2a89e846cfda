//! Tests for colormaps and value-to-color mapping.

use renderer::gradient::{interpolate_color, render_values, Color, Colormap};

// ============================================================================
// interpolate_color tests
// ============================================================================

#[test]
fn test_interpolate_endpoints() {
    let a = Color::rgb(10, 20, 30);
    let b = Color::new(200, 100, 0, 0);
    assert_eq!(interpolate_color(a, b, 0.0), a);
    assert_eq!(interpolate_color(a, b, 1.0), b);
}

#[test]
fn test_interpolate_clamps() {
    let a = Color::rgb(0, 0, 0);
    let b = Color::rgb(255, 255, 255);
    assert_eq!(interpolate_color(a, b, -1.0), a);
    assert_eq!(interpolate_color(a, b, 2.0), b);
}

// ============================================================================
// Colormap tests
// ============================================================================

#[test]
fn test_viridis_is_monotonic_in_green() {
    let greens: Vec<u8> = (0..=20).map(|i| Colormap::Viridis.color_at(i as f32 / 20.0).g).collect();
    assert!(greens.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_terrain_low_is_water() {
    let low = Colormap::Terrain.color_at(0.05);
    assert!(low.b > low.r && low.b > low.g);
}

#[test]
fn test_colormap_nan_position() {
    assert_eq!(Colormap::Viridis.color_at(f32::NAN), Colormap::Viridis.color_at(0.0));
}

#[test]
fn test_colormap_serde_names() {
    assert_eq!(Colormap::Terrain.to_string(), "terrain");
    assert_eq!(Colormap::from_str(&Colormap::Greys.to_string()), Colormap::Greys);
}

// ============================================================================
// render_values tests
// ============================================================================

#[test]
fn test_render_values_normalizes() {
    let data = [0.0, 5.0, 10.0, 20.0];
    let pixels = render_values(&data, 0.0, 10.0, Color::transparent(), |t| {
        Color::rgb((t * 100.0) as u8, 0, 0)
    });
    let reds: Vec<u8> = pixels.chunks_exact(4).map(|p| p[0]).collect();
    assert_eq!(reds, vec![0, 50, 100, 100]);
}

#[test]
fn test_render_values_nodata() {
    let nodata = Color::new(1, 2, 3, 4);
    let pixels = render_values(&[f32::NAN, 1.0], 0.0, 1.0, nodata, |_| Color::rgb(9, 9, 9));
    assert_eq!(&pixels[0..4], &[1, 2, 3, 4]);
    assert_eq!(&pixels[4..8], &[9, 9, 9, 255]);
}

#[test]
fn test_render_values_flat_range() {
    let pixels = render_values(&[3.0, 3.0], 3.0, 3.0, Color::transparent(), |t| {
        Color::rgb((t * 255.0) as u8, 0, 0)
    });
    assert_eq!(pixels[0], 0);
    assert_eq!(pixels[4], 0);
}

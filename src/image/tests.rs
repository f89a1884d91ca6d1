use super::*;

fn gradient(width: u32, height: u32) -> Image {
    let mut image = Image::new(width, height);
    for y in 0..height {
        for x in 0..width {
            image.set(x, y, Color::from_rgb8(x as u8, y as u8, 0));
        }
    }
    image
}

#[test]
fn flip_mirrors_columns() {
    let image = gradient(3, 2);
    let flipped = image.flip_horizontal();
    assert_eq!(flipped.resolution(), image.resolution());
    for y in 0..2 {
        for x in 0..3 {
            assert_eq!(flipped.get(x, y), image.get(2 - x, y));
        }
    }

    let mut in_place = image.clone();
    in_place.flip_horizontal_in_place();
    assert_eq!(in_place.data(), flipped.data());
}

#[test]
fn get_set_out_of_bounds() {
    let mut image = Image::new(2, 2);
    image.set(5, 0, Color::WHITE);
    assert_eq!(image.get(5, 0), None);
    assert_eq!(image.get(1, 1), Some(Color::NULL));

    image.clear(Color::BLUE);
    assert!(image.data().chunks(4).all(|px| px == [0, 0, 255, 255]));
}

#[test]
fn view_outside_reads_null() {
    let image = gradient(4, 4);
    let view = image.view(Rect::from_top_left(-2.0, 2.0, 4.0, 4.0));
    assert_eq!(view.resolution(), Resolution::new(4, 4));
    assert_eq!(view.get(0, 0), Color::NULL);
    assert_eq!(view.get(2, 0), Color::from_rgb8(0, 2, 0));
    assert_eq!(view.get(3, 1), Color::from_rgb8(1, 3, 0));
    // Row 4 of the image does not exist.
    assert_eq!(view.get(2, 2), Color::NULL);

    let copy = view.to_image();
    assert_eq!(copy.get(3, 1), Some(Color::from_rgb8(1, 3, 0)));
    assert_eq!(copy.get(0, 3), Some(Color::NULL));
}

#[test]
fn view_sampling() {
    let image = gradient(4, 4);
    let view = image.view(image.rect());
    assert_eq!(view.sample(0.0, 0.0), Color::from_rgb8(0, 0, 0));
    assert_eq!(view.sample(0.99, 0.5), Color::from_rgb8(3, 2, 0));
    assert_eq!(view.sample(1.5, 0.0), Color::NULL);
}

#[test]
fn from_rgba8_checks_size() {
    let res = Resolution::new(2, 1);
    assert!(Image::from_rgba8(res, &[0; 7]).is_err());
    let image = Image::from_rgba8(res, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
    assert_eq!(image.get(1, 0), Some(Color([5, 6, 7, 8])));
}

#[test]
fn corrupt_jpeg_is_an_error() {
    assert!(Image::decode_jpeg(&[0xFF, 0xD8, 0x00, 0x01]).is_err());
}

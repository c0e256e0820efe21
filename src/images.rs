use image::{
    imageops::{self, FilterType},
    DynamicImage, GrayImage, Luma, Rgb, RgbImage,
};
use serde::{Deserialize, Serialize};

use crate::primitives::{Rect, Size};

/// Converts any pixel format to the single channel form the scanner works on
pub fn to_gray(img: &DynamicImage) -> GrayImage { img.to_luma8() }

/// Dimensions of an image as a signed `Size`
pub fn size_of(img: &GrayImage) -> Size {
    Size::new(img.width() as i32, img.height() as i32)
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct IntegralImage {
    pixels: Vec<i64>,
    width: usize,
    height: usize,
}
impl IntegralImage {
    /// Creates an integral image from an image. The result has one extra
    /// leading row and column of zeros so any rectangle sum needs no
    /// bounds special-casing.
    pub fn new(img: &GrayImage) -> Self {
        let w = img.width() as usize;
        let h = img.height() as usize;
        let stride = w + 1;
        let mut pixels = vec![0i64; stride * (h + 1)];
        for (y, row) in img.as_raw().chunks_exact(w.max(1)).take(h).enumerate() {
            let mut row_sum = 0i64;
            for (x, &p) in row.iter().enumerate() {
                row_sum += i64::from(p);
                pixels[(y + 1) * stride + x + 1] = pixels[y * stride + x + 1] + row_sum;
            }
        }
        Self { pixels, width: w, height: h }
    }

    pub fn width(&self) -> usize { self.width }

    pub fn height(&self) -> usize { self.height }

    /// Gets the sum of pixels in a rectangular region of the original image
    pub fn rect_sum(&self, r: &Rect) -> i64 {
        let stride = self.width + 1;
        let x0 = r.x as usize;
        let y0 = r.y as usize;
        let x1 = r.right() as usize;
        let y1 = r.bottom() as usize;
        self.pixels[y1 * stride + x1] - self.pixels[y0 * stride + x1]
            - self.pixels[y1 * stride + x0]
            + self.pixels[y0 * stride + x0]
    }
}

/// One weighted training window
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ImageData {
    pub image: IntegralImage,
    pub weight: f64,
    pub is_object: bool,
}
impl ImageData {
    pub fn new(img: &GrayImage, is_object: bool) -> Self {
        Self { image: IntegralImage::new(img), weight: 0.0, is_object }
    }

    /// Normalize the weights of a set of image data
    pub fn normalize_weights(set: &mut [Self]) {
        // Sum over the weights of all the images
        let sum: f64 = set.iter().map(|d| d.weight).sum();
        if sum <= 0.0 {
            return;
        }

        // Divide each image's original weight by the sum
        for data in set.iter_mut() {
            data.weight /= sum;
        }
    }
}

/// Resizes an image to exactly the window size, leaving it untouched if it
/// already matches
pub fn fit_to_window(img: &GrayImage, window: Size) -> GrayImage {
    let (w, h) = (window.width as u32, window.height as u32);
    if img.dimensions() == (w, h) {
        img.clone()
    } else {
        imageops::resize(img, w, h, FilterType::Triangle)
    }
}

/// Cuts an image into all non-overlapping tiles of the window size
pub fn tiles(img: &GrayImage, window: Size) -> Vec<GrayImage> {
    let (w, h) = (window.width as u32, window.height as u32);
    if w == 0 || h == 0 {
        return Vec::new();
    }
    let mut out = Vec::new();
    for ty in 0..(img.height() / h) {
        for tx in 0..(img.width() / w) {
            out.push(imageops::crop_imm(img, tx * w, ty * h, w, h).to_image());
        }
    }
    out
}

/// A reusable single channel buffer holding one scaled view of an image.
///
/// The buffer is sized once for the largest view it will hold; each call to
/// [`ScaleBuffer::resize_from`] overwrites its prefix in place.
#[derive(Debug, Clone)]
pub struct ScaleBuffer {
    data: Vec<u8>,
    width: usize,
    height: usize,
}
impl ScaleBuffer {
    /// Allocates a buffer large enough for any view of `img` at scale >= 1
    pub fn for_image(img: &GrayImage) -> Self {
        let cap = (img.width() as usize + 1) * (img.height() as usize + 1);
        Self { data: vec![0; cap], width: 0, height: 0 }
    }

    pub fn size(&self) -> Size { Size::new(self.width as i32, self.height as i32) }

    pub fn capacity(&self) -> usize { self.data.len() }

    /// Resizes `src` into the buffer with bilinear interpolation using
    /// half-pixel centres, so a view of the same size is an exact copy.
    pub fn resize_from(&mut self, src: &GrayImage, size: Size) {
        let dw = size.width.max(0) as usize;
        let dh = size.height.max(0) as usize;
        if dw * dh > self.data.len() {
            self.data.resize(dw * dh, 0);
        }
        self.width = dw;
        self.height = dh;

        let sw = src.width() as usize;
        let sh = src.height() as usize;
        if dw == 0 || dh == 0 || sw == 0 || sh == 0 {
            return;
        }
        let raw = src.as_raw();
        let xs = linear_taps(sw, dw);
        let ys = linear_taps(sh, dh);

        for (dy, &(y0, fy)) in ys.iter().enumerate() {
            let y1 = (y0 + 1).min(sh - 1);
            let row0 = &raw[y0 * sw..(y0 + 1) * sw];
            let row1 = &raw[y1 * sw..(y1 + 1) * sw];
            let out = &mut self.data[dy * dw..(dy + 1) * dw];
            for (o, &(x0, fx)) in out.iter_mut().zip(xs.iter()) {
                let x1 = (x0 + 1).min(sw - 1);
                let top = f32::from(row0[x0]) * (1.0 - fx) + f32::from(row0[x1]) * fx;
                let bot = f32::from(row1[x0]) * (1.0 - fx) + f32::from(row1[x1]) * fx;
                *o = (top * (1.0 - fy) + bot * fy).round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    /// Copies the `size` window at `(x, y)` of the current view
    pub fn window(&self, x: i32, y: i32, size: Size) -> GrayImage {
        let (x, y) = (x as usize, y as usize);
        let stride = self.width;
        GrayImage::from_fn(size.width as u32, size.height as u32, |wx, wy| {
            Luma([self.data[(y + wy as usize) * stride + x + wx as usize]])
        })
    }

    /// The current view as an owned image
    pub fn to_image(&self) -> GrayImage {
        self.window(0, 0, self.size())
    }
}

/// Source index and fractional offset for every destination coordinate
fn linear_taps(src: usize, dst: usize) -> Vec<(usize, f32)> {
    let scale = src as f64 / dst as f64;
    (0..dst)
        .map(|d| {
            let f = (d as f64 + 0.5) * scale - 0.5;
            let mut s = f.floor();
            let mut frac = f - s;
            if s < 0.0 {
                s = 0.0;
                frac = 0.0;
            }
            if s as usize >= src - 1 {
                s = (src - 1) as f64;
                frac = 0.0;
            }
            (s as usize, frac as f32)
        })
        .collect()
}

/// Draws a rectangle over an image, clipped to its bounds
pub fn draw_rectangle(img: &mut RgbImage, r: &Rect) {
    let pixel: Rgb<u8> = Rgb::from([0x88, 0x95, 0x8D]);
    let (w, h) = (img.width() as i32, img.height() as i32);
    if w == 0 || h == 0 || r.width <= 0 || r.height <= 0 {
        return;
    }
    let left = r.x.clamp(0, w - 1);
    let right = (r.right() - 1).clamp(0, w - 1);
    let top = r.y.clamp(0, h - 1);
    let bottom = (r.bottom() - 1).clamp(0, h - 1);
    for x in left..=right {
        img.put_pixel(x as u32, top as u32, pixel);
        img.put_pixel(x as u32, bottom as u32, pixel);
    }
    for y in top..=bottom {
        img.put_pixel(left as u32, y as u32, pixel);
        img.put_pixel(right as u32, y as u32, pixel);
    }
}

use image::{imageops, Rgb, RgbImage, Rgba, RgbaImage};

use crate::{
    error::{Result, TeleopError},
    font,
    toggles::ToggleStore,
};

pub const BLUR_TOGGLE: &str = "blur";
pub const SIGN_TOGGLE: &str = "sign";

const BATTERY_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const BANNER_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const LABEL_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const CHECKBOX_ON: Rgb<u8> = Rgb([0, 255, 0]);
const CHECKBOX_OFF: Rgb<u8> = Rgb([255, 255, 255]);

/// Channel order of the bytes a video source hands over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorOrder {
    Bgr,
    Rgb,
}

/// A decoded video frame as delivered by the video source.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: RgbImage,
    pub order: ColorOrder,
}

impl Frame {
    pub fn new(image: RgbImage, order: ColorOrder) -> Self {
        Self { image, order }
    }

    /// Wraps a packed `bgr24` buffer. Returns `None` when the buffer length
    /// does not match the dimensions.
    pub fn from_bgr(width: u32, height: u32, bytes: Vec<u8>) -> Option<Self> {
        RgbImage::from_raw(width, height, bytes).map(|image| Self::new(image, ColorOrder::Bgr))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Telemetry {
    pub battery: u8,
}

/// Memory layout of a canvas. `ColumnMajor` stores screen pixel (x, y) at
/// buffer position (y, x), the layout a display surface indexed by column
/// first expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    RowMajor,
    ColumnMajor,
}

/// Pixel buffer addressed in screen coordinates whatever its layout.
#[derive(Debug, Clone)]
pub struct Canvas {
    pixels: RgbImage,
    layout: Layout,
}

impl Canvas {
    pub fn row_major(pixels: RgbImage) -> Self {
        Self {
            pixels,
            layout: Layout::RowMajor,
        }
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn width(&self) -> u32 {
        match self.layout {
            Layout::RowMajor => self.pixels.width(),
            Layout::ColumnMajor => self.pixels.height(),
        }
    }

    pub fn height(&self) -> u32 {
        match self.layout {
            Layout::RowMajor => self.pixels.height(),
            Layout::ColumnMajor => self.pixels.width(),
        }
    }

    fn buffer_pos(&self, x: i32, y: i32) -> Option<(u32, u32)> {
        if x < 0 || y < 0 || x as u32 >= self.width() || y as u32 >= self.height() {
            return None;
        }
        match self.layout {
            Layout::RowMajor => Some((x as u32, y as u32)),
            Layout::ColumnMajor => Some((y as u32, x as u32)),
        }
    }

    pub fn get_pixel(&self, x: i32, y: i32) -> Option<Rgb<u8>> {
        self.buffer_pos(x, y)
            .map(|(bx, by)| *self.pixels.get_pixel(bx, by))
    }

    pub fn put_pixel(&mut self, x: i32, y: i32, color: Rgb<u8>) {
        if let Some((bx, by)) = self.buffer_pos(x, y) {
            self.pixels.put_pixel(bx, by, color);
        }
    }

    pub fn fill_rect(&mut self, x: i32, y: i32, w: u32, h: u32, color: Rgb<u8>) {
        for dy in 0..h as i32 {
            for dx in 0..w as i32 {
                self.put_pixel(x + dx, y + dy, color);
            }
        }
    }

    /// Alpha-blends `icon` with its top-left corner at (x, y).
    pub fn blit(&mut self, icon: &RgbaImage, x: i32, y: i32) {
        for (ix, iy, px) in icon.enumerate_pixels() {
            let Rgba([r, g, b, a]) = *px;
            if a == 0 {
                continue;
            }
            let sx = x + ix as i32;
            let sy = y + iy as i32;
            let Some(Rgb(dst)) = self.get_pixel(sx, sy) else {
                continue;
            };
            let blend = |s: u8, d: u8| ((s as u32 * a as u32 + d as u32 * (255 - a as u32)) / 255) as u8;
            let out = Rgb([blend(r, dst[0]), blend(g, dst[1]), blend(b, dst[2])]);
            self.put_pixel(sx, sy, out);
        }
    }
}

/// One step of the overlay pipeline. Steps run in the order of
/// [`OVERLAY_ORDER`]; each consumes the canvas and hands back the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    NormalizeColor,
    BatteryText,
    Blur,
    Orient,
    Banner,
    SignIcon,
    Checkboxes,
}

pub const OVERLAY_ORDER: [Stage; 7] = [
    Stage::NormalizeColor,
    Stage::BatteryText,
    Stage::Blur,
    Stage::Orient,
    Stage::Banner,
    Stage::SignIcon,
    Stage::Checkboxes,
];

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayStyle {
    /// Gaussian kernel size; rounded up to the next odd number.
    pub blur_kernel: u32,
    pub text_scale: u32,
    pub banner_text: String,
    pub banner_scale: u32,
    pub icon_origin: (i32, i32),
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            blur_kernel: 15,
            text_scale: 4,
            banner_text: "Sleepy!".to_owned(),
            banner_scale: 8,
            icon_origin: (880, 10),
        }
    }
}

/// Same sigma OpenCV picks for a Gaussian blur given only a kernel size.
pub fn kernel_sigma(kernel: u32) -> f32 {
    let k = (kernel.max(1) | 1) as f32;
    0.3 * ((k - 1.0) * 0.5 - 1.0) + 0.8
}

/// Normalized 1-D Gaussian weights with exactly `kernel` taps, rounded up to
/// the next odd count.
pub fn gaussian_kernel(kernel: u32) -> Vec<f32> {
    let k = kernel.max(1) | 1;
    let sigma = kernel_sigma(k);
    let r = (k / 2) as i32;
    let mut weights: Vec<f32> = (-r..=r)
        .map(|i| (-((i * i) as f32) / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum: f32 = weights.iter().sum();
    weights.iter_mut().for_each(|w| *w /= sum);
    weights
}

/// Separable Gaussian blur: a horizontal then a vertical pass with the same
/// weights. Borders mirror without repeating the edge pixel.
pub fn gaussian_blur(img: &RgbImage, weights: &[f32]) -> RgbImage {
    let horizontal = convolve_axis(img, weights, true);
    convolve_axis(&horizontal, weights, false)
}

fn convolve_axis(img: &RgbImage, weights: &[f32], horizontal: bool) -> RgbImage {
    let (w, h) = img.dimensions();
    let len = (if horizontal { w } else { h }) as i64;
    let r = (weights.len() / 2) as i64;
    RgbImage::from_fn(w, h, |x, y| {
        let mut acc = [0f32; 3];
        for (i, weight) in weights.iter().enumerate() {
            let off = i as i64 - r;
            let (sx, sy) = if horizontal {
                (reflect101(x as i64 + off, len), y)
            } else {
                (x, reflect101(y as i64 + off, len))
            };
            let Rgb(px) = *img.get_pixel(sx, sy);
            for (a, v) in acc.iter_mut().zip(px) {
                *a += weight * v as f32;
            }
        }
        Rgb(acc.map(|v| v.round().clamp(0.0, 255.0) as u8))
    })
}

// dcb|abcd|cba
fn reflect101(i: i64, len: i64) -> u32 {
    if len <= 1 {
        return 0;
    }
    let period = 2 * (len - 1);
    let m = i.rem_euclid(period);
    (if m >= len { period - m } else { m }) as u32
}

/// A built-in 64x64 "no entry" sign used when no icon file is configured.
pub fn default_sign_icon() -> RgbaImage {
    let size = 64u32;
    let c = (size as f32 - 1.0) / 2.0;
    RgbaImage::from_fn(size, size, |x, y| {
        let dx = x as f32 - c;
        let dy = y as f32 - c;
        let r = (dx * dx + dy * dy).sqrt();
        if r > c {
            Rgba([0, 0, 0, 0])
        } else if dy.abs() <= 6.0 && dx.abs() <= c - 10.0 {
            Rgba([255, 255, 255, 255])
        } else {
            Rgba([220, 20, 20, 255])
        }
    })
}

pub fn load_sign_icon(path: &str) -> Result<RgbaImage> {
    let img = image::open(path).map_err(|e| TeleopError::Display(format!("{path}: {e}")))?;
    Ok(img.to_rgba8())
}

/// Display-ready image, addressed in screen coordinates.
#[derive(Debug, Clone)]
pub struct ComposedFrame {
    canvas: Canvas,
}

impl ComposedFrame {
    pub fn width(&self) -> u32 {
        self.canvas.width()
    }

    pub fn height(&self) -> u32 {
        self.canvas.height()
    }

    pub fn layout(&self) -> Layout {
        self.canvas.layout()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb<u8>> {
        self.canvas.get_pixel(x as i32, y as i32)
    }

    /// Packs the frame as `0RGB` words, row by row, the way a framebuffer
    /// window takes it.
    pub fn to_argb(&self) -> Vec<u32> {
        let (w, h) = (self.width(), self.height());
        let mut out = Vec::with_capacity((w * h) as usize);
        for y in 0..h {
            for x in 0..w {
                let Rgb([r, g, b]) = self.pixel(x, y).unwrap_or(Rgb([0, 0, 0]));
                out.push(((r as u32) << 16) | ((g as u32) << 8) | b as u32);
            }
        }
        out
    }
}

struct StageInput<'a> {
    toggles: &'a ToggleStore,
    telemetry: &'a Telemetry,
    blur: bool,
}

/// Turns raw video frames into display frames: telemetry text, optional
/// blur and sign, and the toggle checkboxes on top.
#[derive(Debug, Clone)]
pub struct FrameCompositor {
    style: OverlayStyle,
    weights: Vec<f32>,
    icon: RgbaImage,
}

impl FrameCompositor {
    pub fn new(style: OverlayStyle, icon: RgbaImage) -> Self {
        let weights = gaussian_kernel(style.blur_kernel);
        Self {
            style,
            weights,
            icon,
        }
    }

    pub fn stages(&self) -> &'static [Stage] {
        &OVERLAY_ORDER
    }

    pub fn compose(
        &self,
        frame: &Frame,
        toggles: &ToggleStore,
        telemetry: &Telemetry,
    ) -> Result<ComposedFrame> {
        let input = StageInput {
            toggles,
            telemetry,
            blur: toggles.get(BLUR_TOGGLE)?,
        };
        let mut canvas = Canvas::row_major(frame.image.clone());
        for stage in self.stages() {
            canvas = self.apply(*stage, canvas, frame.order, &input)?;
        }
        Ok(ComposedFrame { canvas })
    }

    fn apply(
        &self,
        stage: Stage,
        mut canvas: Canvas,
        order: ColorOrder,
        input: &StageInput,
    ) -> Result<Canvas> {
        match stage {
            Stage::NormalizeColor => {
                if order == ColorOrder::Bgr {
                    for px in canvas.pixels.pixels_mut() {
                        px.0.swap(0, 2);
                    }
                }
            }
            Stage::BatteryText => {
                let text = format!("Battery: {}%", input.telemetry.battery);
                let y = canvas.height() as i32 - 5 - font::text_height(self.style.text_scale) as i32;
                font::draw_text(&mut canvas, 5, y, &text, BATTERY_COLOR, self.style.text_scale);
            }
            Stage::Blur => {
                if input.blur {
                    canvas.pixels = gaussian_blur(&canvas.pixels, &self.weights);
                }
            }
            Stage::Orient => {
                // rotate a quarter turn then flip vertically: a transpose
                if canvas.layout == Layout::RowMajor {
                    let turned = imageops::rotate270(&canvas.pixels);
                    canvas = Canvas {
                        pixels: imageops::flip_vertical(&turned),
                        layout: Layout::ColumnMajor,
                    };
                }
            }
            Stage::Banner => {
                if input.blur {
                    let text = &self.style.banner_text;
                    let scale = self.style.banner_scale;
                    let x = (canvas.width() as i32 - font::text_width(text, scale) as i32) / 2;
                    let y = (canvas.height() as i32 - font::text_height(scale) as i32) / 2;
                    font::draw_text(&mut canvas, x, y, text, BANNER_COLOR, scale);
                }
            }
            Stage::SignIcon => {
                if input.toggles.get(SIGN_TOGGLE)? {
                    let (x, y) = self.style.icon_origin;
                    canvas.blit(&self.icon, x, y);
                }
            }
            Stage::Checkboxes => {
                for t in input.toggles.iter() {
                    let hb = t.def.hitbox;
                    let color = if t.value { CHECKBOX_ON } else { CHECKBOX_OFF };
                    canvas.fill_rect(hb.x0, hb.y0, hb.width(), hb.height(), color);
                    font::draw_text(
                        &mut canvas,
                        hb.x1 + 10,
                        hb.y0,
                        &t.def.label,
                        LABEL_COLOR,
                        self.style.text_scale,
                    );
                }
            }
        }
        Ok(canvas)
    }
}

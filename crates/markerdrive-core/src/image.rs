/// Borrowed interleaved 8-bit raster (row-major, `channels` bytes per pixel).
#[derive(Clone, Copy, Debug)]
pub struct RasterView<'a> {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub data: &'a [u8], // len = w*h*channels
}

impl<'a> RasterView<'a> {
    /// True when the buffer length matches the declared geometry.
    pub fn is_consistent(&self) -> bool {
        self.channels > 0
            && self
                .width
                .checked_mul(self.height)
                .and_then(|n| n.checked_mul(self.channels))
                == Some(self.data.len())
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> Option<&'a [u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let start = (y * self.width + x) * self.channels;
        self.data.get(start..start + self.channels)
    }
}

/// Owned interleaved 8-bit raster.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Raster {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub data: Vec<u8>,
}

impl Raster {
    /// Zero-filled raster.
    pub fn new(width: usize, height: usize, channels: usize) -> Self {
        Self {
            width,
            height,
            channels,
            data: vec![0u8; width * height * channels],
        }
    }

    /// Wrap an existing buffer, rejecting length mismatches.
    pub fn from_raw(width: usize, height: usize, channels: usize, data: Vec<u8>) -> Option<Self> {
        let raster = Self {
            width,
            height,
            channels,
            data,
        };
        raster.view().is_consistent().then_some(raster)
    }

    #[inline]
    pub fn view(&self) -> RasterView<'_> {
        RasterView {
            width: self.width,
            height: self.height,
            channels: self.channels,
            data: &self.data,
        }
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> Option<&[u8]> {
        self.view().pixel(x, y)
    }

    /// Clear this buffer and draw `src` into it, keeping the allocation when
    /// the geometry is unchanged. Returns `true` when the buffer was resized.
    pub fn redraw_from(&mut self, src: &RasterView<'_>) -> bool {
        let resized =
            self.width != src.width || self.height != src.height || self.channels != src.channels;
        self.width = src.width;
        self.height = src.height;
        self.channels = src.channels;
        self.data.clear();
        self.data.extend_from_slice(src.data);
        resized
    }
}

#[inline]
fn get_channel(src: &RasterView<'_>, x: i32, y: i32, c: usize, border: u8) -> u8 {
    if x < 0 || y < 0 || x >= src.width as i32 || y >= src.height as i32 {
        return border;
    }
    src.data[(y as usize * src.width + x as usize) * src.channels + c]
}

/// Bilinear sample of channel `c`; taps outside the raster read `border`.
#[inline]
pub fn sample_bilinear(src: &RasterView<'_>, x: f32, y: f32, c: usize, border: u8) -> f32 {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = get_channel(src, x0, y0, c, border) as f32;
    let p10 = get_channel(src, x0 + 1, y0, c, border) as f32;
    let p01 = get_channel(src, x0, y0 + 1, c, border) as f32;
    let p11 = get_channel(src, x0 + 1, y0 + 1, c, border) as f32;

    let a = p00 + fx * (p10 - p00);
    let b = p01 + fx * (p11 - p01);
    a + fy * (b - a)
}

#[inline]
pub fn sample_bilinear_u8(src: &RasterView<'_>, x: f32, y: f32, c: usize, border: u8) -> u8 {
    sample_bilinear(src, x, y, c, border).round().clamp(0.0, 255.0) as u8
}

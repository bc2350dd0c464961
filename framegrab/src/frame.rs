/// Pixel layouts a sink can ask for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// Packed RGB, 3 bytes per pixel.
    Rgb24,
    /// Planar YUV 4:2:0: full-size Y, then quarter-size U and V.
    Yuv420p,
}

impl PixelFormat {
    pub const fn plane_count(self) -> usize {
        match self {
            PixelFormat::Rgb24 => 1,
            PixelFormat::Yuv420p => 3,
        }
    }

    /// Significant bytes per row and number of rows of `plane` for a
    /// `width` x `height` image.
    pub const fn plane_size(self, plane: usize, width: usize, height: usize) -> (usize, usize) {
        match (self, plane) {
            (PixelFormat::Rgb24, _) => (width * 3, height),
            (PixelFormat::Yuv420p, 0) => (width, height),
            (PixelFormat::Yuv420p, _) => (width.div_ceil(2), height.div_ceil(2)),
        }
    }
}

/// One plane of pixel data. `stride` may exceed the significant row width.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Plane {
    pub data: Vec<u8>,
    pub stride: usize,
}

impl Plane {
    pub fn new(data: Vec<u8>, stride: usize) -> Self {
        Self { data, stride }
    }
}

/// A converted frame, owned by whoever currently holds it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoFrame {
    pub width: usize,
    pub height: usize,
    pub format: PixelFormat,
    pub planes: Vec<Plane>,
}

impl VideoFrame {
    pub fn new(width: usize, height: usize, format: PixelFormat, planes: Vec<Plane>) -> Self {
        debug_assert_eq!(planes.len(), format.plane_count());
        Self {
            width,
            height,
            format,
            planes,
        }
    }

    /// Iterates the significant bytes of each row of `plane`, skipping stride
    /// padding.
    pub fn rows(&self, plane: usize) -> impl Iterator<Item = &[u8]> + '_ {
        let (row_bytes, rows) = self.format.plane_size(plane, self.width, self.height);
        let Plane { data, stride } = &self.planes[plane];
        data.chunks(*stride)
            .take(rows)
            .map(move |row| &row[..row_bytes])
    }

    /// Copies `plane` into a tightly packed buffer.
    pub fn packed(&self, plane: usize) -> Vec<u8> {
        let (row_bytes, rows) = self.format.plane_size(plane, self.width, self.height);
        let mut output = Vec::with_capacity(row_bytes * rows);
        for row in self.rows(plane) {
            output.extend_from_slice(row);
        }
        output
    }
}

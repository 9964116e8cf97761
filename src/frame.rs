/// Stream properties queried once when a source is opened.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl VideoInfo {
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        Self { width, height, fps }
    }

    #[inline]
    pub fn dims(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

pub struct Frame<I> {
    /// 1-based position in the stream
    pub index: u64,
    pub dims: (u32, u32),
    pub timestamp: f32, // in seconds
    pub image: I,
}

impl<I> Frame<I> {
    #[inline]
    pub fn new(index: u64, dims: (u32, u32), timestamp: f32, image: I) -> Self {
        Self {
            index,
            dims,
            timestamp,
            image,
        }
    }
}

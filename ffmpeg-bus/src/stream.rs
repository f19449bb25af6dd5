use ffmpeg_next::{Rational, codec::Parameters, format::stream};

unsafe impl Send for AvStream {}
unsafe impl Sync for AvStream {}

/// Owned snapshot of an input stream's codec parameters and timing.
pub struct AvStream {
    index: usize,
    parameters: Parameters,
    time_base: Rational,
    rate: Rational,
    /// Container-declared frame count, 0 when unknown.
    frames: i64,
    /// In `time_base` units, negative when unknown.
    duration: i64,
}

impl AvStream {
    pub fn index(&self) -> usize {
        self.index
    }
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }
    pub fn time_base(&self) -> Rational {
        self.time_base
    }

    pub fn is_video(&self) -> bool {
        self.parameters.medium() == ffmpeg_next::media::Type::Video
    }

    pub fn width(&self) -> u32 {
        unsafe {
            let ptr = self.parameters.as_ptr() as *const ffmpeg_next::ffi::AVCodecParameters;
            (*ptr).width.max(0) as u32
        }
    }

    pub fn height(&self) -> u32 {
        unsafe {
            let ptr = self.parameters.as_ptr() as *const ffmpeg_next::ffi::AVCodecParameters;
            (*ptr).height.max(0) as u32
        }
    }

    pub fn fps(&self) -> f64 {
        if self.rate.denominator() == 0 {
            return 0.0;
        }
        self.rate.numerator() as f64 / self.rate.denominator() as f64
    }

    pub fn duration_sec(&self) -> Option<f64> {
        if self.duration <= 0 || self.time_base.denominator() == 0 {
            return None;
        }
        Some(self.duration as f64 * self.time_base.numerator() as f64 / self.time_base.denominator() as f64)
    }

    /// Declared frame count, else duration times frame rate.
    pub fn frame_count(&self) -> Option<u64> {
        if self.frames > 0 {
            return Some(self.frames as u64);
        }
        let estimate = self.duration_sec()? * self.fps();
        (estimate >= 1.0).then(|| estimate.round() as u64)
    }
}

impl From<stream::Stream<'_>> for AvStream {
    fn from(stream: stream::Stream<'_>) -> Self {
        Self {
            index: stream.index(),
            parameters: stream.parameters(),
            time_base: stream.time_base(),
            rate: stream.avg_frame_rate(),
            frames: stream.frames(),
            duration: stream.duration(),
        }
    }
}

impl Clone for AvStream {
    fn clone(&self) -> Self {
        Self {
            index: self.index,
            parameters: self.parameters.clone(),
            time_base: self.time_base,
            rate: self.rate,
            frames: self.frames,
            duration: self.duration,
        }
    }
}

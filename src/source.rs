use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::debug;

use crate::detection::Detection;
use crate::error::Error;
use crate::frame::{Frame, VideoInfo};

/// Ordered supply of frames. `Ok(None)` marks the end of the stream.
pub trait FrameSource {
    type Image;

    fn info(&self) -> VideoInfo;
    fn next_frame(&mut self) -> Result<Option<Frame<Self::Image>>, Error>;
}

/// Produces raw, unfiltered detections for a frame.
pub trait Detector<I> {
    fn detect(&mut self, frame: &Frame<I>) -> Result<Vec<Detection>, Error>;
}

/// Reader for per-frame detection dumps.
///
/// One line per frame: `<timestamp ms>: <json array of detections>`.
pub struct DetectionLog<R> {
    lines: std::io::Lines<R>,
    line_no: usize,
}

impl DetectionLog<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            Error::SourceUnavailable(format!("{}: {}", path.display(), e))
        })?;

        debug!("reading detections from {}", path.display());
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> DetectionLog<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
        }
    }

    /// Next `(timestamp seconds, detections)` entry, `None` once exhausted.
    pub fn next_entry(&mut self) -> Result<Option<(f32, Vec<Detection>)>, Error> {
        loop {
            let line = match self.lines.next() {
                Some(line) => line?,
                None => return Ok(None),
            };
            self.line_no += 1;

            if line.trim().is_empty() {
                continue;
            }

            return self.parse(&line).map(Some);
        }
    }

    fn parse(&self, line: &str) -> Result<(f32, Vec<Detection>), Error> {
        let format_error = |reason: String| Error::DetectionFormat {
            line: self.line_no,
            reason,
        };

        let idx = line
            .find(':')
            .ok_or_else(|| format_error("expected `:`".to_string()))?;
        let (ts, vector) = line.split_at(idx);

        let ts: u64 = ts
            .trim()
            .parse()
            .map_err(|e| format_error(format!("parse timestamp failed: {}", e)))?;
        let dets: Vec<Detection> = serde_json::from_str(vector[1..].trim())
            .map_err(|e| format_error(format!("parse json failed: {}", e)))?;

        Ok((ts as f32 / 1000.0, dets))
    }
}

/// Reads the log in step with the frames it is asked about. Running out of
/// entries ends the stream.
impl<R: BufRead, I> Detector<I> for DetectionLog<R> {
    fn detect(&mut self, _frame: &Frame<I>) -> Result<Vec<Detection>, Error> {
        match self.next_entry()? {
            Some((_, dets)) => Ok(dets),
            None => Err(Error::EndOfStream),
        }
    }
}

/// Frames synthesised from a detection log, for runs without video decoding.
/// Each frame carries its logged detections as the image payload.
pub struct ReplaySource<R> {
    log: DetectionLog<R>,
    info: VideoInfo,
    index: u64,
}

impl<R: BufRead> ReplaySource<R> {
    pub fn new(log: DetectionLog<R>, info: VideoInfo) -> Self {
        Self {
            log,
            info,
            index: 0,
        }
    }
}

impl<R: BufRead> FrameSource for ReplaySource<R> {
    type Image = Vec<Detection>;

    fn info(&self) -> VideoInfo {
        self.info
    }

    fn next_frame(&mut self) -> Result<Option<Frame<Self::Image>>, Error> {
        let Some((timestamp, dets)) = self.log.next_entry()? else {
            return Ok(None);
        };

        self.index += 1;
        Ok(Some(Frame::new(self.index, self.info.dims(), timestamp, dets)))
    }
}

/// Detector for replayed frames: hands back the logged detections.
#[derive(Debug, Default, Clone, Copy)]
pub struct Replayed;

impl Detector<Vec<Detection>> for Replayed {
    fn detect(&mut self, frame: &Frame<Vec<Detection>>) -> Result<Vec<Detection>, Error> {
        Ok(frame.image.clone())
    }
}

//! OpenCV-backed capture, annotation, video output and display.

use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use opencv::{
    core::{self, Mat},
    highgui, imgproc,
    prelude::*,
    videoio,
};

use crate::config::Config;
use crate::error::Error;
use crate::frame::{Frame, VideoInfo};
use crate::monitor::{Flow, FrameSink, FrameView};
use crate::source::FrameSource;

const WINDOW_NAME: &str = "Traffic Monitoring";

/// Frames from a video file or camera, downscaled to at most `resize_width`.
pub struct VideoSource {
    cap: videoio::VideoCapture,
    info: VideoInfo,
    resize_width: i32,
    index: u64,
}

impl VideoSource {
    pub fn open(config: &Config) -> Result<Self, Error> {
        let unavailable = |_| Error::SourceUnavailable(config.source.clone());

        let cap = if config.is_webcam() {
            videoio::VideoCapture::new(0, videoio::CAP_ANY).map_err(unavailable)?
        } else {
            videoio::VideoCapture::from_file(&config.source, videoio::CAP_ANY)
                .map_err(unavailable)?
        };

        if !cap.is_opened()? {
            return Err(Error::SourceUnavailable(config.source.clone()));
        }

        let width = cap.get(videoio::CAP_PROP_FRAME_WIDTH)? as i32;
        let height = cap.get(videoio::CAP_PROP_FRAME_HEIGHT)? as i32;
        let fps = if config.is_webcam() {
            config.webcam_fps
        } else {
            cap.get(videoio::CAP_PROP_FPS)? as u32
        };
        let total = cap.get(videoio::CAP_PROP_FRAME_COUNT)? as i64;

        let resize_width = config.resize_width as i32;
        let (width, height) = scaled_size(width, height, resize_width);
        info!(
            "video {}: {}x{} @ {} fps, {} frames",
            config.source, width, height, fps, total
        );

        Ok(Self {
            cap,
            info: VideoInfo::new(width as u32, height as u32, fps),
            resize_width,
            index: 0,
        })
    }
}

/// Size after fitting `width` into `max_width`, aspect ratio kept.
fn scaled_size(width: i32, height: i32, max_width: i32) -> (i32, i32) {
    if width <= max_width || width == 0 {
        return (width, height);
    }

    let ratio = max_width as f64 / width as f64;
    (max_width, (height as f64 * ratio) as i32)
}

impl FrameSource for VideoSource {
    type Image = Mat;

    fn info(&self) -> VideoInfo {
        self.info
    }

    fn next_frame(&mut self) -> Result<Option<Frame<Mat>>, Error> {
        let mut mat = Mat::default();

        let grabbed = self.cap.read(&mut mat).unwrap_or_else(|e| {
            warn!("frame read failed: {}", e);
            false
        });

        if !grabbed || mat.cols() == 0 || mat.rows() == 0 {
            debug!("end of video or cannot read frame");
            return Ok(None);
        }

        let (w, h) = scaled_size(mat.cols(), mat.rows(), self.resize_width);
        let image = if w != mat.cols() {
            let mut resized = Mat::default();
            imgproc::resize(
                &mat,
                &mut resized,
                core::Size::new(w, h),
                0.0,
                0.0,
                imgproc::INTER_LINEAR,
            )?;
            resized
        } else {
            mat
        };

        let timestamp = (self.cap.get(videoio::CAP_PROP_POS_MSEC)? / 1000.0) as f32;
        self.index += 1;

        Ok(Some(Frame::new(
            self.index,
            (w as u32, h as u32),
            timestamp,
            image,
        )))
    }
}

/// Draws boxes, identity/speed labels and per-class counts.
#[derive(Debug, Clone)]
pub struct Annotator {
    box_color: core::Scalar,
    text_color: core::Scalar,
    stats_color: core::Scalar,
}

impl Default for Annotator {
    fn default() -> Self {
        Self {
            box_color: core::Scalar::new(0.0, 255.0, 255.0, 0.0),
            text_color: core::Scalar::new(255.0, 255.0, 255.0, 0.0),
            stats_color: core::Scalar::new(0.0, 255.0, 0.0, 0.0),
        }
    }
}

impl Annotator {
    pub fn annotate(&self, frame: &Mat, view: &FrameView<'_>) -> opencv::Result<Mat> {
        let mut canvas = frame.try_clone()?;

        for item in view.tracked {
            let b = item.detection.ltrb();
            let rect = core::Rect::new(
                b.left() as i32,
                b.top() as i32,
                b.width() as i32,
                b.height() as i32,
            );

            imgproc::rectangle(&mut canvas, rect, self.box_color, 2, imgproc::LINE_8, 0)?;
            imgproc::put_text(
                &mut canvas,
                &view.label(item),
                core::Point::new(rect.x, (rect.y - 6).max(12)),
                imgproc::FONT_HERSHEY_SIMPLEX,
                0.5,
                self.text_color,
                1,
                imgproc::LINE_AA,
                false,
            )?;
        }

        let mut y_offset = 30;
        for line in view.count_lines() {
            imgproc::put_text(
                &mut canvas,
                &line,
                core::Point::new(10, y_offset),
                imgproc::FONT_HERSHEY_SIMPLEX,
                0.7,
                self.stats_color,
                2,
                imgproc::LINE_8,
                false,
            )?;
            y_offset += 30;
        }

        Ok(canvas)
    }
}

/// mp4v writer opened lazily with the size of the first frame fed to it.
pub struct VideoWriter {
    writer: Option<videoio::VideoWriter>,
    size: Option<(i32, i32)>,
    fps: f64,
    out_file: PathBuf,
}

impl VideoWriter {
    pub fn new<P: AsRef<Path>>(out_file: P, fps: u32) -> Self {
        Self {
            writer: None,
            size: None,
            fps: f64::from(fps),
            out_file: out_file.as_ref().to_path_buf(),
        }
    }

    pub fn release(&mut self) -> Result<(), Error> {
        if let Some(mut w) = self.writer.take() {
            w.release()?;
            info!("Output video saved to: {}", self.out_file.display());
        }

        Ok(())
    }

    fn reinit(&mut self, size: (i32, i32)) -> Result<(), Error> {
        debug!("initializing video writer {:?}", size);
        self.release()?;

        let path = self.out_file.to_string_lossy();
        let writer = videoio::VideoWriter::new(
            &path,
            videoio::VideoWriter::fourcc('m', 'p', '4', 'v')?,
            self.fps,
            core::Size::new(size.0, size.1),
            true,
        )?;

        self.size = Some(size);
        self.writer = Some(writer);

        Ok(())
    }

    pub fn feed(&mut self, m: &Mat) -> Result<(), Error> {
        let size = (m.cols(), m.rows());

        if self.writer.is_none() || self.size != Some(size) {
            self.reinit(size)?;
        }

        if let Some(writer) = self.writer.as_mut() {
            if writer.is_opened()? {
                writer.write(m)?;
            }
        }

        Ok(())
    }
}

/// Annotates every frame, writes it out and optionally shows it. Pressing
/// `q` in the window stops the run.
pub struct VideoSink {
    annotator: Annotator,
    writer: Option<VideoWriter>,
    display: bool,
}

impl VideoSink {
    pub fn new(annotator: Annotator, writer: Option<VideoWriter>, display: bool) -> Self {
        Self {
            annotator,
            writer,
            display,
        }
    }

    /// Webcam runs are not recorded.
    pub fn from_config(config: &Config, info: VideoInfo) -> Self {
        let writer = if config.is_webcam() {
            None
        } else {
            Some(VideoWriter::new(&config.output_video, info.fps))
        };

        Self::new(Annotator::default(), writer, !config.headless)
    }

    fn show(&self, image: &Mat) -> opencv::Result<Flow> {
        highgui::imshow(WINDOW_NAME, image)?;

        let key = highgui::wait_key(1)?;
        if key & 0xFF == 'q' as i32 {
            return Ok(Flow::Stop);
        }

        Ok(Flow::Continue)
    }
}

impl FrameSink<Mat> for VideoSink {
    fn consume(&mut self, frame: &Frame<Mat>, view: &FrameView<'_>) -> Result<Flow, Error> {
        let annotated = self.annotator.annotate(&frame.image, view)?;

        if let Some(writer) = self.writer.as_mut() {
            writer.feed(&annotated)?;
        }

        if !self.display {
            return Ok(Flow::Continue);
        }

        self.show(&annotated)
            .map_err(|e| Error::RenderFailure(format!("display: {}", e)))
    }

    fn finish(&mut self) -> Result<(), Error> {
        if let Some(writer) = self.writer.as_mut() {
            writer.release()?;
        }

        if self.display {
            if let Err(e) = highgui::destroy_all_windows() {
                warn!("closing display: {}", e);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::scaled_size;

    #[test]
    fn downscales_wide_frames_only() {
        assert_eq!(scaled_size(1920, 1080, 1280), (1280, 720));
        assert_eq!(scaled_size(1280, 720, 1280), (1280, 720));
        assert_eq!(scaled_size(640, 480, 1280), (640, 480));
    }
}

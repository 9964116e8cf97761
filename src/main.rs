use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use speedtrack::{
    Config, DetectionLog, Monitor, NullSink, ReplaySource, Replayed, Summary, VideoInfo,
};

const DEFAULT_REPLAY_FPS: u32 = 30;

#[derive(Parser, Debug)]
#[command(name = "speedtrack", about = "Traffic monitoring: vehicle counts and speeds")]
struct Args {
    /// Path to video file or '0' for webcam
    #[arg(long, default_value = "traffic.mp4")]
    source: String,
    /// Run without display window
    #[arg(long)]
    headless: bool,
    /// Per-frame detection log; defaults to the source path with a `.dets` extension
    #[arg(long, value_name = "PATH")]
    detections: Option<PathBuf>,
    /// Replay the detection log without decoding video
    #[arg(long)]
    replay: bool,
    /// Frame rate assumed when replaying
    #[arg(long, default_value_t = DEFAULT_REPLAY_FPS)]
    fps: u32,
    /// Frame size assumed when replaying, WIDTHxHEIGHT
    #[arg(long, value_parser = parse_size, default_value = "1280x720")]
    frame_size: (u32, u32),
    /// Meters per pixel
    #[arg(long, default_value_t = 0.05)]
    calibration: f64,
    #[arg(long, default_value_t = 0.3)]
    confidence: f32,
    #[arg(long, default_value_t = 0.3)]
    iou_threshold: f32,
    /// Frames a lost track is kept before its identity is retired
    #[arg(long, default_value_t = 30)]
    max_age: u32,
    #[arg(long, default_value_t = 1280)]
    resize_width: u32,
    #[arg(long, default_value = "output.mp4")]
    output_video: PathBuf,
    #[arg(long, default_value = "tracked_vehicles.csv")]
    report: PathBuf,
}

impl Args {
    fn config(&self) -> Config {
        Config {
            source: self.source.clone(),
            headless: self.headless,
            meters_per_pixel: self.calibration,
            confidence_threshold: self.confidence,
            iou_threshold: self.iou_threshold,
            max_age: self.max_age,
            resize_width: self.resize_width,
            output_video: self.output_video.clone(),
            report: self.report.clone(),
            ..Config::default()
        }
    }

    fn detections_path(&self) -> PathBuf {
        self.detections
            .clone()
            .unwrap_or_else(|| Path::new(&self.source).with_extension("dets"))
    }
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got `{}`", s))?;

    let w = w.trim().parse::<u32>().map_err(|e| e.to_string())?;
    let h = h.trim().parse::<u32>().map_err(|e| e.to_string())?;

    Ok((w, h))
}

fn replay(args: &Args, config: &Config, detections: &Path) -> Result<Summary> {
    let (width, height) = args.frame_size;
    let info = VideoInfo::new(width, height, args.fps);

    let log = DetectionLog::open(detections)?;
    let mut source = ReplaySource::new(log, info);
    let monitor = Monitor::from_config(info, config)?;

    Ok(monitor.run(&mut source, &mut Replayed, &mut NullSink)?)
}

#[cfg(feature = "video")]
fn run(args: &Args, config: &Config, detections: &Path) -> Result<Summary> {
    use speedtrack::video::{VideoSink, VideoSource};
    use speedtrack::FrameSource;

    if args.replay {
        return replay(args, config, detections);
    }

    let mut source = VideoSource::open(config)
        .with_context(|| format!("Could not open video source {}", config.source))?;
    let info = source.info();

    let mut detector = DetectionLog::open(detections)?;
    let mut sink = VideoSink::from_config(config, info);
    let monitor = Monitor::from_config(info, config)?;

    Ok(monitor.run(&mut source, &mut detector, &mut sink)?)
}

#[cfg(not(feature = "video"))]
fn run(args: &Args, config: &Config, detections: &Path) -> Result<Summary> {
    if !args.replay {
        info!("built without video support, replaying detections");
    }

    replay(args, config, detections)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args.config();
    config.validate()?;

    let detections = args.detections_path();
    info!(
        "source {}, detections {}",
        config.source,
        detections.display()
    );

    let summary = run(&args, &config, &detections)?;
    info!("Processing finished");

    summary
        .write_csv_file(&config.report)
        .with_context(|| format!("writing {}", config.report.display()))?;

    summary.log();
    info!("Tracking data exported to: {}", config.report.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_frame_size() {
        assert_eq!(parse_size("1280x720"), Ok((1280, 720)));
        assert_eq!(parse_size("640X480"), Ok((640, 480)));
        assert!(parse_size("640").is_err());
        assert!(parse_size("ax480").is_err());
    }

    #[test]
    fn detections_default_next_to_source() {
        let args = Args::parse_from(["speedtrack", "--source", "clips/road.mp4"]);
        assert_eq!(args.detections_path(), PathBuf::from("clips/road.dets"));
        assert_eq!(args.config().meters_per_pixel, 0.05);
        assert!(!args.config().headless);
    }
}

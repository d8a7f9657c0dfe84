use std::path::PathBuf;

use image::{GrayImage, Rgb, RgbImage};
use tracing::debug;
use v4l::buffer::Type;
use v4l::capability::{Capabilities, Flags as CapabilityFlags};
use v4l::format::{Format, FourCC};
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;

use crate::errors::{AppError, AppResult};

/// A decoded RGB video frame or still image.
pub type Frame = RgbImage;

/// Yields frames one at a time. `next_frame` may block until a frame is ready;
/// an `Err` is a capture failure.
pub trait FrameSource {
    fn next_frame(&mut self) -> AppResult<Frame>;

    fn describe(&self) -> String {
        "frame source".to_string()
    }
}

impl<F: FrameSource + ?Sized> FrameSource for Box<F> {
    fn next_frame(&mut self) -> AppResult<Frame> {
        (**self).next_frame()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

#[derive(Debug, Clone)]
pub enum DeviceLocator {
    Index(u32),
    Path(PathBuf),
}

impl DeviceLocator {
    pub fn from_option(device: Option<String>) -> Self {
        match device {
            Some(text) => {
                if let Ok(index) = text.parse::<u32>() {
                    DeviceLocator::Index(index)
                } else {
                    DeviceLocator::Path(PathBuf::from(text))
                }
            }
            None => DeviceLocator::Index(0),
        }
    }

    pub fn display(&self) -> String {
        match self {
            DeviceLocator::Index(i) => format!("/dev/video{i}"),
            DeviceLocator::Path(path) => path.display().to_string(),
        }
    }

    fn open(&self) -> Result<v4l::Device, AppError> {
        match self {
            DeviceLocator::Index(index) => {
                v4l::Device::new((*index) as usize).map_err(|err| AppError::DeviceOpen {
                    device: self.display(),
                    source: err,
                })
            }
            DeviceLocator::Path(path) => {
                v4l::Device::with_path(path).map_err(|err| AppError::DeviceOpen {
                    device: self.display(),
                    source: err,
                })
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub device: DeviceLocator,
    pub pixel_format: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub warmup_frames: u32,
}

/// Grabs one grayscale frame from a V4L2 device.
pub fn capture_frame(config: &CaptureConfig) -> AppResult<GrayImage> {
    let device = config.device.open()?;
    debug!(device = %config.device.display(), "opened capture device");

    let caps = device.query_caps()?;
    ensure_capabilities(&caps)?;

    let requested_fourcc = parse_fourcc(&config.pixel_format)?;
    ensure_format_supported(&device, requested_fourcc)?;

    let mut format = device.format()?;
    format.fourcc = requested_fourcc;
    if let Some(width) = config.width {
        format.width = width;
    }
    if let Some(height) = config.height {
        format.height = height;
    }
    let format = device.set_format(&format)?;
    debug!(
        pixel_format = %fourcc_to_string(format.fourcc),
        width = format.width,
        height = format.height,
        "negotiated format"
    );

    let mut stream = Stream::with_buffers(&device, Type::VideoCapture, 4)?;
    for idx in 0..config.warmup_frames {
        stream.next().map_err(|err| {
            AppError::FrameProcessing(format!(
                "failed to read warm-up frame {}: {}",
                idx + 1,
                err
            ))
        })?;
    }

    let (data, _) = stream.next()?;
    convert_frame_to_image(data, &format)
}

/// Live camera source; each call performs a full device capture.
#[derive(Debug, Clone)]
pub struct V4lFrameSource {
    config: CaptureConfig,
}

impl V4lFrameSource {
    pub fn new(config: CaptureConfig) -> Self {
        Self { config }
    }
}

impl FrameSource for V4lFrameSource {
    fn next_frame(&mut self) -> AppResult<Frame> {
        let gray = capture_frame(&self.config)?;
        Ok(gray_to_rgb(&gray))
    }

    fn describe(&self) -> String {
        self.config.device.display()
    }
}

/// Yields a single still image, then reports exhaustion.
#[derive(Debug, Clone)]
pub struct ImageFileSource {
    path: PathBuf,
    consumed: bool,
}

impl ImageFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            consumed: false,
        }
    }
}

impl FrameSource for ImageFileSource {
    fn next_frame(&mut self) -> AppResult<Frame> {
        if self.consumed {
            return Err(AppError::FrameSourceExhausted);
        }
        self.consumed = true;

        if !self.path.exists() {
            return Err(AppError::MissingInput {
                path: self.path.clone(),
            });
        }
        let image = image::open(&self.path).map_err(|source| AppError::ImageDecode {
            path: self.path.clone(),
            source,
        })?;
        let rgb = image.to_rgb8();
        debug!(
            path = %self.path.display(),
            width = rgb.width(),
            height = rgb.height(),
            "loaded still image"
        );
        Ok(rgb)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

fn ensure_capabilities(caps: &Capabilities) -> AppResult<()> {
    let flags = caps.capabilities;
    let mut reasons = Vec::new();
    if !flags.contains(CapabilityFlags::VIDEO_CAPTURE) {
        reasons.push("missing VIDEO_CAPTURE".to_string());
    }
    if !flags.intersects(CapabilityFlags::READ_WRITE | CapabilityFlags::STREAMING) {
        reasons.push("missing READ_WRITE or STREAMING".to_string());
    }
    if reasons.is_empty() {
        Ok(())
    } else {
        Err(AppError::Capability(reasons.join(", ")))
    }
}

fn ensure_format_supported(device: &v4l::Device, requested: FourCC) -> AppResult<()> {
    let formats = device.enum_formats()?;
    if formats.iter().any(|format| format.fourcc == requested) {
        Ok(())
    } else {
        Err(AppError::UnsupportedFormat(fourcc_to_string(requested)))
    }
}

fn parse_fourcc(text: &str) -> AppResult<FourCC> {
    let bytes = text.as_bytes();
    if bytes.is_empty() || bytes.len() > 4 {
        return Err(AppError::UnsupportedFormat(text.to_string()));
    }
    let mut code = [b' '; 4];
    code[..bytes.len()].copy_from_slice(bytes);
    Ok(FourCC::new(&code))
}

fn fourcc_to_string(fourcc: FourCC) -> String {
    fourcc
        .str()
        .map(|s| s.trim_end().to_string())
        .unwrap_or_else(|_| format!("{:?}", fourcc.repr))
}

pub fn convert_frame_to_image(data: &[u8], format: &Format) -> AppResult<GrayImage> {
    let width = format.width as usize;
    let height = format.height as usize;
    let expected_pixels = width * height;
    let pixel_format = fourcc_to_string(format.fourcc);

    match pixel_format.as_str() {
        "Y16" => {
            if data.len() < expected_pixels * 2 {
                return Err(AppError::FrameProcessing(format!(
                    "expected {} bytes for Y16 frame, got {}",
                    expected_pixels * 2,
                    data.len()
                )));
            }
            let buffer = data[..expected_pixels * 2]
                .chunks_exact(2)
                .map(|pair| pair[1])
                .collect();
            GrayImage::from_vec(format.width, format.height, buffer)
                .ok_or_else(|| AppError::FrameProcessing("failed to build image buffer".into()))
        }
        "GREY" | "Y08" => {
            if data.len() < expected_pixels {
                return Err(AppError::FrameProcessing(format!(
                    "expected {} bytes for {} frame, got {}",
                    expected_pixels,
                    pixel_format,
                    data.len()
                )));
            }
            GrayImage::from_vec(
                format.width,
                format.height,
                data[..expected_pixels].to_vec(),
            )
            .ok_or_else(|| AppError::FrameProcessing("failed to build image buffer".into()))
        }
        "YUYV" => {
            let expected_bytes = expected_pixels * 2;
            if data.len() < expected_bytes {
                return Err(AppError::FrameProcessing(format!(
                    "expected {} bytes for YUYV frame, got {}",
                    expected_bytes,
                    data.len()
                )));
            }
            // Luma bytes sit at even offsets.
            let buffer = data[..expected_bytes].iter().step_by(2).copied().collect();
            GrayImage::from_vec(format.width, format.height, buffer)
                .ok_or_else(|| AppError::FrameProcessing("failed to build image buffer".into()))
        }
        other => Err(AppError::FrameProcessing(format!(
            "unsupported conversion from pixel format {other}"
        ))),
    }
}

pub fn gray_to_rgb(image: &GrayImage) -> RgbImage {
    let mut rgb = RgbImage::new(image.width(), image.height());
    for (x, y, pixel) in rgb.enumerate_pixels_mut() {
        let v = image.get_pixel(x, y)[0];
        *pixel = Rgb([v, v, v]);
    }
    rgb
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn format(fourcc: &[u8; 4], width: u32, height: u32) -> Format {
        Format::new(width, height, FourCC::new(fourcc))
    }

    #[test]
    fn y16_keeps_high_byte() {
        let data = [0x10, 0xAB, 0xFF, 0x01];
        let image = convert_frame_to_image(&data, &format(b"Y16 ", 2, 1)).unwrap();
        assert_eq!(image.as_raw(), &vec![0xAB, 0x01]);
    }

    #[test]
    fn yuyv_extracts_luma() {
        let data = [10, 128, 20, 128, 30, 128, 40, 128];
        let image = convert_frame_to_image(&data, &format(b"YUYV", 4, 1)).unwrap();
        assert_eq!(image.as_raw(), &vec![10, 20, 30, 40]);
    }

    #[test]
    fn short_grey_frame_is_rejected() {
        let err = convert_frame_to_image(&[1, 2, 3], &format(b"GREY", 2, 2)).unwrap_err();
        assert!(matches!(err, AppError::FrameProcessing(_)));
    }

    #[test]
    fn unknown_pixel_format_is_rejected() {
        let err = convert_frame_to_image(&[0; 16], &format(b"MJPG", 2, 2)).unwrap_err();
        assert!(matches!(err, AppError::FrameProcessing(msg) if msg.contains("MJPG")));
    }

    #[test]
    fn gray_to_rgb_replicates_channels() {
        let gray = GrayImage::from_vec(1, 1, vec![42]).unwrap();
        let rgb = gray_to_rgb(&gray);
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([42, 42, 42]));
    }

    #[test]
    fn device_locator_parses_index_or_path() {
        assert!(matches!(
            DeviceLocator::from_option(Some("2".into())),
            DeviceLocator::Index(2)
        ));
        assert_eq!(
            DeviceLocator::from_option(Some("/dev/video7".into())).display(),
            "/dev/video7"
        );
        assert_eq!(DeviceLocator::from_option(None).display(), "/dev/video0");
    }

    #[test]
    fn parse_fourcc_pads_short_codes() {
        assert_eq!(parse_fourcc("Y16").unwrap(), FourCC::new(b"Y16 "));
        assert!(parse_fourcc("TOOLONG").is_err());
    }

    #[test]
    fn image_file_source_yields_once() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("face.png");
        RgbImage::new(3, 2).save(&path).unwrap();

        let mut source = ImageFileSource::new(&path);
        let frame = source.next_frame().unwrap();
        assert_eq!((frame.width(), frame.height()), (3, 2));
        assert!(matches!(
            source.next_frame(),
            Err(AppError::FrameSourceExhausted)
        ));
    }

    #[test]
    fn image_file_source_reports_missing_file() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("absent.png");
        let err = ImageFileSource::new(&missing).next_frame().unwrap_err();
        assert!(matches!(err, AppError::MissingInput { path } if path == missing));
    }
}

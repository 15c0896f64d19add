//! Webcam-backed depth device
//!
//! Captures frames on a background thread with nokhwa and hands the latest
//! one to the frame loop. Webcams have no depth channel, so the luminance of
//! the color image stands in for the depth visualization.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbaImage};
use nokhwa::pixel_format::RgbAFormat;
use nokhwa::utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType, Resolution};
use nokhwa::Camera;
use parking_lot::Mutex;

use super::{clamp_tilt, DepthDevice, DeviceError};
use crate::grid::{LOGICAL_HEIGHT, LOGICAL_WIDTH};

/// Raw frame handed over by the capture thread
#[derive(Clone)]
struct CapturedFrame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    frame_number: u64,
}

/// Information about an available camera
#[derive(Clone, Debug)]
pub struct CameraInfo {
    pub index: u32,
    pub name: String,
}

type FrameSlots = [Arc<Mutex<Option<CapturedFrame>>>; 3];

/// Outcome of opening the stream, sent once by the capture thread
type OpenResult = Result<(), String>;

/// How long `open` waits for the capture thread to start streaming
const OPEN_TIMEOUT: Duration = Duration::from_secs(10);

/// Depth device over a regular webcam
pub struct CameraDevice {
    camera_index: u32,
    name: String,
    /// Latest captured frames, triple buffered
    frames: FrameSlots,
    latest_frame_idx: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    frame_count: Arc<AtomicU64>,
    thread_handle: Option<std::thread::JoinHandle<()>>,
    color: RgbaImage,
    depth: RgbaImage,
    last_frame_number: Option<u64>,
    frame_new: bool,
    tilt: i32,
}

impl CameraDevice {
    /// List available cameras
    pub fn list_cameras() -> Vec<CameraInfo> {
        match nokhwa::query(ApiBackend::Auto) {
            Ok(camera_list) => camera_list
                .iter()
                .enumerate()
                .map(|(idx, info)| CameraInfo {
                    index: idx as u32,
                    name: info.human_name().to_string(),
                })
                .collect(),
            Err(e) => {
                log::warn!("Failed to enumerate cameras: {:?}", e);
                Vec::new()
            }
        }
    }

    /// Device for the camera at `camera_index`; nothing is opened yet
    pub fn new(camera_index: u32) -> Self {
        Self {
            camera_index,
            name: format!("Camera {}", camera_index),
            frames: [
                Arc::new(Mutex::new(None)),
                Arc::new(Mutex::new(None)),
                Arc::new(Mutex::new(None)),
            ],
            latest_frame_idx: Arc::new(AtomicU64::new(0)),
            running: Arc::new(AtomicBool::new(false)),
            frame_count: Arc::new(AtomicU64::new(0)),
            thread_handle: None,
            color: RgbaImage::new(LOGICAL_WIDTH, LOGICAL_HEIGHT),
            depth: RgbaImage::new(LOGICAL_WIDTH, LOGICAL_HEIGHT),
            last_frame_number: None,
            frame_new: false,
            tilt: 0,
        }
    }

    /// Number of frames captured since `open`
    pub fn frame_count(&self) -> u64 {
        self.frame_count.load(Ordering::Relaxed)
    }

    fn latest_frame(&self) -> Option<CapturedFrame> {
        let idx = self.latest_frame_idx.load(Ordering::Acquire);
        let slot = (idx % 3) as usize;
        self.frames[slot].lock().clone()
    }

    fn capture_thread(
        camera_index: u32,
        frames: FrameSlots,
        latest_frame_idx: Arc<AtomicU64>,
        running: Arc<AtomicBool>,
        frame_count: Arc<AtomicU64>,
        ready: Sender<OpenResult>,
    ) {
        log::info!("Starting camera capture thread (camera {})", camera_index);

        let mut camera = match Self::open_camera(camera_index) {
            Ok(camera) => camera,
            Err(reason) => {
                running.store(false, Ordering::Release);
                let _ = ready.send(Err(reason));
                return;
            }
        };

        if let Err(e) = camera.open_stream() {
            log::error!("Failed to open camera stream: {:?}", e);
            running.store(false, Ordering::Release);
            let _ = ready.send(Err(format!("stream: {}", e)));
            return;
        }
        let _ = ready.send(Ok(()));

        log::info!(
            "Camera opened: {} ({}x{})",
            camera.info().human_name(),
            camera.resolution().width(),
            camera.resolution().height()
        );

        let mut write_idx: u64 = 0;

        while running.load(Ordering::Acquire) {
            match camera.frame() {
                Ok(frame) => match frame.decode_image::<RgbAFormat>() {
                    Ok(image) => {
                        let frame_number = frame_count.fetch_add(1, Ordering::Relaxed);
                        let captured = CapturedFrame {
                            width: frame.resolution().width(),
                            height: frame.resolution().height(),
                            data: image.into_raw(),
                            frame_number,
                        };

                        let slot = (write_idx % 3) as usize;
                        *frames[slot].lock() = Some(captured);
                        latest_frame_idx.store(write_idx, Ordering::Release);
                        write_idx = write_idx.wrapping_add(1);
                    }
                    Err(e) => {
                        log::warn!("Failed to decode frame: {:?}", e);
                    }
                },
                Err(e) => {
                    log::warn!("Failed to capture frame: {:?}", e);
                    std::thread::sleep(std::time::Duration::from_millis(10));
                }
            }
        }

        if let Err(e) = camera.stop_stream() {
            log::warn!("Failed to stop camera stream: {:?}", e);
        }
        log::info!("Camera capture thread stopped");
    }

    /// Try progressively looser format requests
    fn open_camera(camera_index: u32) -> Result<Camera, String> {
        let index = CameraIndex::Index(camera_index);
        let attempts = [
            RequestedFormatType::HighestResolution(Resolution::new(LOGICAL_WIDTH, LOGICAL_HEIGHT)),
            RequestedFormatType::AbsoluteHighestResolution,
            RequestedFormatType::None,
        ];

        for format in attempts {
            let requested = RequestedFormat::new::<RgbAFormat>(format);
            match Camera::new(index.clone(), requested) {
                Ok(camera) => return Ok(camera),
                Err(e) => log::warn!("Camera format {:?} rejected: {:?}", format, e),
            }
        }

        log::error!("Failed to open camera {} with all format attempts", camera_index);
        Err(format!("camera {} rejected every format", camera_index))
    }
}

/// Wait for the capture thread to report whether its stream started
fn await_open(ready: &Receiver<OpenResult>, timeout: Duration) -> Result<(), DeviceError> {
    match ready.recv_timeout(timeout) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(reason)) => Err(DeviceError::OpenFailed(reason)),
        Err(RecvTimeoutError::Timeout) => Err(DeviceError::OpenTimeout(timeout)),
        Err(RecvTimeoutError::Disconnected) => {
            Err(DeviceError::OpenFailed("capture thread exited".to_string()))
        }
    }
}

/// Grey-scale depth stand-in with opaque alpha, sized like `color`
pub(crate) fn luminance_depth(color: &RgbaImage) -> RgbaImage {
    let luma = imageops::grayscale(color);
    let mut depth = DynamicImage::ImageLuma8(luma).to_rgba8();
    for pixel in depth.pixels_mut() {
        pixel[3] = 255;
    }
    depth
}

/// Bring a captured frame to the device resolution
fn fit_frame(frame: CapturedFrame) -> Option<RgbaImage> {
    let image = RgbaImage::from_raw(frame.width, frame.height, frame.data)?;
    if image.width() == LOGICAL_WIDTH && image.height() == LOGICAL_HEIGHT {
        return Some(image);
    }
    Some(imageops::resize(
        &image,
        LOGICAL_WIDTH,
        LOGICAL_HEIGHT,
        FilterType::Triangle,
    ))
}

impl DepthDevice for CameraDevice {
    fn open(&mut self) -> Result<(), DeviceError> {
        if self.thread_handle.is_some() {
            return Ok(());
        }

        let cameras = Self::list_cameras();
        if cameras.is_empty() {
            return Err(DeviceError::NoDevice);
        }
        let info = cameras
            .iter()
            .find(|c| c.index == self.camera_index)
            .ok_or(DeviceError::NotFound(self.camera_index))?;
        self.name = info.name.clone();

        self.running.store(true, Ordering::Release);
        self.frame_count.store(0, Ordering::Relaxed);
        self.last_frame_number = None;

        let camera_index = self.camera_index;
        let frames = self.frames.clone();
        let latest_frame_idx = self.latest_frame_idx.clone();
        let running = self.running.clone();
        let frame_count = self.frame_count.clone();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);

        let handle = std::thread::Builder::new()
            .name("camera-capture".to_string())
            .spawn(move || {
                Self::capture_thread(
                    camera_index,
                    frames,
                    latest_frame_idx,
                    running,
                    frame_count,
                    ready_tx,
                );
            });

        let handle = match handle {
            Ok(handle) => handle,
            Err(e) => {
                self.running.store(false, Ordering::Release);
                return Err(DeviceError::Spawn(e));
            }
        };

        if let Err(e) = await_open(&ready_rx, OPEN_TIMEOUT) {
            self.running.store(false, Ordering::Release);
            // A thread stuck in the driver is left to exit on its own
            if matches!(e, DeviceError::OpenTimeout(_)) {
                log::warn!("Capture thread for camera {} detached", self.camera_index);
            } else {
                let _ = handle.join();
            }
            return Err(e);
        }

        self.thread_handle = Some(handle);
        Ok(())
    }

    fn close(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
            log::info!("Closed capture device '{}'", self.name);
        }
        for slot in &self.frames {
            *slot.lock() = None;
        }
        self.frame_new = false;
    }

    fn update(&mut self) {
        self.frame_new = false;
        if self.frame_count() == 0 {
            return;
        }

        let Some(frame) = self.latest_frame() else {
            return;
        };
        if self.last_frame_number == Some(frame.frame_number) {
            return;
        }
        self.last_frame_number = Some(frame.frame_number);

        match fit_frame(frame) {
            Some(color) => {
                self.depth = luminance_depth(&color);
                self.color = color;
                self.frame_new = true;
            }
            None => log::warn!("Captured frame has an inconsistent buffer size"),
        }
    }

    fn is_frame_new(&self) -> bool {
        self.frame_new
    }

    fn color_image(&self) -> &RgbaImage {
        &self.color
    }

    fn depth_image(&self) -> &RgbaImage {
        &self.depth
    }

    fn set_tilt_angle(&mut self, degrees: i32) {
        let tilt = clamp_tilt(degrees);
        if tilt != self.tilt {
            log::debug!("'{}' has no tilt motor, recording {} degrees", self.name, tilt);
        }
        self.tilt = tilt;
    }

    fn tilt_angle(&self) -> i32 {
        self.tilt
    }

    fn width(&self) -> u32 {
        LOGICAL_WIDTH
    }

    fn height(&self) -> u32 {
        LOGICAL_HEIGHT
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_connected(&self) -> bool {
        self.thread_handle.is_some() && self.running.load(Ordering::Acquire)
    }
}

impl Drop for CameraDevice {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_luminance_depth() {
        let mut color = RgbaImage::new(2, 1);
        color.put_pixel(0, 0, Rgba([255, 255, 255, 0]));
        color.put_pixel(1, 0, Rgba([0, 0, 0, 255]));

        let depth = luminance_depth(&color);
        assert_eq!(*depth.get_pixel(0, 0), Rgba([255, 255, 255, 255]));
        assert_eq!(*depth.get_pixel(1, 0), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_await_open_reports_thread_outcome() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        tx.send(Ok(())).unwrap();
        assert!(await_open(&rx, Duration::from_millis(10)).is_ok());

        tx.send(Err("stream: busy".to_string())).unwrap();
        assert!(matches!(
            await_open(&rx, Duration::from_millis(10)),
            Err(DeviceError::OpenFailed(reason)) if reason == "stream: busy"
        ));

        assert!(matches!(
            await_open(&rx, Duration::from_millis(10)),
            Err(DeviceError::OpenTimeout(_))
        ));

        drop(tx);
        assert!(matches!(
            await_open(&rx, Duration::from_millis(10)),
            Err(DeviceError::OpenFailed(_))
        ));
    }

    #[test]
    fn test_fit_frame_resizes() {
        let frame = CapturedFrame {
            data: vec![10; 320 * 240 * 4],
            width: 320,
            height: 240,
            frame_number: 0,
        };
        let image = fit_frame(frame).unwrap();
        assert_eq!(image.dimensions(), (LOGICAL_WIDTH, LOGICAL_HEIGHT));
        assert_eq!(image.get_pixel(100, 100)[0], 10);
    }

    #[test]
    fn test_fit_frame_rejects_short_buffer() {
        let frame = CapturedFrame {
            data: vec![0; 16],
            width: 320,
            height: 240,
            frame_number: 0,
        };
        assert!(fit_frame(frame).is_none());
    }

    #[test]
    fn test_unopened_device() {
        let mut device = CameraDevice::new(0);
        device.update();
        assert!(!device.is_frame_new());
        assert!(!device.is_connected());
        device.set_tilt_angle(-40);
        assert_eq!(device.tilt_angle(), -30);
    }
}

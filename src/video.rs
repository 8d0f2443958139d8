use std::{
    io::Read,
    process::Child,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
};

use crate::{
    compositor::Frame,
    control::FrameSource,
    env,
    error::{Result, TeleopError},
    utils,
};

#[derive(Debug, Default)]
struct SlotInner {
    latest: Mutex<Option<Frame>>,
    halted: AtomicBool,
}

/// Single-slot hand-off between a decoder thread and the control loop. A
/// new frame replaces any frame not yet taken; nothing queues up.
#[derive(Debug, Clone, Default)]
pub struct FrameSlot {
    inner: Arc<SlotInner>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, frame: Frame) {
        let mut g = match self.inner.latest.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        *g = Some(frame);
    }

    pub fn take_latest(&self) -> Option<Frame> {
        match self.inner.latest.lock() {
            Ok(mut g) => g.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    pub fn halt(&self) {
        self.inner.halted.store(true, Ordering::Release);
    }

    pub fn is_halted(&self) -> bool {
        self.inner.halted.load(Ordering::Acquire)
    }
}

impl FrameSource for FrameSlot {
    fn latest_frame(&mut self) -> Option<Frame> {
        self.take_latest()
    }

    fn is_halted(&self) -> bool {
        FrameSlot::is_halted(self)
    }
}

/// Reads packed `bgr24` frames from `src` into `slot` until the stream
/// ends, then halts the slot. Returns the number of frames published.
pub fn pump_frames<R: Read>(mut src: R, width: u32, height: u32, slot: &FrameSlot) -> u64 {
    let method_name = "pump_frames";
    let frame_len = (width * height * 3) as usize;
    let mut count = 0;
    loop {
        let mut buff = vec![0u8; frame_len];
        if let Err(e) = src.read_exact(&mut buff) {
            tracing::warn!(method_name, count, "video stream ended: {}", e);
            break;
        }
        match Frame::from_bgr(width, height, buff) {
            Some(frame) => {
                slot.publish(frame);
                count += 1;
            }
            None => break,
        }
    }
    slot.halt();
    count
}

/// Decodes the drone's video through an external ffmpeg process.
#[derive(Debug)]
pub struct FfmpegDecoder {
    program: String,
    args: Vec<String>,
    width: u32,
    height: u32,
    slot: FrameSlot,
    child: Option<Child>,
    reader: Option<JoinHandle<u64>>,
}

impl FfmpegDecoder {
    pub fn new(width: u32, height: u32) -> Self {
        let source = format!("udp://0.0.0.0:{}", *env::ENV_TELLO_VIDEO_PORT);
        Self::with_command(
            env::ENV_TELLO_FFMPEG.clone(),
            utils::decoder_args(&source, width, height),
            width,
            height,
        )
    }

    pub fn with_command(program: String, args: Vec<String>, width: u32, height: u32) -> Self {
        Self {
            program,
            args,
            width,
            height,
            slot: FrameSlot::new(),
            child: None,
            reader: None,
        }
    }
}

impl FrameSource for FfmpegDecoder {
    fn start(&mut self) -> Result<()> {
        if self.child.is_some() {
            return Ok(());
        }
        let mut child = utils::start_decoder(&self.program, &self.args)?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TeleopError::Decoder("decoder stdout unavailable".to_owned()))?;
        let slot = self.slot.clone();
        let (w, h) = (self.width, self.height);
        let reader = thread::Builder::new()
            .name("video-decoder".to_owned())
            .spawn(move || pump_frames(stdout, w, h, &slot))?;
        self.child = Some(child);
        self.reader = Some(reader);
        Ok(())
    }

    fn latest_frame(&mut self) -> Option<Frame> {
        self.slot.take_latest()
    }

    fn is_halted(&self) -> bool {
        self.slot.is_halted()
    }
}

impl Drop for FfmpegDecoder {
    fn drop(&mut self) {
        let method_name = "decoder_drop";
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        if let Some(reader) = self.reader.take() {
            if let Ok(count) = reader.join() {
                tracing::debug!(method_name, count, "decoder finished");
            }
        }
    }
}

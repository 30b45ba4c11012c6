use crate::models::format::DeviceFormat;

/// Source of rendered audio for playback chunks.
///
/// Called on the mixer thread with the device lock held. `buffer` holds
/// exactly `frames` interleaved frames in `format`. Keep it real-time safe.
pub trait AudioMixer: Send {
    fn mix(&mut self, buffer: &mut [u8], frames: usize, format: &DeviceFormat);
}

/// Renders silence. Installed on every device until a mixer is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilenceMixer;

impl AudioMixer for SilenceMixer {
    fn mix(&mut self, buffer: &mut [u8], _frames: usize, format: &DeviceFormat) {
        format.sample_type.fill_silence(buffer);
    }
}

impl<F> AudioMixer for F
where
    F: FnMut(&mut [u8], usize, &DeviceFormat) + Send,
{
    fn mix(&mut self, buffer: &mut [u8], frames: usize, format: &DeviceFormat) {
        self(buffer, frames, format)
    }
}

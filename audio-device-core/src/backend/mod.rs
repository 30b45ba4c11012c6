//! Buffer-queue backends: playback and capture over a [`NativeAudioService`].

pub mod capture;
pub mod factory;
pub mod playback;
pub mod registry;
pub mod signal;

#[cfg(test)]
pub(crate) mod testing;

use std::thread;

use crate::models::config::StopDrainPolicy;
use crate::models::error::{BackendError, NativeError, NativeResultExt};
use crate::models::format::{ChannelLayout, DeviceFormat, SampleType, StreamFormat};
use crate::models::state::BackendKind;
use crate::traits::native::{
    DeviceProbe, NativeAudioService, NativeBufferQueue, NativeConfiguration, NativeEngine,
};

/// Pick the device to open: the first exposed name if none was requested,
/// otherwise the requested name if the service exposes it.
pub(crate) fn resolve_device_name(
    service: &dyn NativeAudioService,
    probe: DeviceProbe,
    requested: Option<&str>,
) -> Result<String, BackendError> {
    let names = service.device_names(probe);
    match requested {
        None => names.into_iter().next().ok_or_else(|| {
            BackendError::DeviceUnavailable(format!("{} exposes no devices", service.name()))
        }),
        Some(name) if names.iter().any(|n| n == name) => Ok(name.to_string()),
        Some(name) => Err(BackendError::DeviceUnavailable(format!(
            "unknown device name: {name}"
        ))),
    }
}

/// Find a format the engine accepts for `requested`, falling back to stereo
/// 16-bit signed. Returns the format to write back to the device.
pub(crate) fn negotiate_format(
    engine: &dyn NativeEngine,
    requested: &DeviceFormat,
    kind: BackendKind,
) -> Result<(DeviceFormat, StreamFormat), BackendError> {
    let stream = StreamFormat::from_device(requested);
    if engine.accepts_format(&stream, kind) {
        return Ok((*requested, stream));
    }

    let fallback = DeviceFormat {
        channels: ChannelLayout::Stereo,
        sample_type: SampleType::I16,
        ..*requested
    };
    let stream = StreamFormat::from_device(&fallback);
    if !engine.accepts_format(&stream, kind) {
        return Err(BackendError::ResetFailed(format!(
            "no supported {kind} format at {} Hz",
            requested.sample_rate
        )));
    }

    log::warn!(
        "{:?} {:?} not supported for {}, using {:?} {:?}",
        requested.channels,
        requested.sample_type,
        kind,
        fallback.channels,
        fallback.sample_type
    );
    Ok((fallback, stream))
}

/// Apply an optional native setting. Failure is logged and ignored.
pub(crate) fn configure_optional(queue: &dyn NativeBufferQueue, config: NativeConfiguration) {
    let _ = queue
        .set_configuration(config)
        .logged("config->SetConfiguration");
}

/// Poll until the native queue holds no buffers, or the policy gives up.
///
/// Returns whether the queue was seen empty.
pub(crate) fn drain_queue(queue: &dyn NativeBufferQueue, policy: &StopDrainPolicy) -> bool {
    let mut polls: u32 = 0;
    loop {
        if policy.poll_interval_ms == 0 {
            thread::yield_now();
        } else {
            thread::sleep(policy.poll_interval());
        }

        let state = match queue.state().logged("bufferQueue->GetState") {
            Ok(state) => state,
            Err(_) => return false,
        };
        if state.count == 0 {
            return true;
        }

        polls += 1;
        log::trace!("Waiting for {} queued buffers (poll {})", state.count, polls);
        if policy.max_polls.is_some_and(|max| polls >= max) {
            log::warn!(
                "Native queue still holds {} buffers after {} polls, giving up",
                state.count,
                polls
            );
            return false;
        }
    }
}

pub(crate) fn unavailable(err: NativeError) -> BackendError {
    BackendError::DeviceUnavailable(err.to_string())
}

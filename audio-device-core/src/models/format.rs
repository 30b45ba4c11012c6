use serde::{Deserialize, Serialize};

use crate::processing::ambisonics::{ambi_channel_count, MAX_AMBI_ORDER};

/// Speaker position bits used by native channel masks.
pub mod speaker {
    pub const FRONT_LEFT: u32 = 0x0000_0001;
    pub const FRONT_RIGHT: u32 = 0x0000_0002;
    pub const FRONT_CENTER: u32 = 0x0000_0004;
    pub const LOW_FREQUENCY: u32 = 0x0000_0008;
    pub const BACK_LEFT: u32 = 0x0000_0010;
    pub const BACK_RIGHT: u32 = 0x0000_0020;
    pub const BACK_CENTER: u32 = 0x0000_0100;
    pub const SIDE_LEFT: u32 = 0x0000_0200;
    pub const SIDE_RIGHT: u32 = 0x0000_0400;
}

/// Channel layout of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelLayout {
    Mono,
    Stereo,
    Quad,
    #[serde(rename = "5.1")]
    X51,
    #[serde(rename = "5.1-rear")]
    X51Rear,
    #[serde(rename = "6.1")]
    X61,
    #[serde(rename = "7.1")]
    X71,
    /// Full-sphere ambisonics of the given order (ACN channel ordering).
    Ambi3D { order: u8 },
}

/// A single interleaved channel position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    FrontLeft,
    FrontRight,
    FrontCenter,
    LowFrequency,
    BackLeft,
    BackRight,
    BackCenter,
    SideLeft,
    SideRight,
    /// Ambisonic coefficient, by ACN index.
    Aux(u8),
}

impl ChannelLayout {
    pub fn channel_count(&self) -> usize {
        match self {
            Self::Mono => 1,
            Self::Stereo => 2,
            Self::Quad => 4,
            Self::X51 | Self::X51Rear => 6,
            Self::X61 => 7,
            Self::X71 => 8,
            Self::Ambi3D { order } => ambi_channel_count(*order),
        }
    }

    pub fn is_ambisonic(&self) -> bool {
        matches!(self, Self::Ambi3D { .. })
    }

    /// Native speaker mask for this layout. Ambisonic layouts have no
    /// speaker positions and report 0.
    pub fn speaker_mask(&self) -> u32 {
        use speaker::*;
        match self {
            Self::Mono => FRONT_CENTER,
            Self::Stereo => FRONT_LEFT | FRONT_RIGHT,
            Self::Quad => FRONT_LEFT | FRONT_RIGHT | BACK_LEFT | BACK_RIGHT,
            Self::X51 => {
                FRONT_LEFT | FRONT_RIGHT | FRONT_CENTER | LOW_FREQUENCY | SIDE_LEFT | SIDE_RIGHT
            }
            Self::X51Rear => {
                FRONT_LEFT | FRONT_RIGHT | FRONT_CENTER | LOW_FREQUENCY | BACK_LEFT | BACK_RIGHT
            }
            Self::X61 => {
                FRONT_LEFT
                    | FRONT_RIGHT
                    | FRONT_CENTER
                    | LOW_FREQUENCY
                    | BACK_CENTER
                    | SIDE_LEFT
                    | SIDE_RIGHT
            }
            Self::X71 => {
                FRONT_LEFT
                    | FRONT_RIGHT
                    | FRONT_CENTER
                    | LOW_FREQUENCY
                    | BACK_LEFT
                    | BACK_RIGHT
                    | SIDE_LEFT
                    | SIDE_RIGHT
            }
            Self::Ambi3D { .. } => 0,
        }
    }

    /// Default interleaving order of the channels in a frame.
    pub fn channel_order(&self) -> Vec<Channel> {
        use Channel::*;
        match self {
            Self::Mono => vec![FrontCenter],
            Self::Stereo => vec![FrontLeft, FrontRight],
            Self::Quad => vec![FrontLeft, FrontRight, BackLeft, BackRight],
            Self::X51 => vec![FrontLeft, FrontRight, FrontCenter, LowFrequency, SideLeft, SideRight],
            Self::X51Rear => {
                vec![FrontLeft, FrontRight, FrontCenter, LowFrequency, BackLeft, BackRight]
            }
            Self::X61 => vec![
                FrontLeft,
                FrontRight,
                FrontCenter,
                LowFrequency,
                BackCenter,
                SideLeft,
                SideRight,
            ],
            Self::X71 => vec![
                FrontLeft,
                FrontRight,
                FrontCenter,
                LowFrequency,
                BackLeft,
                BackRight,
                SideLeft,
                SideRight,
            ],
            Self::Ambi3D { order } => (0..ambi_channel_count(*order) as u8).map(Aux).collect(),
        }
    }
}

/// How a sample's bits are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleRepresentation {
    UnsignedInt,
    SignedInt,
    Float,
}

/// Storage type of a single sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    F32,
}

impl SampleType {
    pub fn bytes(&self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
        }
    }

    pub fn bits(&self) -> u32 {
        self.bytes() as u32 * 8
    }

    pub fn representation(&self) -> SampleRepresentation {
        match self {
            Self::U8 | Self::U16 | Self::U32 => SampleRepresentation::UnsignedInt,
            Self::I8 | Self::I16 | Self::I32 => SampleRepresentation::SignedInt,
            Self::F32 => SampleRepresentation::Float,
        }
    }

    /// Fill `buffer` with silence. Unsigned types are silent at mid-scale.
    pub fn fill_silence(&self, buffer: &mut [u8]) {
        match self {
            Self::U8 => buffer.fill(0x80),
            Self::U16 => {
                let silence = 0x8000u16.to_ne_bytes();
                for sample in buffer.chunks_exact_mut(2) {
                    sample.copy_from_slice(&silence);
                }
            }
            Self::U32 => {
                let silence = 0x8000_0000u32.to_ne_bytes();
                for sample in buffer.chunks_exact_mut(4) {
                    sample.copy_from_slice(&silence);
                }
            }
            Self::I8 | Self::I16 | Self::I32 | Self::F32 => buffer.fill(0),
        }
    }
}

/// Format the device mixes and transfers in.
///
/// `update_size` is the number of frames per chunk and `update_count` the
/// number of chunks buffered between the mixer and the native service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFormat {
    pub sample_rate: u32,
    pub channels: ChannelLayout,
    pub sample_type: SampleType,
    pub update_size: u32,
    pub update_count: u32,
}

impl DeviceFormat {
    pub fn channel_count(&self) -> usize {
        self.channels.channel_count()
    }

    pub fn frame_size(&self) -> usize {
        self.channel_count() * self.sample_type.bytes()
    }

    pub fn chunk_bytes(&self) -> usize {
        self.frame_size() * self.update_size as usize
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate == 0 {
            return Err("sample rate must be positive".into());
        }
        if self.update_size == 0 {
            return Err("update size must be positive".into());
        }
        if self.update_count < 2 {
            return Err(format!(
                "update count must be at least 2, got {}",
                self.update_count
            ));
        }
        if let ChannelLayout::Ambi3D { order } = self.channels {
            if order > MAX_AMBI_ORDER {
                return Err(format!("unsupported ambisonic order: {order}"));
            }
        }
        Ok(())
    }
}

impl Default for DeviceFormat {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: ChannelLayout::Stereo,
            sample_type: SampleType::I16,
            update_size: 1024,
            update_count: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endianness {
    Little,
    Big,
}

impl Endianness {
    pub fn native() -> Self {
        if cfg!(target_endian = "little") {
            Self::Little
        } else {
            Self::Big
        }
    }
}

/// PCM stream description handed to the native service when a player or
/// recorder is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamFormat {
    pub num_channels: u32,
    /// Sample rate in milliHertz.
    pub sample_rate_millihz: u32,
    pub bits_per_sample: u32,
    pub container_size: u32,
    pub channel_mask: u32,
    pub endianness: Endianness,
    pub representation: SampleRepresentation,
}

impl StreamFormat {
    pub fn from_device(format: &DeviceFormat) -> Self {
        let bits = format.sample_type.bits();
        Self {
            num_channels: format.channel_count() as u32,
            sample_rate_millihz: format.sample_rate.saturating_mul(1000),
            bits_per_sample: bits,
            container_size: bits,
            channel_mask: format.channels.speaker_mask(),
            endianness: Endianness::native(),
            representation: format.sample_type.representation(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate_millihz / 1000
    }

    pub fn frame_size(&self) -> usize {
        self.num_channels as usize * (self.container_size as usize / 8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speaker_masks_match_channel_counts() {
        let layouts = [
            ChannelLayout::Mono,
            ChannelLayout::Stereo,
            ChannelLayout::Quad,
            ChannelLayout::X51,
            ChannelLayout::X51Rear,
            ChannelLayout::X61,
            ChannelLayout::X71,
        ];
        for layout in layouts {
            assert_eq!(
                layout.speaker_mask().count_ones() as usize,
                layout.channel_count(),
                "{layout:?}"
            );
            assert_eq!(layout.channel_order().len(), layout.channel_count());
        }
    }

    #[test]
    fn ambisonic_layout_has_no_speaker_mask() {
        let layout = ChannelLayout::Ambi3D { order: 2 };
        assert_eq!(layout.channel_count(), 9);
        assert_eq!(layout.speaker_mask(), 0);
        assert_eq!(layout.channel_order()[8], Channel::Aux(8));
    }

    #[test]
    fn frame_and_chunk_sizes() {
        let format = DeviceFormat {
            sample_rate: 48000,
            channels: ChannelLayout::X51,
            sample_type: SampleType::F32,
            update_size: 256,
            update_count: 4,
        };
        assert_eq!(format.frame_size(), 24);
        assert_eq!(format.chunk_bytes(), 24 * 256);
    }

    #[test]
    fn validate_rejects_single_buffering() {
        let format = DeviceFormat {
            update_count: 1,
            ..DeviceFormat::default()
        };
        assert!(format.validate().is_err());

        let format = DeviceFormat {
            update_size: 0,
            ..DeviceFormat::default()
        };
        assert!(format.validate().is_err());
    }

    #[test]
    fn validate_rejects_high_ambisonic_order() {
        let format = DeviceFormat {
            channels: ChannelLayout::Ambi3D { order: 4 },
            ..DeviceFormat::default()
        };
        assert!(format.validate().is_err());
    }

    #[test]
    fn unsigned_silence_is_mid_scale() {
        let mut buf = [0u8; 4];
        SampleType::U8.fill_silence(&mut buf);
        assert_eq!(buf, [0x80; 4]);

        SampleType::U16.fill_silence(&mut buf);
        assert_eq!(u16::from_ne_bytes([buf[0], buf[1]]), 0x8000);

        SampleType::F32.fill_silence(&mut buf);
        assert_eq!(buf, [0; 4]);
    }

    #[test]
    fn stream_format_from_device() {
        let format = DeviceFormat {
            sample_rate: 48000,
            channels: ChannelLayout::Stereo,
            sample_type: SampleType::I16,
            update_size: 480,
            update_count: 2,
        };
        let stream = StreamFormat::from_device(&format);
        assert_eq!(stream.num_channels, 2);
        assert_eq!(stream.sample_rate_millihz, 48_000_000);
        assert_eq!(stream.sample_rate(), 48000);
        assert_eq!(stream.bits_per_sample, 16);
        assert_eq!(stream.channel_mask, speaker::FRONT_LEFT | speaker::FRONT_RIGHT);
        assert_eq!(stream.representation, SampleRepresentation::SignedInt);
        assert_eq!(stream.frame_size(), 4);
    }
}

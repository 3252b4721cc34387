/*!
    Codec identifiers.
*/

/// Identifies the compression format of a stream, independent of any
/// particular decoding library's own enum.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CodecId {
    // Video
    H264,
    H265,
    Vp8,
    Vp9,
    Av1,
    Mpeg4,
    Mpeg2Video,
    // Audio
    Aac,
    Opus,
    Mp3,
    Vorbis,
    Flac,
    PcmS16Le,
    PcmS16Be,
    PcmF32Le,
    Ac3,
}

impl CodecId {
    pub const fn is_video(self) -> bool {
        matches!(
            self,
            Self::H264
                | Self::H265
                | Self::Vp8
                | Self::Vp9
                | Self::Av1
                | Self::Mpeg4
                | Self::Mpeg2Video
        )
    }

    pub const fn is_audio(self) -> bool {
        !self.is_video()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_id_classification() {
        assert!(CodecId::H264.is_video());
        assert!(!CodecId::H264.is_audio());
        assert!(CodecId::Aac.is_audio());
        assert!(!CodecId::Aac.is_video());
    }
}

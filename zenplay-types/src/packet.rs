/*!
    Encoded packets and their timestamps (data model §3).
*/

use std::time::Duration;

use crate::rational::Rational;

/// A presentation/decode timestamp in a stream's time base. `None` models
/// FFmpeg's `pts == AV_NOPTS_VALUE` absence marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Pts(pub i64);

/// A duration expressed in a stream's time base (not milliseconds).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct MediaDuration(pub i64);

/// Which logical stream a packet or frame belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamType {
    Video,
    Audio,
}

/**
    An encoded-data record tagged with the originating stream and an
    optional decode timestamp (spec §3).

    Owned by whoever currently holds it in a queue; released by the
    queue's cleanup callback or by the decoder after ingestion.
*/
#[derive(Clone)]
pub struct Packet {
    pub data: Vec<u8>,
    pub pts: Option<Pts>,
    pub dts: Option<Pts>,
    pub duration: MediaDuration,
    pub time_base: Rational,
    pub is_keyframe: bool,
    pub stream_type: StreamType,
}

impl Packet {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        data: Vec<u8>,
        pts: Option<Pts>,
        dts: Option<Pts>,
        duration: MediaDuration,
        time_base: Rational,
        is_keyframe: bool,
        stream_type: StreamType,
    ) -> Self {
        Self {
            data,
            pts,
            dts,
            duration,
            time_base,
            is_keyframe,
            stream_type,
        }
    }

    /// The packet's PTS converted to wall-clock duration via its time base,
    /// or `None` if the PTS is unset.
    pub fn presentation_time(&self) -> Option<Duration> {
        let pts = self.pts?;
        if pts.0 < 0 {
            return None;
        }
        let seconds = pts.0 as f64 * self.time_base.as_f64();
        Some(Duration::from_secs_f64(seconds.max(0.0)))
    }
}

impl std::fmt::Debug for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Packet")
            .field("bytes", &self.data.len())
            .field("pts", &self.pts)
            .field("dts", &self.dts)
            .field("is_keyframe", &self.is_keyframe)
            .field("stream_type", &self.stream_type)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presentation_time_uses_time_base() {
        let packet = Packet::new(
            vec![0u8; 4],
            Some(Pts(50)),
            Some(Pts(50)),
            MediaDuration(1),
            Rational::new(1, 25),
            true,
            StreamType::Video,
        );
        let pt = packet.presentation_time().unwrap();
        assert!((pt.as_secs_f64() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn unset_pts_yields_no_presentation_time() {
        let packet = Packet::new(
            vec![],
            None,
            None,
            MediaDuration(0),
            Rational::default(),
            false,
            StreamType::Audio,
        );
        assert!(packet.presentation_time().is_none());
    }
}

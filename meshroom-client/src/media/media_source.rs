use crate::error::MeshError;
use crate::media::local_media::LocalMedia;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::media::Sample;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// Acquires the local audio+video capture.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn acquire(&self) -> Result<LocalMedia, MeshError>;
}

const AUDIO_FRAME: Duration = Duration::from_millis(20);
const VIDEO_FRAME: Duration = Duration::from_millis(33);

// Opus comfort-noise frame
const SILENT_OPUS: &[u8] = &[0xf8, 0xff, 0xfe];

/// Opus + VP8 tracks without a capture device.
///
/// With the pump enabled the tracks carry placeholder frames so that remote
/// sides observe the tracks; without it they stay idle.
#[derive(Debug, Clone)]
pub struct SyntheticMediaSource {
    pump: bool,
}

impl SyntheticMediaSource {
    pub fn new() -> Self {
        Self { pump: true }
    }

    pub fn silent() -> Self {
        Self { pump: false }
    }
}

impl Default for SyntheticMediaSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaSource for SyntheticMediaSource {
    async fn acquire(&self) -> Result<LocalMedia, MeshError> {
        let stream_id = Uuid::new_v4().to_string();

        let audio = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: 48000,
                channels: 2,
                ..Default::default()
            },
            "audio".to_owned(),
            stream_id.clone(),
        ));
        let video = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP8.to_owned(),
                clock_rate: 90000,
                ..Default::default()
            },
            "video".to_owned(),
            stream_id.clone(),
        ));

        let media = LocalMedia::new(stream_id, vec![audio.clone(), video.clone()]);
        if self.pump {
            spawn_pump(audio, Bytes::from_static(SILENT_OPUS), AUDIO_FRAME, &media);
            spawn_pump(video, Bytes::from(vec![0u8; 64]), VIDEO_FRAME, &media);
        }

        info!("Acquired synthetic media stream {}", media.stream_id());
        Ok(media)
    }
}

fn spawn_pump(
    track: Arc<TrackLocalStaticSample>,
    frame: Bytes,
    interval: Duration,
    media: &LocalMedia,
) {
    let mut stopped = media.stopped();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = stopped.changed() => break,
                _ = ticker.tick() => {
                    let sample = Sample {
                        data: frame.clone(),
                        duration: interval,
                        ..Default::default()
                    };
                    if let Err(e) = track.write_sample(&sample).await {
                        debug!("Dropping sample on {}: {}", track.id(), e);
                    }
                }
            }
        }
        debug!("Sample pump for {} stopped", track.id());
    });
}

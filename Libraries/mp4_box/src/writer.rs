use crate::boxes::{
    avc1::VisualSampleEntry,
    avcc::AvccBox,
    edts::EdtsBox,
    elst::{ElstBox, ElstEntry},
    esds::EsdsBox,
    generic::Mp4Box,
    hdlr::HdlrBox,
    moov::MoovBox,
    mp4a::AudioSampleEntry,
    mvex::MvexBox,
    pssh::PsshBox,
    sinf::SinfBox,
    smhd::SmhdBox,
    stsd::SampleEntry,
    stss::StssBox,
    tenc::TencBox,
    trak::TrakBox,
    vmhd::VmhdBox,
};

// Media time of the first presented video sample. Matches the composition offset that
// Smooth Streaming encoders put on the first frame.
const VIDEO_EDIT_MEDIA_TIME: i64 = 0x0EAA;

// Codec parameters of an H.264 track, as advertised by the manifest.
#[derive(Clone, Debug)]
pub struct VideoParams {
    pub width: u16,
    pub height: u16,
    pub sps: Vec<u8>,   // sequence parameter set, without start code
    pub pps: Vec<u8>,   // picture parameter set, without start code
}

// Codec parameters of an AAC track.
#[derive(Clone, Debug)]
pub struct AudioParams {
    pub sample_rate: u32,
    pub audio_specific_config: Vec<u8>,
}

#[derive(Clone, Debug)]
pub enum TrackParams {
    Video(VideoParams),
    Audio(AudioParams),
}

// Protection data for a track encrypted with the `cenc` scheme.
//
// Fields:
// - `system_id`: DRM system UUID, big-endian.
// - `header`: opaque system header copied into the `pssh` box.
// - `key_id`: key id as it appears in the manifest (GUID, little-endian first three groups).
// - `iv_size`: per-sample IV size in bytes.
#[derive(Clone, Debug)]
pub struct ProtectionParams {
    pub system_id: [u8; 16],
    pub header: Vec<u8>,
    pub key_id: [u8; 16],
    pub iv_size: u8,
}

#[derive(Clone, Debug)]
pub struct TrackInfo {
    pub params: TrackParams,
    pub protection: Option<ProtectionParams>,
}

impl TrackInfo {
    pub fn is_video(&self) -> bool {
        matches!(self.params, TrackParams::Video(_))
    }
}

/// Media timescale of every synthesized track; fragment decode times must use it.
pub const TRACK_TIMESCALE: u64 = 10_000_000;

/// Builds a single-track `moov` for fragmented playback.
///
/// The track always uses id 1 and a timescale of [`TRACK_TIMESCALE`]. No `ftyp` is emitted. Sample tables are present but empty since every sample
/// arrives in a fragment.
pub fn synthesize_init_segment(track: &TrackInfo) -> Vec<u8> {
    let mut moov = MoovBox { mvex: Some(MvexBox::default()), ..Default::default() };

    if let Some(protection) = &track.protection {
        moov.pssh.push(PsshBox::new(protection.system_id, protection.header.clone()));
    }

    moov.traks.push(build_trak(track));

    let mut buffer = Vec::with_capacity(moov.box_size() as usize);
    moov.write_box(&mut buffer);
    tracing::debug!(
        "synthesized {} init segment ({} bytes, protected: {})",
        if track.is_video() { "video" } else { "audio" },
        buffer.len(),
        track.protection.is_some()
    );
    buffer
}

fn build_trak(track: &TrackInfo) -> TrakBox {
    let mut trak = TrakBox::default();
    let minf = &mut trak.mdia.minf;

    match &track.params {
        TrackParams::Video(video) => {
            trak.tkhd.width = (video.width as u32) << 16;
            trak.tkhd.height = (video.height as u32) << 16;
            trak.edts = Some(EdtsBox {
                elst: ElstBox {
                    version: 0,
                    entries: vec![ElstEntry {
                        segment_duration: 0,
                        media_time: VIDEO_EDIT_MEDIA_TIME,
                        ..Default::default()
                    }],
                },
            });
            trak.mdia.hdlr = HdlrBox::video();
            minf.vmhd = Some(VmhdBox::default());
            minf.stbl.stss = Some(StssBox::default());
        }
        TrackParams::Audio(_) => {
            trak.tkhd.volume = 0x0100;
            trak.mdia.hdlr = HdlrBox::audio();
            minf.smhd = Some(SmhdBox::default());
        }
    }

    minf.stbl.stsd.entries = sample_entries(track);
    trak
}

// The protected entry (encv/enca) goes first so that a sink which understands the scheme picks
// it, followed by the clear entry for sinks that ignore protection.
fn sample_entries(track: &TrackInfo) -> Vec<SampleEntry> {
    let clear = match &track.params {
        TrackParams::Video(video) => SampleEntry::Visual(VisualSampleEntry {
            width: video.width,
            height: video.height,
            avcc: Some(AvccBox::with_parameter_sets(&video.sps, &video.pps)),
            ..Default::default()
        }),
        TrackParams::Audio(audio) => SampleEntry::Audio(AudioSampleEntry {
            sample_rate: audio.sample_rate,
            esds: Some(EsdsBox { audio_specific_config: audio.audio_specific_config.clone() }),
            ..Default::default()
        }),
    };

    let Some(protection) = &track.protection else {
        return vec![clear];
    };

    let tenc = TencBox {
        is_protected: 1,
        per_sample_iv_size: protection.iv_size,
        default_kid: uuid::Uuid::from_bytes_le(protection.key_id).into_bytes(),
    };

    let protected = match &clear {
        SampleEntry::Visual(entry) => SampleEntry::Visual(VisualSampleEntry {
            format: *b"encv",
            sinf: Some(SinfBox::cenc(entry.format, tenc)),
            ..entry.clone()
        }),
        SampleEntry::Audio(entry) => SampleEntry::Audio(AudioSampleEntry {
            format: *b"enca",
            sinf: Some(SinfBox::cenc(entry.format, tenc)),
            ..entry.clone()
        }),
        SampleEntry::Unknown(_) => return vec![clear],
    };

    vec![protected, clear]
}

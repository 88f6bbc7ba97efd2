//! Smooth Streaming (`SmoothStreamingMedia`) decoding.
//!
//! Fragments are addressed through the stream's URL template, so every segment keeps its start
//! in manifest ticks. Initialization segments are not listed and get synthesized from the
//! `CodecPrivateData` of each quality level.

use tracing::{debug, trace};

use super::elements::{parse_document, XmlElement};
use super::{
    parse_hex, resolve_url, select_last_per_kind, AdaptationSet, CodecPrivate, Manifest, ProtectionInfo, ProtectionMap,
    Representation, Segment, StreamFormat, TrackKind,
};
use crate::error::{PlayerError, Result};

pub const DEFAULT_TIMESCALE: u64 = 10_000_000;
pub const BITRATE_PLACEHOLDER: &str = "{bitrate}";
pub const START_TIME_PLACEHOLDER: &str = "{start time}";

const BITRATE_TOKEN: &str = "__bitrate__";
const START_TIME_TOKEN: &str = "__start_time__";

const PLAYREADY_LICENSE_URL: &str = "http://playready.directtaps.net/pr/svc/rightsmanager.asmx";
const PIFF_IV_SIZE: u8 = 8;
const NAL_START_CODE: &str = "00000001";

fn parse_u64(s: &str) -> Option<u64> {
    s.parse().ok()
}

fn parse_u32(s: &str) -> Option<u32> {
    s.parse().ok()
}

fn parse_u16(s: &str) -> Option<u16> {
    s.parse().ok()
}

/// Decodes a Smooth Streaming manifest fetched from `manifest_url`.
pub fn parse(raw: &str, manifest_url: &str) -> Result<Manifest> {
    let root = parse_document(raw)?;
    if root.name != "SmoothStreamingMedia" {
        return Err(PlayerError::manifest(format!(
            "expected <SmoothStreamingMedia> root, found <{}>",
            root.name
        )));
    }

    let timescale = root
        .parse_attr("TimeScale", parse_u64)?
        .filter(|ts| *ts > 0)
        .unwrap_or(DEFAULT_TIMESCALE);
    let duration_ticks = root.parse_attr("Duration", parse_u64)?;

    let protection = match root.child("Protection") {
        Some(el) => Some(parse_protection(el)?),
        None => None,
    };
    let content_protection = protection.as_ref().map(|_| {
        let mut map = ProtectionMap::new();
        map.insert("playready".to_string(), PLAYREADY_LICENSE_URL.to_string());
        map
    });

    let mut sets = Vec::new();
    for stream in root.children_named("StreamIndex") {
        let kind = match stream.attr("Type") {
            Some("video") => TrackKind::Video,
            Some("audio") => TrackKind::Audio,
            other => {
                debug!("skipping stream index of type {:?}", other);
                continue;
            }
        };
        let set = parse_stream_index(stream, kind, timescale, manifest_url, content_protection.clone())?;
        sets.push(set);
    }
    if sets.is_empty() {
        return Err(PlayerError::manifest("manifest has no audio or video stream"));
    }
    let adaptation_sets = select_last_per_kind(sets);

    let duration = match duration_ticks {
        Some(ticks) => ticks as f64 / timescale as f64,
        None => adaptation_sets
            .iter()
            .filter_map(|s| s.representations.first())
            .filter_map(|r| r.segments.last().map(Segment::end_time))
            .fold(0.0, f64::max),
    };

    Ok(Manifest {
        format: StreamFormat::SmoothStreaming,
        url: manifest_url.to_string(),
        duration,
        adaptation_sets,
        protection,
    })
}

fn parse_stream_index(
    stream: &XmlElement,
    kind: TrackKind,
    timescale: u64,
    manifest_url: &str,
    content_protection: Option<ProtectionMap>,
) -> Result<AdaptationSet> {
    let template = stream
        .attr("Url")
        .ok_or_else(|| PlayerError::manifest("StreamIndex is missing required attribute Url"))?;
    let url = join_template_url(manifest_url, template)?;
    let segments = parse_fragments(stream, timescale)?;
    let mime = match kind {
        TrackKind::Video => "video/mp4",
        TrackKind::Audio => "audio/mp4",
    };

    let mut representations = Vec::new();
    for level in stream.children_named("QualityLevel") {
        let mut rep = Representation {
            bandwidth: level.require_attr("Bitrate", parse_u64)?,
            mime_type: Some(mime.to_string()),
            url: url.clone(),
            segments: segments.clone(),
            timescale: Some(timescale),
            ..Default::default()
        };
        let private_data = level.parse_attr("CodecPrivateData", parse_hex_field)?;

        match kind {
            TrackKind::Video => {
                let (sps, pps) = private_data
                    .as_deref()
                    .and_then(split_parameter_sets)
                    .ok_or_else(|| PlayerError::manifest("video QualityLevel needs SPS and PPS in CodecPrivateData"))?;
                let profile_compat = *sps
                    .get(3)
                    .ok_or_else(|| PlayerError::manifest("sequence parameter set is too short"))?;
                rep.codecs = Some(format!("avc1.4d40{:x}", profile_compat));
                rep.width = level.parse_attr("MaxWidth", parse_u32)?;
                rep.height = level.parse_attr("MaxHeight", parse_u32)?;
                rep.codec_private = CodecPrivate::Avc { sps, pps };
            }
            TrackKind::Audio => {
                let sample_rate = level.parse_attr("SamplingRate", parse_u32)?;
                rep.codecs = Some("mp4a.40.2".to_string());
                rep.audio_sampling_rate = sample_rate;
                rep.codec_private = CodecPrivate::Aac {
                    config: private_data.as_deref().and_then(parse_hex).unwrap_or_default(),
                    sample_rate,
                    channels: level.parse_attr("Channels", parse_u16)?,
                    bits_per_sample: level.parse_attr("BitsPerSample", parse_u16)?,
                    packet_size: level.parse_attr("PacketSize", parse_u32)?,
                };
            }
        }
        representations.push(rep);
    }
    if representations.is_empty() {
        return Err(PlayerError::manifest(format!("{} StreamIndex has no QualityLevel", kind)));
    }

    let codecs = representations[0].codecs.clone().unwrap_or_default();
    trace!("{} stream: {} levels, {} fragments", kind, representations.len(), segments.len());
    Ok(AdaptationSet { kind, mime: mime.to_string(), codecs, representations, content_protection })
}

// Keeps the hex text so the start-code split works on the original digits.
fn parse_hex_field(text: &str) -> Option<String> {
    parse_hex(text).map(|_| text.to_ascii_lowercase())
}

/// Splits `00000001 <sps> 00000001 <pps>` into its two parameter sets.
fn split_parameter_sets(hex: &str) -> Option<(Vec<u8>, Vec<u8>)> {
    let parts: Vec<&str> = hex.split(NAL_START_CODE).collect();
    if parts.len() != 3 {
        return None;
    }
    Some((parse_hex(parts[1])?, parse_hex(parts[2])?))
}

/// Walks the `c` elements. The first `t` seeds the clock, every element must carry `d`.
fn parse_fragments(stream: &XmlElement, timescale: u64) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut clock: Option<u64> = None;
    for c in stream.children_named("c") {
        let start = match clock {
            Some(t) => t,
            None => c.parse_attr("t", parse_u64)?.unwrap_or(0),
        };
        let duration = c.require_attr("d", parse_u64)?;
        segments.push(Segment {
            time: start as f64 / timescale as f64,
            duration: duration as f64 / timescale as f64,
            range: None,
            time_ticks: Some(start),
            index_end: None,
            url: None,
        });
        clock = Some(start + duration);
    }
    Ok(segments)
}

/// Resolves a fragment URL template against the manifest location.
///
/// The template's `{bitrate}` and `{start time}` placeholders are kept verbatim so the request
/// builder can substitute them.
pub fn join_template_url(manifest_url: &str, template: &str) -> Result<String> {
    // placeholders would come back percent-encoded
    let masked = template
        .replace(BITRATE_PLACEHOLDER, BITRATE_TOKEN)
        .replace(START_TIME_PLACEHOLDER, START_TIME_TOKEN);
    let resolved = resolve_url(manifest_url, &masked)?;
    Ok(resolved
        .replace(BITRATE_TOKEN, BITRATE_PLACEHOLDER)
        .replace(START_TIME_TOKEN, START_TIME_PLACEHOLDER))
}

fn parse_protection(el: &XmlElement) -> Result<ProtectionInfo> {
    let header_el = el
        .child("ProtectionHeader")
        .ok_or_else(|| PlayerError::manifest("Protection has no ProtectionHeader"))?;
    let system_id = header_el.require_attr("SystemID", parse_guid)?;
    let header = rbase64::decode(header_el.text.trim())
        .map_err(|e| PlayerError::manifest(format!("protection header is not base64: {:?}", e)))?;
    let key_id = extract_key_id(&header)?;
    Ok(ProtectionInfo { system_id, header, iv_size: PIFF_IV_SIZE, key_id })
}

/// `{9a04f079-9840-4286-ab92-e65be0885f95}` to its 16 bytes in text order.
fn parse_guid(text: &str) -> Option<[u8; 16]> {
    let hex: String = text.chars().filter(|c| !matches!(c, '{' | '}' | '-')).collect();
    parse_hex(&hex)?.try_into().ok()
}

/// Finds `<KID>...</KID>` in a UTF-16LE PlayReady header and decodes its base64 content.
fn extract_key_id(header: &[u8]) -> Result<[u8; 16]> {
    let units: Vec<u16> = header
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    let text = String::from_utf16_lossy(&units);
    let start = text
        .find("<KID>")
        .ok_or_else(|| PlayerError::manifest("protection header has no KID"))?
        + "<KID>".len();
    let end = text[start..]
        .find('<')
        .map(|pos| start + pos)
        .unwrap_or(text.len());
    let kid = rbase64::decode(text[start..end].trim())
        .map_err(|e| PlayerError::manifest(format!("KID is not base64: {:?}", e)))?;
    kid.try_into()
        .map_err(|kid: Vec<u8>| PlayerError::manifest(format!("KID has {} bytes, expected 16", kid.len())))
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "http://media.example/big.ism/Manifest";

    fn video_cpd() -> &'static str {
        "000000016764001FAC2CA5014016EFFC100010014808080A000007D200017700C100005A648000B4C9FE31C6080002D3240005A64FF18E1DA12251600000000168E9093525"
    }

    fn manifest(protection: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="utf-16"?>
<SmoothStreamingMedia MajorVersion="2" MinorVersion="0" Duration="60000000">
  <StreamIndex Type="video" Url="QualityLevels({{bitrate}})/Fragments(video={{start time}})" Chunks="3">
    <QualityLevel Index="0" Bitrate="350000" FourCC="H264" MaxWidth="320" MaxHeight="180" CodecPrivateData="{cpd}"/>
    <QualityLevel Index="1" Bitrate="1000000" FourCC="H264" MaxWidth="640" MaxHeight="360" CodecPrivateData="{cpd}"/>
    <c t="0" d="20000000"/>
    <c d="20000000"/>
    <c d="20000000"/>
  </StreamIndex>
  <StreamIndex Type="audio" Url="QualityLevels({{bitrate}})/Fragments(audio={{start time}})">
    <QualityLevel Bitrate="128000" SamplingRate="44100" Channels="2" BitsPerSample="16" PacketSize="4" CodecPrivateData="1210"/>
    <c d="20000000"/><c d="20000000"/><c d="20000000"/>
  </StreamIndex>
  <StreamIndex Type="text" Url="t"/>
  {protection}
</SmoothStreamingMedia>"#,
            cpd = video_cpd(),
            protection = protection
        )
    }

    fn playready_header(kid_b64: &str) -> String {
        let xml = format!("<WRMHEADER><DATA><KID>{}</KID></DATA></WRMHEADER>", kid_b64);
        let mut bytes = vec![0x10, 0x02, 0x00, 0x00];
        for unit in xml.encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        rbase64::encode(&bytes)
    }

    #[test]
    fn clear_manifest_normalizes() {
        let manifest = parse(&manifest(""), URL).unwrap();
        assert_eq!(manifest.duration, 6.0);
        assert!(!manifest.is_encrypted());
        assert_eq!(manifest.adaptation_sets.len(), 2);

        let video = &manifest.adaptation_sets[0];
        assert_eq!(video.kind, TrackKind::Video);
        assert_eq!(video.codecs, "avc1.4d401f");
        assert_eq!(video.bitrates(), vec![350_000, 1_000_000]);
        let rep = &video.representations[0];
        assert_eq!(rep.url, "http://media.example/big.ism/QualityLevels({bitrate})/Fragments(video={start time})");
        assert_eq!(rep.width, Some(320));
        assert_eq!(rep.segments.len(), 3);
        assert_eq!(rep.segments[2].time, 4.0);
        assert_eq!(rep.segments[2].time_ticks, Some(40_000_000));
        match &rep.codec_private {
            CodecPrivate::Avc { sps, pps } => {
                assert_eq!(&sps[..4], &[0x67, 0x64, 0x00, 0x1F]);
                assert_eq!(pps, &vec![0x68, 0xE9, 0x09, 0x35, 0x25]);
            }
            other => panic!("unexpected codec data {:?}", other),
        }

        let audio = &manifest.adaptation_sets[1];
        assert_eq!(audio.codecs, "mp4a.40.2");
        assert_eq!(
            audio.representations[0].codec_private,
            CodecPrivate::Aac {
                config: vec![0x12, 0x10],
                sample_rate: Some(44100),
                channels: Some(2),
                bits_per_sample: Some(16),
                packet_size: Some(4),
            }
        );
    }

    #[test]
    fn protection_header_yields_key_id() {
        let kid = [0x11u8; 8].iter().chain([0x22u8; 8].iter()).copied().collect::<Vec<_>>();
        let protection = format!(
            r#"<Protection><ProtectionHeader SystemID="{{9a04f079-9840-4286-ab92-e65be0885f95}}">{}</ProtectionHeader></Protection>"#,
            playready_header(&rbase64::encode(&kid))
        );
        let manifest = parse(&manifest(&protection), URL).unwrap();
        let info = manifest.protection.as_ref().unwrap();
        assert_eq!(info.system_id[0], 0x9a);
        assert_eq!(info.system_id[15], 0x95);
        assert_eq!(info.key_id.to_vec(), kid);
        assert_eq!(info.iv_size, 8);
        let map = manifest.adaptation_sets[0].content_protection.as_ref().unwrap();
        assert_eq!(map.get("playready").map(String::as_str), Some(PLAYREADY_LICENSE_URL));
    }

    #[test]
    fn fragment_clock_starts_at_first_t() {
        let raw = format!(
            r#"<SmoothStreamingMedia TimeScale="1000"><StreamIndex Type="video" Url="v/{{start time}}">
               <QualityLevel Bitrate="1" CodecPrivateData="{}"/><c t="5000" d="2000"/><c d="2000"/></StreamIndex></SmoothStreamingMedia>"#,
            video_cpd()
        );
        let manifest = parse(&raw, URL).unwrap();
        let segs = &manifest.adaptation_sets[0].representations[0].segments;
        assert_eq!(segs[0].time, 5.0);
        assert_eq!(segs[1].time_ticks, Some(7000));
        assert_eq!(manifest.adaptation_sets[0].representations[0].timescale, Some(1000));
        assert_eq!(manifest.duration, 9.0);
    }

    #[test]
    fn malformed_manifests_are_rejected() {
        let missing_d = format!(
            r#"<SmoothStreamingMedia><StreamIndex Type="video" Url="v"><QualityLevel Bitrate="1" CodecPrivateData="{}"/><c t="0"/></StreamIndex></SmoothStreamingMedia>"#,
            video_cpd()
        );
        assert!(matches!(parse(&missing_d, URL), Err(PlayerError::ManifestParse(_))));

        let no_sps = r#"<SmoothStreamingMedia><StreamIndex Type="video" Url="v"><QualityLevel Bitrate="1" CodecPrivateData="0102"/></StreamIndex></SmoothStreamingMedia>"#;
        assert!(matches!(parse(no_sps, URL), Err(PlayerError::ManifestParse(_))));

        assert!(matches!(parse("<MPD/>", URL), Err(PlayerError::ManifestParse(_))));
    }

    #[test]
    fn template_urls_keep_placeholders() {
        assert_eq!(
            join_template_url("http://h/a.ism/Manifest?x=1", "QualityLevels({bitrate})").unwrap(),
            "http://h/a.ism/QualityLevels({bitrate})"
        );
        assert_eq!(join_template_url("http://h/a.ism/Manifest", "https://cdn/x").unwrap(), "https://cdn/x");
    }

    #[test]
    fn template_urls_resolve_like_relative_urls() {
        let manifest = "http://h.example/a/big.ism/Manifest";
        assert_eq!(
            join_template_url(manifest, "/QualityLevels({bitrate})/Fragments(video={start time})").unwrap(),
            "http://h.example/QualityLevels({bitrate})/Fragments(video={start time})"
        );
        assert_eq!(
            join_template_url(manifest, "../x/QualityLevels({bitrate})/Fragments(audio={start time})").unwrap(),
            "http://h.example/a/x/QualityLevels({bitrate})/Fragments(audio={start time})"
        );
        assert!(matches!(join_template_url("not a url", "QualityLevels({bitrate})"), Err(PlayerError::ManifestParse(_))));
    }
}

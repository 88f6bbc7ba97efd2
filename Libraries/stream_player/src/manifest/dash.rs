//! MPEG-DASH (`.mpd`) decoding.
//!
//! Only on-demand content addressed through `SegmentBase` (one resource plus a `sidx`) or
//! `SegmentList` (explicit byte ranges) is modelled. Elements outside that subset are recognized
//! as [`DashNode::Ignored`] and skipped; missing required fields are errors.

use tracing::{debug, trace};

use super::elements::{parse_document, XmlElement};
use super::{
    parse_duration, resolve_url, select_last_per_kind, AdaptationSet, ByteRange, Manifest, ProtectionMap,
    Representation, Segment, StreamFormat, TrackKind,
};
use crate::error::{PlayerError, Result};

const YOUTUBE_DRM_SCHEME: &str = "http://youtube.com/drm/2012/10/10";

// Every element the decoder understands, keyed by element name.
#[derive(Debug, Clone, Copy)]
enum DashNode<'a> {
    Period(&'a XmlElement),
    AdaptationSet(&'a XmlElement),
    Representation(&'a XmlElement),
    BaseUrl(&'a XmlElement),
    SegmentBase(&'a XmlElement),
    SegmentList(&'a XmlElement),
    SegmentUrl(&'a XmlElement),
    Initialization(&'a XmlElement),
    ContentProtection(&'a XmlElement),
    Ignored(&'a str),
}

fn classify(element: &XmlElement) -> DashNode<'_> {
    match element.name.as_str() {
        "Period" => DashNode::Period(element),
        "AdaptationSet" => DashNode::AdaptationSet(element),
        "Representation" => DashNode::Representation(element),
        "BaseURL" => DashNode::BaseUrl(element),
        "SegmentBase" => DashNode::SegmentBase(element),
        "SegmentList" => DashNode::SegmentList(element),
        "SegmentURL" => DashNode::SegmentUrl(element),
        "Initialization" => DashNode::Initialization(element),
        "ContentProtection" => DashNode::ContentProtection(element),
        other => DashNode::Ignored(other),
    }
}

fn parse_u64(s: &str) -> Option<u64> {
    s.parse().ok()
}

fn parse_u32(s: &str) -> Option<u32> {
    s.parse().ok()
}

/// `n` or `n/d`.
fn parse_frame_rate(s: &str) -> Option<f64> {
    match s.split_once('/') {
        Some((n, d)) => {
            let n: f64 = n.trim().parse().ok()?;
            let d: f64 = d.trim().parse().ok()?;
            Some(if d == 0.0 { n } else { n / d })
        }
        None => s.parse().ok(),
    }
}

#[derive(Debug, Clone, Default)]
struct SegmentBase {
    timescale: Option<u64>,
    duration: Option<u64>,
    index_range: Option<ByteRange>,
    presentation_time_offset: Option<u64>,
    start_number: Option<u64>,
    initialization: Option<ByteRange>,
}

#[derive(Debug, Clone, Default)]
struct SegmentUrl {
    media: Option<String>,
    media_range: Option<ByteRange>,
    index: Option<String>,
    index_range: Option<ByteRange>,
}

#[derive(Debug, Clone, Default)]
struct SegmentList {
    base: SegmentBase,
    duration_seconds: Option<f64>,
    segment_urls: Vec<SegmentUrl>,
}

// Attributes and children shared by MPD levels that can describe representations.
#[derive(Debug, Clone, Default)]
struct RepresentationBase {
    id: Option<String>,
    profiles: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    frame_rate: Option<f64>,
    audio_sampling_rate: Option<u32>,
    mime_type: Option<String>,
    codecs: Option<String>,
    base_urls: Vec<String>,
    segment_base: Option<SegmentBase>,
    segment_list: Option<SegmentList>,
    content_protection: Option<ProtectionMap>,
}

fn parse_segment_base(el: &XmlElement) -> Result<SegmentBase> {
    let mut base = SegmentBase {
        timescale: el.parse_attr("timescale", parse_u64)?,
        duration: el.parse_attr("duration", parse_u64)?,
        index_range: el.parse_attr("indexRange", ByteRange::parse)?,
        presentation_time_offset: el.parse_attr("presentationTimeOffset", parse_u64)?,
        start_number: el.parse_attr("startNumber", parse_u64)?,
        initialization: None,
    };
    for child in &el.children {
        if let DashNode::Initialization(init) = classify(child) {
            base.initialization = init.parse_attr("range", ByteRange::parse)?;
            break;
        }
    }
    Ok(base)
}

fn parse_segment_list(el: &XmlElement) -> Result<SegmentList> {
    let base = parse_segment_base(el)?;
    let duration_seconds = match (base.duration, base.timescale) {
        (Some(d), Some(ts)) if ts > 0 => Some(d as f64 / ts as f64),
        (Some(d), _) => Some(d as f64),
        (None, _) => None,
    };
    let mut segment_urls = Vec::new();
    for child in &el.children {
        if let DashNode::SegmentUrl(seg) = classify(child) {
            segment_urls.push(SegmentUrl {
                media: seg.attr("media").map(str::to_string),
                media_range: seg.parse_attr("mediaRange", ByteRange::parse)?,
                index: seg.attr("index").map(str::to_string),
                index_range: seg.parse_attr("indexRange", ByteRange::parse)?,
            });
        }
    }
    Ok(SegmentList { base, duration_seconds, segment_urls })
}

fn parse_content_protection(el: &XmlElement) -> Option<ProtectionMap> {
    if el.attr("schemeIdUri") != Some(YOUTUBE_DRM_SCHEME) {
        trace!("ignoring content protection scheme {:?}", el.attr("schemeIdUri"));
        return None;
    }
    let mut map = ProtectionMap::new();
    for system in el.children_named("yt:SystemURL") {
        if let Some(flavor) = system.attr("type") {
            map.insert(flavor.to_string(), system.text.trim().to_string());
        }
    }
    Some(map)
}

fn parse_representation_base(el: &XmlElement) -> Result<RepresentationBase> {
    let mut base = RepresentationBase {
        id: el.attr("id").map(str::to_string),
        profiles: el.attr("profiles").map(str::to_string),
        width: el.parse_attr("width", parse_u32)?,
        height: el.parse_attr("height", parse_u32)?,
        frame_rate: el.parse_attr("frameRate", parse_frame_rate)?,
        audio_sampling_rate: el.parse_attr("audioSamplingRate", parse_u32)?,
        mime_type: el.attr("mimeType").map(str::to_string),
        codecs: el.attr("codecs").map(str::to_string),
        ..Default::default()
    };

    for child in &el.children {
        match classify(child) {
            DashNode::BaseUrl(url) => base.base_urls.push(url.text.trim().to_string()),
            DashNode::SegmentBase(sb) if base.segment_base.is_none() => {
                base.segment_base = Some(parse_segment_base(sb)?);
            }
            DashNode::SegmentList(sl) if base.segment_list.is_none() => {
                base.segment_list = Some(parse_segment_list(sl)?);
            }
            DashNode::ContentProtection(cp) if base.content_protection.is_none() => {
                base.content_protection = parse_content_protection(cp);
            }
            DashNode::Ignored(name) => trace!("ignoring <{}> in <{}>", name, el.name),
            _ => {}
        }
    }
    Ok(base)
}

// A representation as written in the document, before its segments are derived.
struct ParsedRepresentation {
    base: RepresentationBase,
    bandwidth: u64,
    quality_ranking: Option<u32>,
}

struct ParsedAdaptationSet {
    base: RepresentationBase,
    representations: Vec<ParsedRepresentation>,
}

fn parse_adaptation_set(el: &XmlElement) -> Result<ParsedAdaptationSet> {
    let base = parse_representation_base(el)?;
    let mut representations = Vec::new();
    for child in &el.children {
        if let DashNode::Representation(rep) = classify(child) {
            representations.push(ParsedRepresentation {
                base: parse_representation_base(rep)?,
                bandwidth: rep.require_attr("bandwidth", parse_u64)?,
                quality_ranking: rep.parse_attr("qualityRanking", parse_u32)?,
            });
        }
    }
    Ok(ParsedAdaptationSet { base, representations })
}

/// Decodes an MPD document fetched from `manifest_url`.
pub fn parse(raw: &str, manifest_url: &str) -> Result<Manifest> {
    let root = parse_document(raw)?;
    if root.name != "MPD" {
        return Err(PlayerError::manifest(format!("expected <MPD> root, found <{}>", root.name)));
    }

    let mpd_duration = root.parse_attr("mediaPresentationDuration", parse_duration)?;
    let mpd_base_urls: Vec<String> = root
        .children
        .iter()
        .filter_map(|c| match classify(c) {
            DashNode::BaseUrl(url) => Some(url.text.trim().to_string()),
            _ => None,
        })
        .collect();

    // Only the first period is played.
    let period = root
        .children
        .iter()
        .find_map(|c| match classify(c) {
            DashNode::Period(p) => Some(p),
            _ => None,
        })
        .ok_or_else(|| PlayerError::manifest("MPD has no Period"))?;
    let period_base = parse_representation_base(period)?;
    let period_duration = period.parse_attr("duration", parse_duration)?;
    let duration = mpd_duration.or(period_duration);

    let mut base_url = manifest_url.to_string();
    for level in [&mpd_base_urls, &period_base.base_urls] {
        if let Some(first) = level.first() {
            base_url = resolve_url(&base_url, first)?;
        }
    }

    let mut sets = Vec::new();
    for child in &period.children {
        let DashNode::AdaptationSet(el) = classify(child) else {
            continue;
        };
        let parsed = parse_adaptation_set(el)?;
        let Some(first) = parsed.representations.first() else {
            return Err(PlayerError::manifest("AdaptationSet has no Representation"));
        };

        let mime = parsed
            .base
            .mime_type
            .clone()
            .or_else(|| first.base.mime_type.clone())
            .unwrap_or_default();
        if mime.contains("webm") {
            debug!("skipping webm adaptation set");
            continue;
        }
        let Some(kind) = TrackKind::from_mime(&mime) else {
            debug!("skipping adaptation set with mime '{}'", mime);
            continue;
        };
        let codecs = parsed
            .base
            .codecs
            .clone()
            .or_else(|| first.base.codecs.clone())
            .unwrap_or_default();
        let content_protection = parsed
            .base
            .content_protection
            .clone()
            .or_else(|| first.base.content_protection.clone());

        let set_base_url = match parsed.base.base_urls.first() {
            Some(url) => resolve_url(&base_url, url)?,
            None => base_url.clone(),
        };

        let representations = parsed
            .representations
            .iter()
            .map(|rep| normalize_representation(rep, &parsed.base, &set_base_url, duration))
            .collect::<Result<Vec<_>>>()?;

        sets.push(AdaptationSet { kind, mime, codecs, representations, content_protection });
    }

    if sets.is_empty() {
        return Err(PlayerError::manifest("MPD has no playable adaptation set"));
    }
    let adaptation_sets = select_last_per_kind(sets);

    let duration = match duration {
        Some(d) => d,
        None => adaptation_sets
            .iter()
            .flat_map(|s| s.representations.iter())
            .filter_map(|r| r.segments.last().map(Segment::end_time))
            .fold(0.0, f64::max),
    };

    Ok(Manifest {
        format: StreamFormat::Dash,
        url: manifest_url.to_string(),
        duration,
        adaptation_sets,
        protection: None,
    })
}

fn normalize_representation(
    parsed: &ParsedRepresentation,
    set: &RepresentationBase,
    set_base_url: &str,
    presentation_duration: Option<f64>,
) -> Result<Representation> {
    let rep = &parsed.base;
    let url = match rep.base_urls.first() {
        Some(target) => resolve_url(set_base_url, target)?,
        None => set_base_url.to_string(),
    };

    let mut init = None;
    let mut index_range = None;
    let segments = match rep.segment_list.as_ref().or(set.segment_list.as_ref()) {
        Some(list) => {
            init = list.base.initialization;
            let duration = list.duration_seconds.ok_or_else(|| {
                PlayerError::manifest("SegmentList without a segment duration")
            })?;
            list.segment_urls
                .iter()
                .enumerate()
                .map(|(k, seg)| {
                    let seg_url = match &seg.media {
                        Some(media) => Some(resolve_url(&url, media)?),
                        None => None,
                    };
                    Ok(Segment {
                        time: duration * k as f64,
                        duration,
                        range: seg.media_range,
                        time_ticks: None,
                        index_end: seg.index_range.map(|r| r.end),
                        url: seg_url,
                    })
                })
                .collect::<Result<Vec<_>>>()?
        }
        None => {
            // On-demand profile: the whole presentation is one resource.
            let duration = presentation_duration.ok_or_else(|| {
                PlayerError::manifest("mediaPresentationDuration is required without a SegmentList")
            })?;
            if let Some(base) = rep.segment_base.as_ref().or(set.segment_base.as_ref()) {
                init = base.initialization;
                index_range = base.index_range;
            }
            vec![Segment::timed(0.0, duration)]
        }
    };

    let init_start = init.map(|r| r.start).unwrap_or(0);
    let init_end = init
        .map(|r| r.end)
        .or_else(|| segments.first().and_then(|s| s.index_end));
    let init_range = init_end.map(|end| ByteRange::new(init_start, end));

    Ok(Representation {
        id: rep.id.clone(),
        bandwidth: parsed.bandwidth,
        width: rep.width.or(set.width),
        height: rep.height.or(set.height),
        frame_rate: rep.frame_rate.or(set.frame_rate),
        audio_sampling_rate: rep.audio_sampling_rate.or(set.audio_sampling_rate),
        mime_type: rep.mime_type.clone().or_else(|| set.mime_type.clone()),
        codecs: rep.codecs.clone().or_else(|| set.codecs.clone()),
        quality_ranking: parsed.quality_ranking,
        url,
        segments,
        init_range,
        index_range,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "http://media.example/vod/manifest.mpd";

    const ON_DEMAND: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<MPD xmlns="urn:mpeg:dash:schema:mpd:2011" mediaPresentationDuration="PT1M30.5S" profiles="urn:mpeg:dash:profile:isoff-on-demand:2011">
  <ProgramInformation><Title>ignored</Title></ProgramInformation>
  <Period>
    <AdaptationSet mimeType="video/mp4" codecs="avc1.4d401f">
      <ContentProtection schemeIdUri="http://youtube.com/drm/2012/10/10">
        <yt:SystemURL type="widevine">https://license.example/wv</yt:SystemURL>
        <yt:SystemURL type="clearkey">https://license.example/ck</yt:SystemURL>
      </ContentProtection>
      <Representation id="1" bandwidth="500000" width="640" height="360" frameRate="30000/1001">
        <BaseURL>video_500k.mp4</BaseURL>
        <SegmentBase indexRange="862-1545"><Initialization range="0-861"/></SegmentBase>
      </Representation>
      <Representation id="2" bandwidth="1500000" width="1280" height="720">
        <BaseURL>http://cdn.example/video_1500k.mp4</BaseURL>
        <SegmentBase indexRange="870-1600"/>
      </Representation>
    </AdaptationSet>
    <AdaptationSet mimeType="audio/webm"><Representation bandwidth="1"><BaseURL>a.webm</BaseURL></Representation></AdaptationSet>
    <AdaptationSet>
      <Representation id="a" mimeType="audio/mp4" codecs="mp4a.40.2" bandwidth="128000" audioSamplingRate="44100">
        <BaseURL>audio.mp4</BaseURL>
        <SegmentBase indexRange="700-900"><Initialization range="0-699"/></SegmentBase>
      </Representation>
    </AdaptationSet>
  </Period>
</MPD>"#;

    #[test]
    fn on_demand_manifest_normalizes() {
        let manifest = parse(ON_DEMAND, URL).unwrap();
        assert!((manifest.duration - 90.5).abs() < 1e-3);
        assert_eq!(manifest.adaptation_sets.len(), 2);

        let video = &manifest.adaptation_sets[0];
        assert_eq!(video.kind, TrackKind::Video);
        assert_eq!(video.codecs, "avc1.4d401f");
        assert_eq!(video.bitrates(), vec![500_000, 1_500_000]);
        let protection = video.content_protection.as_ref().unwrap();
        assert_eq!(protection.keys().collect::<Vec<_>>(), vec!["widevine", "clearkey"]);

        let low = &video.representations[0];
        assert_eq!(low.url, "http://media.example/vod/video_500k.mp4");
        assert_eq!(low.init_range, Some(ByteRange::new(0, 861)));
        assert_eq!(low.index_range, Some(ByteRange::new(862, 1545)));
        assert_eq!(low.segments.len(), 1);
        assert!((low.frame_rate.unwrap() - 29.97).abs() < 0.01);

        let high = &video.representations[1];
        assert_eq!(high.url, "http://cdn.example/video_1500k.mp4");
        // without Initialization the init request has no known end
        assert_eq!(high.init_range, None);

        let audio = &manifest.adaptation_sets[1];
        assert_eq!(audio.kind, TrackKind::Audio);
        assert_eq!(audio.mime, "audio/mp4");
        assert_eq!(audio.codecs, "mp4a.40.2");
        assert_eq!(audio.representations[0].audio_sampling_rate, Some(44100));
    }

    #[test]
    fn segment_list_yields_ranged_segments() {
        let mpd = r#"<MPD mediaPresentationDuration="PT6S"><Period><AdaptationSet mimeType="video/mp4">
            <Representation bandwidth="800000"><BaseURL>v.mp4</BaseURL>
              <SegmentList timescale="1000" duration="2000">
                <Initialization range="0-99"/>
                <SegmentURL mediaRange="100-999" indexRange="100-150"/>
                <SegmentURL mediaRange="1000-1999"/>
                <SegmentURL mediaRange="2000-2999"/>
              </SegmentList>
            </Representation></AdaptationSet></Period></MPD>"#;
        let manifest = parse(mpd, URL).unwrap();
        let rep = &manifest.adaptation_sets[0].representations[0];
        assert_eq!(rep.segments.len(), 3);
        assert_eq!(rep.segments[2].time, 4.0);
        assert_eq!(rep.segments[1].duration, 2.0);
        assert_eq!(rep.segments[1].range, Some(ByteRange::new(1000, 1999)));
        assert_eq!(rep.segments[0].index_end, Some(150));
        assert_eq!(rep.init_range, Some(ByteRange::new(0, 99)));
    }

    #[test]
    fn last_adaptation_set_of_a_kind_wins() {
        let mpd = r#"<MPD mediaPresentationDuration="PT10S"><Period>
            <AdaptationSet mimeType="video/mp4"><Representation bandwidth="1"><BaseURL>first.mp4</BaseURL></Representation></AdaptationSet>
            <AdaptationSet mimeType="video/mp4"><Representation bandwidth="2"><BaseURL>second.mp4</BaseURL></Representation></AdaptationSet>
        </Period></MPD>"#;
        let manifest = parse(mpd, URL).unwrap();
        assert_eq!(manifest.adaptation_sets.len(), 1);
        assert_eq!(manifest.adaptation_sets[0].representations[0].bandwidth, 2);
    }

    #[test]
    fn missing_structure_is_a_parse_error() {
        assert!(matches!(parse("<MPD/>", URL), Err(PlayerError::ManifestParse(_))));
        assert!(matches!(
            parse(r#"<MPD mediaPresentationDuration="PT10S"><Period><AdaptationSet mimeType="video/mp4"/></Period></MPD>"#, URL),
            Err(PlayerError::ManifestParse(_))
        ));
        assert!(matches!(
            parse(r#"<MPD mediaPresentationDuration="later"><Period/></MPD>"#, URL),
            Err(PlayerError::ManifestParse(_))
        ));
        assert!(matches!(
            parse(r#"<MPD mediaPresentationDuration="PT1S"><Period><AdaptationSet mimeType="video/mp4"><Representation><BaseURL>v.mp4</BaseURL></Representation></AdaptationSet></Period></MPD>"#, URL),
            Err(PlayerError::ManifestParse(_))
        ));
        assert!(matches!(parse("<SmoothStreamingMedia/>", URL), Err(PlayerError::ManifestParse(_))));
    }
}

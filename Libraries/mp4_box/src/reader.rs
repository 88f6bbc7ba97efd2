use tracing::{debug, trace};

use crate::boxes::{
    avc1::VisualSampleEntry, dinf::DinfBox, dref::DrefBox, edts::EdtsBox, elst::ElstBox, enums::Mp4BoxEnum,
    generic::{BoxHeader, Mp4Box, UnknownBox}, hdlr::HdlrBox, mdat::MdatBox, mdhd::MdhdBox, mdia::MdiaBox,
    mfhd::MfhdBox, minf::MinfBox, moof::MoofBox, moov::MoovBox, mp4a::AudioSampleEntry, mvex::MvexBox,
    mvhd::MvhdBox, pssh::PsshBox, saio::SaioBox, saiz::SaizBox, sidx::SidxBox, smhd::SmhdBox, stbl::StblBox,
    stco::StcoBox, stsc::StscBox, stsd::StsdBox, stss::StssBox, stsz::StszBox, stts::SttsBox, tfdt::TfdtBox,
    tfhd::TfhdBox, tkhd::TkhdBox, traf::TrafBox, trak::TrakBox, trex::TrexBox, trun::TrunBox, vmhd::VmhdBox,
};
use crate::{format_fourcc, Mp4Error, Result};

/// One subsegment listed by a segment index box.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentReference {
    pub size: u64,      // referenced size in bytes
    pub offset: u64,    // absolute byte offset of the subsegment in the resource
    pub duration: f64,  // seconds
    pub time: f64,      // presentation start in seconds
}

pub fn parse_mp4_boxes(mut data: &[u8]) -> Result<Vec<Mp4BoxEnum>> {
    let mut boxes = Vec::new();

    while !data.is_empty() {
        let (mp4_box, consumed) = read_mp4_box(data)?;
        boxes.push(mp4_box);
        data = &data[consumed..];
    }

    Ok(boxes)
}

pub fn read_mp4_box(data: &[u8]) -> Result<(Mp4BoxEnum, usize)> {
    let header = BoxHeader::read(data, 0, data.len())?;

    match &header.box_type {
        b"avc1" | b"encv" => VisualSampleEntry::read_box(data).map(|(b, s)| (Mp4BoxEnum::Avc1(b), s)),
        b"dinf" => DinfBox::read_box(data).map(|(b, s)| (Mp4BoxEnum::Dinf(b), s)),
        b"dref" => DrefBox::read_box(data).map(|(b, s)| (Mp4BoxEnum::Dref(b), s)),
        b"edts" => EdtsBox::read_box(data).map(|(b, s)| (Mp4BoxEnum::Edts(b), s)),
        b"elst" => ElstBox::read_box(data).map(|(b, s)| (Mp4BoxEnum::Elst(b), s)),
        b"hdlr" => HdlrBox::read_box(data).map(|(b, s)| (Mp4BoxEnum::Hdlr(b), s)),
        b"mdat" => MdatBox::read_box(data).map(|(b, s)| (Mp4BoxEnum::Mdat(b), s)),
        b"mdhd" => MdhdBox::read_box(data).map(|(b, s)| (Mp4BoxEnum::Mdhd(b), s)),
        b"mdia" => MdiaBox::read_box(data).map(|(b, s)| (Mp4BoxEnum::Mdia(b), s)),
        b"mfhd" => MfhdBox::read_box(data).map(|(b, s)| (Mp4BoxEnum::Mfhd(b), s)),
        b"minf" => MinfBox::read_box(data).map(|(b, s)| (Mp4BoxEnum::Minf(b), s)),
        b"moof" => MoofBox::read_box(data).map(|(b, s)| (Mp4BoxEnum::Moof(b), s)),
        b"moov" => MoovBox::read_box(data).map(|(b, s)| (Mp4BoxEnum::Moov(b), s)),
        b"mp4a" | b"enca" => AudioSampleEntry::read_box(data).map(|(b, s)| (Mp4BoxEnum::Mp4a(b), s)),
        b"mvex" => MvexBox::read_box(data).map(|(b, s)| (Mp4BoxEnum::Mvex(b), s)),
        b"mvhd" => MvhdBox::read_box(data).map(|(b, s)| (Mp4BoxEnum::Mvhd(b), s)),
        b"pssh" => PsshBox::read_box(data).map(|(b, s)| (Mp4BoxEnum::Pssh(b), s)),
        b"saio" => SaioBox::read_box(data).map(|(b, s)| (Mp4BoxEnum::Saio(b), s)),
        b"saiz" => SaizBox::read_box(data).map(|(b, s)| (Mp4BoxEnum::Saiz(b), s)),
        b"sidx" => SidxBox::read_box(data).map(|(b, s)| (Mp4BoxEnum::Sidx(b), s)),
        b"smhd" => SmhdBox::read_box(data).map(|(b, s)| (Mp4BoxEnum::Smhd(b), s)),
        b"stbl" => StblBox::read_box(data).map(|(b, s)| (Mp4BoxEnum::Stbl(b), s)),
        b"stco" => StcoBox::read_box(data).map(|(b, s)| (Mp4BoxEnum::Stco(b), s)),
        b"stsc" => StscBox::read_box(data).map(|(b, s)| (Mp4BoxEnum::Stsc(b), s)),
        b"stsd" => StsdBox::read_box(data).map(|(b, s)| (Mp4BoxEnum::Stsd(b), s)),
        b"stss" => StssBox::read_box(data).map(|(b, s)| (Mp4BoxEnum::Stss(b), s)),
        b"stsz" => StszBox::read_box(data).map(|(b, s)| (Mp4BoxEnum::Stsz(b), s)),
        b"stts" => SttsBox::read_box(data).map(|(b, s)| (Mp4BoxEnum::Stts(b), s)),
        b"tfdt" => TfdtBox::read_box(data).map(|(b, s)| (Mp4BoxEnum::Tfdt(b), s)),
        b"tfhd" => TfhdBox::read_box(data).map(|(b, s)| (Mp4BoxEnum::Tfhd(b), s)),
        b"tkhd" => TkhdBox::read_box(data).map(|(b, s)| (Mp4BoxEnum::Tkhd(b), s)),
        b"traf" => TrafBox::read_box(data).map(|(b, s)| (Mp4BoxEnum::Traf(b), s)),
        b"trak" => TrakBox::read_box(data).map(|(b, s)| (Mp4BoxEnum::Trak(b), s)),
        b"trex" => TrexBox::read_box(data).map(|(b, s)| (Mp4BoxEnum::Trex(b), s)),
        b"trun" => TrunBox::read_box(data).map(|(b, s)| (Mp4BoxEnum::Trun(b), s)),
        b"vmhd" => VmhdBox::read_box(data).map(|(b, s)| (Mp4BoxEnum::Vmhd(b), s)),
        _ => UnknownBox::read_box(data).map(|(b, s)| (Mp4BoxEnum::Unknown(b), s)),
    }
}

/// Returns the bytes in front of the first `sidx` or `moof` box.
///
/// When neither box shows up the whole buffer is initialization data.
pub fn extract_init_segment(data: &[u8]) -> Result<&[u8]> {
    let mut offset = 0;
    while offset < data.len() {
        let header = BoxHeader::read(data, offset, data.len())?;
        if &header.box_type == b"sidx" || &header.box_type == b"moof" {
            trace!(init_size = offset, boundary = %format_fourcc(&header.box_type), "found end of init segment");
            return Ok(&data[..offset]);
        }
        offset = header.end();
    }
    debug!(size = data.len(), "no sidx or moof found, whole buffer is init data");
    Ok(data)
}

/// Decodes the first `sidx` box of `data` into subsegment references.
///
/// `base_offset` is the position of `data[0]` within the resource, so the returned offsets can
/// be used directly as byte ranges.
pub fn parse_segment_index(data: &[u8], base_offset: u64) -> Result<Vec<SegmentReference>> {
    let mut offset = 0;
    let header = loop {
        if offset >= data.len() {
            return Err(Mp4Error::malformed("no sidx box found"));
        }
        let header = BoxHeader::read(data, offset, data.len())?;
        if &header.box_type == b"sidx" {
            break header;
        }
        offset = header.end();
    };

    let (sidx, _) = SidxBox::read_box(&data[header.start..header.end()])?;
    if sidx.timescale == 0 {
        return Err(Mp4Error::malformed("sidx timescale is zero"));
    }
    let timescale = sidx.timescale as f64;

    let mut position = (header.end() as u64)
        .checked_add(base_offset)
        .and_then(|p| p.checked_add(sidx.first_offset))
        .ok_or_else(|| Mp4Error::malformed(format!("sidx first offset {} overflows", sidx.first_offset)))?;
    let mut time = sidx.earliest_presentation_time as f64 / timescale;
    let mut references = Vec::with_capacity(sidx.references.len());

    for reference in &sidx.references {
        if reference.reference_type {
            return Err(Mp4Error::unsupported("sidx references another sidx"));
        }
        let size = reference.referenced_size as u64;
        let duration = reference.subsegment_duration as f64 / timescale;
        references.push(SegmentReference { size, offset: position, duration, time });
        position = position
            .checked_add(size)
            .ok_or_else(|| Mp4Error::malformed(format!("sidx reference at {} overflows", position)))?;
        time += duration;
    }

    debug!(count = references.len(), base_offset, "parsed segment index");
    Ok(references)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boxes::sidx::SidxReference;

    fn raw_box(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
        out.extend_from_slice(kind);
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn init_segment_stops_at_sidx() {
        let mut data = raw_box(b"ftyp", b"iso6avc1");
        data.extend(raw_box(b"moov", &[0; 16]));
        let init_len = data.len();
        data.extend(raw_box(b"sidx", &[0; 24]));
        data.extend(raw_box(b"moof", &[0; 8]));

        assert_eq!(extract_init_segment(&data).unwrap().len(), init_len);
    }

    #[test]
    fn init_segment_without_boundary_is_whole_buffer() {
        let data = raw_box(b"moov", &[1; 32]);
        assert_eq!(extract_init_segment(&data).unwrap(), &data[..]);
    }

    #[test]
    fn zero_sized_box_is_fatal() {
        let mut data = raw_box(b"ftyp", b"dash");
        data.extend_from_slice(&[0, 0, 0, 0, b'm', b'o', b'o', b'v']);
        assert!(matches!(extract_init_segment(&data), Err(Mp4Error::Malformed(_))));
    }

    #[test]
    fn segment_index_with_base_offset() {
        let sidx = SidxBox {
            version: 1,
            reference_id: 1,
            timescale: 1000,
            earliest_presentation_time: 500,
            first_offset: 10,
            references: vec![
                SidxReference { referenced_size: 100, subsegment_duration: 2000, ..SidxReference::default() },
                SidxReference { referenced_size: 200, subsegment_duration: 3000, ..SidxReference::default() },
            ],
        };
        let mut data = Vec::new();
        sidx.write_box(&mut data);
        let sidx_end = data.len() as u64;

        let refs = parse_segment_index(&data, 1000).unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].offset, 1000 + sidx_end + 10);
        assert_eq!(refs[1].offset, refs[0].offset + 100);
        assert_eq!(refs[0].time, 0.5);
        assert_eq!(refs[1].time, 2.5);
        assert_eq!(refs[1].duration, 3.0);
    }

    #[test]
    fn segment_index_offset_overflow_is_malformed() {
        let mut sidx = SidxBox {
            version: 1,
            timescale: 1000,
            first_offset: u64::MAX,
            references: vec![SidxReference { referenced_size: 100, subsegment_duration: 2000, ..SidxReference::default() }],
            ..SidxBox::default()
        };
        let mut data = Vec::new();
        sidx.write_box(&mut data);
        assert!(matches!(parse_segment_index(&data, 1000), Err(Mp4Error::Malformed(_))));

        // the first reference starts in range, the running position does not stay there
        sidx.first_offset = 0;
        let mut data = Vec::new();
        sidx.write_box(&mut data);
        let base_offset = u64::MAX - 50 - data.len() as u64;
        assert!(matches!(parse_segment_index(&data, base_offset), Err(Mp4Error::Malformed(_))));
    }

    #[test]
    fn indirect_reference_is_unsupported() {
        let sidx = SidxBox {
            timescale: 1,
            references: vec![SidxReference { reference_type: true, referenced_size: 8, ..SidxReference::default() }],
            ..SidxBox::default()
        };
        let mut data = Vec::new();
        sidx.write_box(&mut data);
        assert!(matches!(parse_segment_index(&data, 0), Err(Mp4Error::Unsupported(_))));
    }

    #[test]
    fn missing_sidx_is_malformed() {
        let data = raw_box(b"moov", &[0; 8]);
        assert!(matches!(parse_segment_index(&data, 0), Err(Mp4Error::Malformed(_))));
    }

    #[test]
    fn truncated_reference_table_is_malformed() {
        let sidx = SidxBox {
            timescale: 1,
            references: vec![SidxReference { referenced_size: 8, ..SidxReference::default() }],
            ..SidxBox::default()
        };
        let mut data = Vec::new();
        sidx.write_box(&mut data);
        // claim one more reference than the box holds
        let count_pos = data.len() - 12 - 2;
        data[count_pos + 1] = 2;
        assert!(matches!(parse_segment_index(&data, 0), Err(Mp4Error::Malformed(_))));
    }
}

use super::{
    avc1::VisualSampleEntry, dinf::DinfBox, dref::DrefBox, edts::EdtsBox, elst::ElstBox, generic::UnknownBox,
    hdlr::HdlrBox, mdat::MdatBox, mdhd::MdhdBox, mdia::MdiaBox, mfhd::MfhdBox, minf::MinfBox, moof::MoofBox,
    moov::MoovBox, mp4a::AudioSampleEntry, mvex::MvexBox, mvhd::MvhdBox, pssh::PsshBox, saio::SaioBox,
    saiz::SaizBox, sidx::SidxBox, smhd::SmhdBox, stbl::StblBox, stco::StcoBox, stsc::StscBox, stsd::StsdBox,
    stss::StssBox, stsz::StszBox, stts::SttsBox, tfdt::TfdtBox, tfhd::TfhdBox, tkhd::TkhdBox, traf::TrafBox,
    trak::TrakBox, trex::TrexBox, trun::TrunBox, vmhd::VmhdBox,
};

// Any box `read_mp4_box` knows how to decode, plus `Unknown` for the rest.
#[derive(Debug, Clone)]
pub enum Mp4BoxEnum {
    Avc1(VisualSampleEntry),
    Dinf(DinfBox),
    Dref(DrefBox),
    Edts(EdtsBox),
    Elst(ElstBox),
    Hdlr(HdlrBox),
    Mdat(MdatBox),
    Mdhd(MdhdBox),
    Mdia(MdiaBox),
    Mfhd(MfhdBox),
    Minf(MinfBox),
    Moof(MoofBox),
    Moov(MoovBox),
    Mp4a(AudioSampleEntry),
    Mvex(MvexBox),
    Mvhd(MvhdBox),
    Pssh(PsshBox),
    Saio(SaioBox),
    Saiz(SaizBox),
    Sidx(SidxBox),
    Smhd(SmhdBox),
    Stbl(StblBox),
    Stco(StcoBox),
    Stsc(StscBox),
    Stsd(StsdBox),
    Stss(StssBox),
    Stsz(StszBox),
    Stts(SttsBox),
    Tfdt(TfdtBox),
    Tfhd(TfhdBox),
    Tkhd(TkhdBox),
    Traf(TrafBox),
    Trak(TrakBox),
    Trex(TrexBox),
    Trun(TrunBox),
    Vmhd(VmhdBox),
    Unknown(UnknownBox),
}

impl Mp4BoxEnum {
    pub fn box_type(&self) -> [u8; 4] {
        use super::generic::Mp4Box;
        match self {
            Mp4BoxEnum::Avc1(b) => b.box_type(),
            Mp4BoxEnum::Dinf(b) => b.box_type(),
            Mp4BoxEnum::Dref(b) => b.box_type(),
            Mp4BoxEnum::Edts(b) => b.box_type(),
            Mp4BoxEnum::Elst(b) => b.box_type(),
            Mp4BoxEnum::Hdlr(b) => b.box_type(),
            Mp4BoxEnum::Mdat(b) => b.box_type(),
            Mp4BoxEnum::Mdhd(b) => b.box_type(),
            Mp4BoxEnum::Mdia(b) => b.box_type(),
            Mp4BoxEnum::Mfhd(b) => b.box_type(),
            Mp4BoxEnum::Minf(b) => b.box_type(),
            Mp4BoxEnum::Moof(b) => b.box_type(),
            Mp4BoxEnum::Moov(b) => b.box_type(),
            Mp4BoxEnum::Mp4a(b) => b.box_type(),
            Mp4BoxEnum::Mvex(b) => b.box_type(),
            Mp4BoxEnum::Mvhd(b) => b.box_type(),
            Mp4BoxEnum::Pssh(b) => b.box_type(),
            Mp4BoxEnum::Saio(b) => b.box_type(),
            Mp4BoxEnum::Saiz(b) => b.box_type(),
            Mp4BoxEnum::Sidx(b) => b.box_type(),
            Mp4BoxEnum::Smhd(b) => b.box_type(),
            Mp4BoxEnum::Stbl(b) => b.box_type(),
            Mp4BoxEnum::Stco(b) => b.box_type(),
            Mp4BoxEnum::Stsc(b) => b.box_type(),
            Mp4BoxEnum::Stsd(b) => b.box_type(),
            Mp4BoxEnum::Stss(b) => b.box_type(),
            Mp4BoxEnum::Stsz(b) => b.box_type(),
            Mp4BoxEnum::Stts(b) => b.box_type(),
            Mp4BoxEnum::Tfdt(b) => b.box_type(),
            Mp4BoxEnum::Tfhd(b) => b.box_type(),
            Mp4BoxEnum::Tkhd(b) => b.box_type(),
            Mp4BoxEnum::Traf(b) => b.box_type(),
            Mp4BoxEnum::Trak(b) => b.box_type(),
            Mp4BoxEnum::Trex(b) => b.box_type(),
            Mp4BoxEnum::Trun(b) => b.box_type(),
            Mp4BoxEnum::Vmhd(b) => b.box_type(),
            Mp4BoxEnum::Unknown(b) => b.box_type(),
        }
    }
}

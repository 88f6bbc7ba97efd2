use mp4_box::boxes::generic::Mp4Box;
use mp4_box::boxes::mdat::MdatBox;
use mp4_box::boxes::moof::MoofBox;
use mp4_box::boxes::sidx::{SidxBox, SidxReference};
use mp4_box::boxes::traf::TrafBox;
use mp4_box::boxes::trun::{TrunBox, TrunSample};
use mp4_box::fragment::rewrite_fragment_for_playback;
use mp4_box::reader::{extract_init_segment, parse_mp4_boxes, parse_segment_index};
use mp4_box::writer::{synthesize_init_segment, AudioParams, TrackInfo, TrackParams};
use mp4_box::Mp4Error;

fn audio_init() -> Vec<u8> {
    synthesize_init_segment(&TrackInfo {
        params: TrackParams::Audio(AudioParams {
            sample_rate: 48_000,
            audio_specific_config: vec![0x11, 0x90],
        }),
        protection: None,
    })
}

fn fragment(payload: &[u8], track_id: u32) -> Vec<u8> {
    let mut traf = TrafBox::default();
    traf.tfhd.track_id = track_id;
    traf.trun = Some(TrunBox {
        samples: vec![TrunSample { size: payload.len() as u32, ..Default::default() }],
        ..Default::default()
    });
    let mut moof = MoofBox::default();
    moof.mfhd.sequence_number = 7;
    moof.trafs.push(traf);

    let data_offset = moof.box_size() as i32 + 8;
    if let Some(trun) = moof.trafs[0].trun.as_mut() {
        trun.data_offset = Some(data_offset);
    }

    let mut out = Vec::new();
    moof.write_box(&mut out);
    MdatBox { data: payload.to_vec() }.write_box(&mut out);
    out
}

#[test]
fn synthesized_init_is_its_own_initialization_data() {
    let init = audio_init();
    assert_eq!(extract_init_segment(&init).unwrap(), &init[..]);
    assert_eq!(parse_mp4_boxes(&init).unwrap().len(), 1);
}

#[test]
fn initialization_data_stops_at_first_fragment() {
    let init = audio_init();
    let mut file = init.clone();
    file.extend(fragment(&[1, 2, 3, 4], 1));
    assert_eq!(extract_init_segment(&file).unwrap(), &init[..]);
}

#[test]
fn segment_index_references_cover_the_indexed_range() {
    let sidx = SidxBox {
        version: 0,
        reference_id: 1,
        timescale: 1000,
        earliest_presentation_time: 500,
        first_offset: 0,
        references: vec![
            SidxReference { referenced_size: 1200, subsegment_duration: 2000, sap: 0x9000_0000, ..Default::default() },
            SidxReference { referenced_size: 800, subsegment_duration: 1500, sap: 0x9000_0000, ..Default::default() },
        ],
    };
    let mut data = Vec::new();
    sidx.write_box(&mut data);
    let sidx_len = data.len() as u64;

    let references = parse_segment_index(&data, 862).unwrap();
    assert_eq!(references.len(), 2);
    assert_eq!(references[0].offset, 862 + sidx_len);
    assert_eq!(references[0].size, 1200);
    assert_eq!(references[1].offset, 862 + sidx_len + 1200);
    assert!((references[0].time - 0.5).abs() < 1e-9);
    assert!((references[1].time - 2.5).abs() < 1e-9);
    assert!((references[1].duration - 1.5).abs() < 1e-9);
}

#[test]
fn rewritten_fragment_points_at_its_samples() {
    let payload = [0xAA, 0xBB, 0xCC, 0xDD];
    let original = fragment(&payload, 3);
    let rewritten = rewrite_fragment_for_playback(&original, 20_000_000, false).unwrap();
    assert_eq!(rewritten.len(), original.len() + 20);

    let (moof, moof_size) = MoofBox::read_box(&rewritten).unwrap();
    let traf = &moof.trafs[0];
    assert_eq!(traf.tfhd.track_id, 1);
    assert_eq!(traf.tfdt.as_ref().unwrap().base_decode_time, 20_000_000);

    let data_offset = traf.trun.as_ref().unwrap().data_offset.unwrap() as usize;
    assert_eq!(data_offset, moof_size + 8);
    assert_eq!(&rewritten[data_offset..data_offset + 4], &payload);
}

#[test]
fn truncated_fragment_is_rejected() {
    let original = fragment(&[1, 2, 3, 4], 1);
    let truncated = &original[..original.len() - 30];
    assert!(matches!(
        rewrite_fragment_for_playback(truncated, 0, false),
        Err(Mp4Error::Malformed(_))
    ));
}

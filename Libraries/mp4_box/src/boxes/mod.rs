// Box types of a fragmented MP4 stream, one module per box.
//
// Initialization segment:
// - `moov`, `mvhd`, `trak`, `tkhd`, `edts`, `elst`, `mdia`, `mdhd`, `hdlr`, `minf`, `vmhd`, `smhd`,
//   `dinf`, `dref`, `stbl`, `stsd`, `stts`, `stsc`, `stco`, `stsz`, `stss`, `mvex`, `trex`.
// - Sample entries: `avc1` (visual, also `encv`) with `avcc`, `mp4a` (audio, also `enca`) with `esds`.
// - Protection: `pssh` at movie level, `sinf` with its `tenc` inside protected sample entries.
//
// Media segments:
// - `sidx`: segment index preceding the fragments of an on-demand stream.
// - `moof`, `mfhd`, `traf`, `tfhd`, `tfdt`, `trun`, `mdat`.
// - `saiz`, `saio`: auxiliary information locating per-sample IVs.
// - `piff`: the `uuid` sample encryption box of Smooth Streaming fragments.
//
// `generic` holds the `Mp4Box` trait and the header scanning helpers shared by all of them.

pub mod avc1;
pub mod avcc;
pub mod dinf;
pub mod dref;
pub mod edts;
pub mod elst;
pub mod enums;
pub mod esds;
pub mod generic;
pub mod hdlr;
pub mod mdat;
pub mod mdhd;
pub mod mdia;
pub mod mfhd;
pub mod minf;
pub mod moof;
pub mod moov;
pub mod mp4a;
pub mod mvex;
pub mod mvhd;
pub mod piff;
pub mod pssh;
pub mod saio;
pub mod saiz;
pub mod sidx;
pub mod sinf;
pub mod smhd;
pub mod stbl;
pub mod stco;
pub mod stsc;
pub mod stsd;
pub mod stss;
pub mod stsz;
pub mod stts;
pub mod tenc;
pub mod tfdt;
pub mod tfhd;
pub mod tkhd;
pub mod traf;
pub mod trak;
pub mod trex;
pub mod trun;
pub mod vmhd;

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use stream_player::manifest::TrackKind;
use stream_player::sink::BufferedRanges;
use stream_player::{MediaSink, PlayerError, TimeRange};
use tracing::{debug, info, warn};

/// Media sink that writes every track to `<dir>/<track>.mp4`, exactly as appended.
///
/// The file of a track is created on its first append. Buffered time ranges are tracked in
/// memory only.
#[derive(Debug)]
pub struct FileSink {
    dir: PathBuf,
    files: HashMap<TrackKind, File>,
    ranges: HashMap<TrackKind, BufferedRanges>,
    written: HashMap<TrackKind, u64>,
    open: bool,
}

impl FileSink {
    pub fn create(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(FileSink {
            dir,
            files: HashMap::new(),
            ranges: HashMap::new(),
            written: HashMap::new(),
            open: true,
        })
    }

    pub fn path(&self, track: TrackKind) -> PathBuf {
        self.dir.join(format!("{}.mp4", track))
    }

    pub fn bytes_written(&self, track: TrackKind) -> u64 {
        self.written.get(&track).copied().unwrap_or(0)
    }

    fn file(&mut self, track: TrackKind) -> io::Result<&mut File> {
        let path = self.path(track);
        match self.files.entry(track) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                info!("Writing {} track to {}", track, path.display());
                Ok(entry.insert(File::create(&path)?))
            }
        }
    }
}

impl MediaSink for FileSink {
    fn append(&mut self, track: TrackKind, data: &[u8], span: Option<TimeRange>) -> stream_player::Result<()> {
        if !self.open {
            return Err(PlayerError::transport(format!("{} append after end of stream", track)));
        }
        self.file(track)
            .and_then(|file| file.write_all(data))
            .map_err(|e| PlayerError::transport(format!("writing {} track: {}", track, e)))?;
        *self.written.entry(track).or_default() += data.len() as u64;
        if let Some(span) = span {
            self.ranges.entry(track).or_default().insert(span);
        }
        Ok(())
    }

    fn buffered(&self, track: TrackKind) -> Vec<TimeRange> {
        self.ranges
            .get(&track)
            .map(|r| r.ranges().to_vec())
            .unwrap_or_default()
    }

    fn abort(&mut self, track: TrackKind) {
        // bytes already on disk stay, the next append restarts with an initialization segment
        debug!("{} append aborted", track);
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn end_of_stream(&mut self) {
        for (track, file) in &mut self.files {
            if let Err(e) = file.flush() {
                warn!("Failed to flush {} track: {}", track, e);
            }
        }
        for (track, written) in &self.written {
            info!("{} track complete: {} bytes", track, written);
        }
        self.open = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_are_written_to_their_own_files() {
        let dir = std::env::temp_dir().join(format!("stream-client-sink-{}", std::process::id()));
        let mut sink = FileSink::create(&dir).unwrap();

        sink.append(TrackKind::Video, b"init", None).unwrap();
        sink.append(TrackKind::Video, b"media-0", Some(TimeRange::new(0.0, 2.0))).unwrap();
        sink.append(TrackKind::Video, b"media-1", Some(TimeRange::new(2.0, 4.0))).unwrap();
        sink.append(TrackKind::Audio, b"audio", Some(TimeRange::new(0.0, 2.0))).unwrap();

        assert_eq!(sink.buffered(TrackKind::Video), vec![TimeRange::new(0.0, 4.0)]);
        assert_eq!(sink.bytes_written(TrackKind::Video), 18);

        sink.end_of_stream();
        assert!(!sink.is_open());
        assert!(sink.append(TrackKind::Audio, b"late", None).is_err());

        assert_eq!(fs::read(sink.path(TrackKind::Video)).unwrap(), b"initmedia-0media-1");
        assert_eq!(fs::read(dir.join("audio.mp4")).unwrap(), b"audio");
        fs::remove_dir_all(&dir).unwrap();
    }
}

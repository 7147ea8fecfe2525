use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::pcm::{PcmBuffer, PcmFormat};
use super::AudioError;

/// File extensions picked up when scanning a directory for tracks.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "ogg", "m4a"];

pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| AUDIO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Decode the first audio track of `path` into interleaved 16-bit PCM.
///
/// The stream's channel count and sample rate are checked against `format`
/// before any packet is decoded; no resampling or remixing happens here.
pub fn decode_audio(path: &Path, format: PcmFormat) -> Result<PcmBuffer, AudioError> {
    let decode_err = |message: String| AudioError::Decode {
        path: path.to_path_buf(),
        message,
    };

    let file = std::fs::File::open(path).map_err(|source| AudioError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| decode_err(format!("failed to probe audio format: {e}")))?;

    let mut reader = probed.format;

    let track = reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or_else(|| decode_err("no audio tracks found".into()))?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| decode_err("unknown sample rate".into()))?;
    let mut channels = track.codec_params.channels.map(|c| c.count() as u16);
    if let Some(ch) = channels {
        format.check(ch, sample_rate)?;
    }

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| decode_err(format!("failed to create audio decoder: {e}")))?;

    let mut samples: Vec<i16> = Vec::new();

    loop {
        let packet = match reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(decode_err(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(msg)) => {
                log::debug!("Skipping undecodable packet in {}: {}", path.display(), msg);
                continue;
            }
            Err(e) => return Err(decode_err(e.to_string())),
        };

        let spec = *decoded.spec();
        if channels.is_none() {
            let ch = spec.channels.count() as u16;
            format.check(ch, spec.rate)?;
            channels = Some(ch);
        }

        let mut sample_buf = SampleBuffer::<i16>::new(decoded.frames() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(sample_buf.samples());
    }

    let channels = channels.unwrap_or(format.channels);
    let pcm = PcmBuffer::new(samples, channels, sample_rate, format)?;

    log::info!(
        "Decoded {}: {} frames, {}Hz, {:.1}s",
        path.display(),
        pcm.frames(),
        pcm.sample_rate(),
        pcm.duration_secs()
    );

    Ok(pcm)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, channels: u16, sample_rate: u32, frames: usize) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..frames {
            for c in 0..channels {
                writer.write_sample(((i * 37 + c as usize) % 2000) as i16 - 1000).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn decodes_reference_stereo_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("track.wav");
        write_wav(&path, 2, 44_100, 4096);

        let pcm = decode_audio(&path, PcmFormat::REFERENCE).unwrap();
        assert_eq!(pcm.frames(), 4096);
        assert_eq!(pcm.channels(), 2);
        // frame 1: left = 37 - 1000, right = 38 - 1000
        assert_eq!(pcm.frame_sum(1), (37 - 1000) + (38 - 1000));
    }

    #[test]
    fn rejects_mono_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        write_wav(&path, 1, 44_100, 1024);

        let err = decode_audio(&path, PcmFormat::REFERENCE).unwrap_err();
        assert!(matches!(err, AudioError::UnsupportedFormat { channels: 1, .. }));
    }

    #[test]
    fn rejects_other_sample_rates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hi.wav");
        write_wav(&path, 2, 48_000, 1024);

        let err = decode_audio(&path, PcmFormat::REFERENCE).unwrap_err();
        assert!(matches!(err, AudioError::UnsupportedFormat { sample_rate: 48_000, .. }));
    }

    #[test]
    fn missing_file_is_open_error() {
        let err = decode_audio(Path::new("/nonexistent/x.wav"), PcmFormat::REFERENCE).unwrap_err();
        assert!(matches!(err, AudioError::Open { .. }));
    }

    #[test]
    fn audio_extensions_are_case_insensitive() {
        assert!(is_audio_file(Path::new("a/Song.FLAC")));
        assert!(!is_audio_file(Path::new("a/song.freq")));
    }
}

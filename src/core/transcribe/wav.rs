//! WAV framing for raw PCM chunks.
//!
//! Client audio is 16-bit signed little-endian mono at 16kHz with no
//! container. The transcription API wants a file, so chunks get a canonical
//! 44-byte RIFF header in front.

/// Sample rate of client microphone audio.
pub const PCM_SAMPLE_RATE: u32 = 16_000;
pub const PCM_CHANNELS: u16 = 1;
pub const PCM_BITS_PER_SAMPLE: u16 = 16;

pub const WAV_HEADER_LEN: usize = 44;

/// Build a 44-byte PCM WAV header for `data_size` bytes of samples.
pub fn create_header(
    data_size: u32,
    sample_rate: u32,
    channels: u16,
    bits_per_sample: u16,
) -> [u8; WAV_HEADER_LEN] {
    let byte_rate = sample_rate * u32::from(channels) * u32::from(bits_per_sample) / 8;
    let block_align = channels * bits_per_sample / 8;
    // RIFF size excludes the 8-byte "RIFF" + size prefix
    let riff_size = 36u32.saturating_add(data_size);

    let mut header = [0u8; WAV_HEADER_LEN];

    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&riff_size.to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&1u16.to_le_bytes()); // PCM
    header[22..24].copy_from_slice(&channels.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&bits_per_sample.to_le_bytes());

    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_size.to_le_bytes());

    header
}

/// Wrap client PCM in a WAV container.
///
/// A trailing odd byte cannot form a 16-bit sample and is dropped.
pub fn pcm_to_wav(pcm: &[u8]) -> Vec<u8> {
    let usable = pcm.len() - pcm.len() % usize::from(PCM_BITS_PER_SAMPLE / 8);
    let samples = &pcm[..usable];
    let data_size = u32::try_from(samples.len()).unwrap_or(u32::MAX);

    let header = create_header(data_size, PCM_SAMPLE_RATE, PCM_CHANNELS, PCM_BITS_PER_SAMPLE);
    let mut wav = Vec::with_capacity(WAV_HEADER_LEN + samples.len());
    wav.extend_from_slice(&header);
    wav.extend_from_slice(samples);
    wav
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_header_layout() {
        let header = create_header(1000, 16000, 1, 16);
        assert_eq!(&header[0..4], b"RIFF");
        assert_eq!(&header[8..12], b"WAVE");
        assert_eq!(&header[36..40], b"data");
        assert_eq!(u32::from_le_bytes(header[4..8].try_into().unwrap()), 1036);
        assert_eq!(u32::from_le_bytes(header[28..32].try_into().unwrap()), 32000);
        assert_eq!(u32::from_le_bytes(header[40..44].try_into().unwrap()), 1000);
    }

    #[test]
    fn test_readable_by_hound() {
        let samples: Vec<i16> = vec![0, 1000, -1000, i16::MAX, i16::MIN];
        let pcm: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();

        let wav = pcm_to_wav(&pcm);
        let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.sample_rate, PCM_SAMPLE_RATE);
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.bits_per_sample, 16);

        let decoded: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded, samples);
    }

    #[test]
    fn test_odd_byte_dropped() {
        let wav = pcm_to_wav(&[1, 2, 3]);
        assert_eq!(wav.len(), WAV_HEADER_LEN + 2);
    }
}

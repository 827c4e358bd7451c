// Unit tests for the PCM codec and the audio buffer decoder.

use base64::Engine;
use viva_coach::audio::pcm;
use viva_coach::audio::playback::decode_audio_data;

#[test]
fn test_pcm_round_trip_within_quantization_bound() {
    let samples: Vec<f32> = (0..1000).map(|i| (i as f32 / 500.0) - 1.0).collect();

    let bytes = pcm::encode_pcm(&samples);
    assert_eq!(bytes.len(), samples.len() * 2);

    let decoded = pcm::pcm_to_f32(&bytes);
    assert_eq!(decoded.len(), samples.len());
    for (original, restored) in samples.iter().zip(&decoded) {
        assert!(
            (original - restored).abs() <= 1.0 / 32768.0,
            "sample {} came back as {}",
            original,
            restored
        );
    }
}

#[test]
fn test_encode_clamps_out_of_range_samples() {
    let bytes = pcm::encode_pcm(&[2.0, -3.5]);
    let decoded = pcm::pcm_to_f32(&bytes);

    assert!((decoded[0] - 1.0).abs() <= 1.0 / 32768.0);
    assert!((decoded[1] + 1.0).abs() <= 1.0 / 32768.0);
}

#[test]
fn test_base64_round_trip_including_empty() {
    for bytes in [vec![], vec![0u8], vec![1, 2, 3, 254, 255]] {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
        let decoded = pcm::decode_base64(&encoded).expect("valid base64");
        assert_eq!(decoded, bytes);
    }
}

#[test]
fn test_malformed_base64_is_an_error() {
    assert!(pcm::decode_base64("not!!valid@@base64").is_err());
}

#[test]
fn test_blob_carries_mime_tag_and_decodable_payload() {
    let blob = pcm::encode_blob(&[0.0, 0.5, -0.5], 16_000);

    assert_eq!(blob.mime_type, "audio/pcm;rate=16000");
    let bytes = pcm::decode_base64(&blob.data).expect("blob payload is base64");
    assert_eq!(bytes.len(), 6);
}

#[test]
fn test_decoder_truncates_trailing_incomplete_sample() {
    // Two full samples plus one dangling byte.
    let buffer = decode_audio_data(&[0x00, 0x40, 0x00, 0xC0, 0x7F], 24_000, 1);
    assert_eq!(buffer.samples.len(), 2);
}

#[test]
fn test_decoder_accepts_empty_input() {
    let buffer = decode_audio_data(&[], 24_000, 1);
    assert!(buffer.is_empty());
    assert_eq!(buffer.duration_secs(), 0.0);
}

#[test]
fn test_buffer_duration_from_sample_count() {
    // 24000 mono frames at 24kHz is exactly one second.
    let bytes = vec![0u8; 24_000 * 2];
    let buffer = decode_audio_data(&bytes, 24_000, 1);
    assert!((buffer.duration_secs() - 1.0).abs() < 1e-9);
}

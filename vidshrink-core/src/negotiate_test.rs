use proptest::prelude::*;

use super::*;
use crate::testing::FnProbe;

// ============================================================================
// Candidate lists
// ============================================================================

#[test]
fn test_fps_candidates() {
    assert_eq!(fps_candidates(60), vec![60, 30, 24]);
    assert_eq!(fps_candidates(30), vec![30, 24]);
    assert_eq!(fps_candidates(24), vec![24, 30]);
    assert_eq!(fps_candidates(0), vec![30, 24]);
}

#[test]
fn test_bitrate_ladder_steps_down() {
    assert_eq!(
        bitrate_ladder(2_500_000),
        vec![2_500_000, 1_750_000, 1_225_000, 857_500]
    );
}

#[test]
fn test_bitrate_ladder_floor() {
    assert_eq!(bitrate_ladder(400_000), vec![400_000, 300_000, 300_000, 300_000]);
    assert_eq!(bitrate_ladder(100_000), vec![300_000; 4]);
}

#[test]
fn test_avc_codec_parse() {
    let high = AvcCodec::parse("avc1.64001F").unwrap();
    assert_eq!(high.profile_name(), Some("high"));
    assert_eq!(high.level(), "3.1");

    let baseline = AvcCodec::parse("avc1.42E01E").unwrap();
    assert_eq!(baseline.profile_name(), Some("baseline"));
    assert_eq!(baseline.constraints, 0xE0);
    assert_eq!(baseline.level(), "3.0");

    assert!(AvcCodec::parse("vp8").is_none());
    assert!(AvcCodec::parse("avc1.64001").is_none());
    assert!(AvcCodec::parse("avc1.ZZ001F").is_none());
}

// ============================================================================
// negotiate
// ============================================================================

#[tokio::test]
async fn test_negotiate_first_supported() {
    let probe = FnProbe::new(|_| Ok(true));
    let config = negotiate(&probe, 1280, 720, 30, 2_500_000).await.unwrap();

    assert_eq!(config.codec, "avc1.64001F");
    assert_eq!(config.avc_format, AvcFormat::AnnexB);
    assert_eq!((config.width, config.height), (1280, 720));
    assert_eq!(config.fps, 30);
    assert_eq!(config.bitrate_bps, 2_500_000);

    let queries = probe.queries();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].hardware_acceleration, HardwareAcceleration::PreferHardware);
    assert_eq!(queries[0].latency_mode, LatencyMode::Realtime);
}

#[tokio::test]
async fn test_negotiate_even_forces_dimensions() {
    let probe = FnProbe::new(|_| Ok(true));
    let config = negotiate(&probe, 405, 1, 30, 2_500_000).await.unwrap();
    assert_eq!((config.width, config.height), (404, 2));
    assert_eq!(probe.queries()[0].width, 404);
}

#[tokio::test]
async fn test_negotiate_steps_bitrate_down() {
    let probe = FnProbe::new(|q: &EncoderQuery| Ok(q.bitrate_bps < 1_500_000));
    let config = negotiate(&probe, 1280, 720, 30, 2_500_000).await.unwrap();
    assert_eq!(config.codec, "avc1.64001F");
    assert_eq!(config.bitrate_bps, 1_225_000);
    assert_eq!(probe.queries().len(), 3);
}

#[tokio::test]
async fn test_negotiate_falls_back_to_baseline_avc() {
    let probe = FnProbe::new(|q: &EncoderQuery| {
        Ok(q.codec == "avc1.42E01F" && q.avc_format == AvcFormat::Avc && q.framerate == 24)
    });
    let config = negotiate(&probe, 1280, 720, 30, 2_500_000).await.unwrap();
    assert_eq!(config.codec, "avc1.42E01F");
    assert_eq!(config.avc_format, AvcFormat::Avc);
    assert_eq!(config.fps, 24);
    assert_eq!(config.bitrate_bps, 2_500_000);
}

#[tokio::test]
async fn test_negotiate_probe_error_is_rejection() {
    let probe = FnProbe::new(|q: &EncoderQuery| {
        if q.codec == "avc1.64001F" {
            anyhow::bail!("encoder init failed");
        }
        Ok(true)
    });
    let config = negotiate(&probe, 1280, 720, 30, 2_500_000).await.unwrap();
    assert_eq!(config.codec, "avc1.4D401F");
}

#[tokio::test]
async fn test_negotiate_with_software_quality_preference() {
    let probe = FnProbe::new(|q: &EncoderQuery| {
        Ok(q.hardware_acceleration == HardwareAcceleration::PreferSoftware
            && q.latency_mode == LatencyMode::Quality)
    });
    let preference = ProbePreference {
        hardware_acceleration: HardwareAcceleration::PreferSoftware,
        latency_mode: LatencyMode::Quality,
    };
    let config = negotiate_with(&probe, 1280, 720, 30, 2_500_000, preference)
        .await
        .unwrap();
    assert_eq!(config.codec, "avc1.64001F");
    assert!(probe.queries().iter().all(|q| q.latency_mode == LatencyMode::Quality));

    // the default preference is rejected by the same probe
    assert!(negotiate(&probe, 1280, 720, 30, 2_500_000).await.is_none());
}

#[tokio::test]
async fn test_negotiate_exhausted_returns_none() {
    let probe = FnProbe::new(|_| Ok(false));
    assert!(negotiate(&probe, 1280, 720, 60, 2_500_000).await.is_none());
    // 6 profiles x 2 formats x 3 rates x 4 bitrates
    assert_eq!(probe.queries().len(), 144);
}

#[tokio::test]
async fn test_negotiate_priority_order() {
    let probe = FnProbe::new(|_| Ok(false));
    negotiate(&probe, 640, 360, 30, 1_000_000).await;
    let queries = probe.queries();
    // 2 rates x 4 bitrates per format, 2 formats per profile
    assert_eq!(queries.len(), 6 * 2 * 2 * 4);
    assert_eq!(queries[0].codec, "avc1.64001F");
    assert_eq!(queries[4].framerate, 24);
    assert_eq!(queries[8].avc_format, AvcFormat::Avc);
    assert_eq!(queries[16].codec, "avc1.4D401F");
    assert_eq!(queries.last().unwrap().codec, "avc1.42E01E");
}

// ----------------------------------------------------------------------------
// Properties
// ----------------------------------------------------------------------------

fn run<F: std::future::Future>(fut: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(fut)
}

proptest! {
    #[test]
    fn prop_no_candidate_below_floor(desired in 0u64..10_000_000, fps in 0u32..120) {
        let probe = FnProbe::new(|_| Ok(false));
        run(negotiate(&probe, 1280, 720, fps, desired));
        for q in probe.queries() {
            prop_assert!(q.bitrate_bps >= BITRATE_FLOOR_BPS);
            prop_assert!(q.framerate >= 1);
        }
    }

    #[test]
    fn prop_probes_are_bounded(desired in 0u64..10_000_000, fps in 0u32..120) {
        let probe = FnProbe::new(|_| Ok(false));
        run(negotiate(&probe, 1280, 720, fps, desired));
        prop_assert!(probe.queries().len() <= AVC_PROFILES.len() * 2 * 3 * 4);
    }

    #[test]
    fn prop_negotiated_dimensions_even(w in 0u32..4096, h in 0u32..4096, accept_at in 0usize..144) {
        let seen = std::sync::atomic::AtomicUsize::new(0);
        let probe = FnProbe::new(|_| {
            Ok(seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst) >= accept_at)
        });
        if let Some(config) = run(negotiate(&probe, w, h, 30, 2_500_000)) {
            prop_assert_eq!(config.width % 2, 0);
            prop_assert_eq!(config.height % 2, 0);
            prop_assert!(config.width >= 2 && config.height >= 2);
        }
    }
}

use nexus_extensibility::data_model::{RepresentationKind, ResourcePath, SamplePeriod};
use rstest::rstest;

#[rstest]
#[case("/A/B/T1/1_s", "/A/B", "T1", "1_s", RepresentationKind::Original, None)]
#[case(
    "/A/B/C/T1/1_min_mean#base=10_ms",
    "/A/B/C",
    "T1",
    "1_min",
    RepresentationKind::Mean,
    Some("10_ms")
)]
#[case(
    "/A/T1/1_s_mean_polar_deg#base=100_ms",
    "/A",
    "T1",
    "1_s",
    RepresentationKind::MeanPolarDeg,
    Some("100_ms")
)]
#[case(
    "/A/T1/10_s_min_bitwise#base=1_s",
    "/A",
    "T1",
    "10_s",
    RepresentationKind::MinBitwise,
    Some("1_s")
)]
#[case(
    "/A/T1/10_ms#base=1_s",
    "/A",
    "T1",
    "10_ms",
    RepresentationKind::Resampled,
    Some("1_s")
)]
fn parses_well_formed_paths(
    #[case] path: &str,
    #[case] catalog_id: &str,
    #[case] resource_id: &str,
    #[case] sample_period: &str,
    #[case] kind: RepresentationKind,
    #[case] base_period: Option<&str>,
) {
    let parsed: ResourcePath = path.parse().unwrap();

    assert_eq!(parsed.catalog_id, catalog_id);
    assert_eq!(parsed.resource_id, resource_id);
    assert_eq!(
        parsed.sample_period,
        SamplePeriod::from_unit_string(sample_period).unwrap()
    );
    assert_eq!(parsed.kind, kind);
    assert_eq!(
        parsed.base_period,
        base_period.map(|value| SamplePeriod::from_unit_string(value).unwrap())
    );
}

#[rstest]
#[case("")]
#[case("/A/T1")]
#[case("A/T1/1_s")]
#[case("/A//1_s")]
#[case("/A/T1/1_parsec")]
#[case("/A/T1/1_s_median#base=10_ms")]
#[case("/A/T1/1_s_mean#base=10_parsec")]
#[case("/A/T1/1_s_mean#until=10_ms")]
fn rejects_malformed_paths(#[case] path: &str) {
    assert!(path.parse::<ResourcePath>().is_err());
}

#[test]
fn parses_representation_parameters() {
    let parsed: ResourcePath = "/A/T1/1_s(channel=2,gain=10)".parse().unwrap();
    let parameters = parsed.parameters.as_ref().unwrap();

    assert_eq!(parameters["channel"], "2");
    assert_eq!(parameters["gain"], "10");
}

#[test]
fn round_trips_through_display() {
    let path = "/A/B/T1/1_min_mean#base=10_ms";
    let parsed: ResourcePath = path.parse().unwrap();

    assert_eq!(parsed.to_string(), path);

    let reparsed: ResourcePath = parsed.to_string().parse().unwrap();
    assert_eq!(reparsed, parsed);
}

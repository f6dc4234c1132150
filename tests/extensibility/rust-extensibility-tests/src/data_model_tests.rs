#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::NaiveTime;
    use nexus_extensibility::data_model::{
        CatalogItem, NexusDataType, Representation, RepresentationKind, RepresentationParameters,
        ResourceBuilder, ResourceCatalog, ResourceCatalogId, ResourceId, SamplePeriod,
    };
    use rstest::rstest;

    #[rstest]
    #[case("00:00:00.000000100", "100_ns")]
    #[case("00:00:00.000000200", "200_ns")]
    #[case("00:00:00.000001500", "1500_ns")]
    #[case("00:00:00.000001000", "1_us")]
    #[case("00:00:00.000010000", "10_us")]
    #[case("00:00:00.000100000", "100_us")]
    #[case("00:00:00.001500000", "1500_us")]
    #[case("00:00:00.001000000", "1_ms")]
    #[case("00:00:00.010000000", "10_ms")]
    #[case("00:00:00.100000000", "100_ms")]
    #[case("00:00:01.500000000", "1500_ms")]
    #[case("00:00:01.000000000", "1_s")]
    #[case("00:00:15.000000000", "15_s")]
    #[case("00:01:00.000000000", "1_min")]
    #[case("00:15:00.000000000", "15_min")]
    fn can_create_unit_strings(#[case] period_string: &str, #[case] expected: &str) {
        // Arrange
        let time_delta = NaiveTime::parse_from_str(period_string, "%H:%M:%S.%f")
            .unwrap()
            .signed_duration_since(NaiveTime::MIN);

        let sample_period = SamplePeriod::try_new(time_delta).unwrap();

        // Act
        let actual = sample_period.to_unit_string();

        // Assert
        assert_eq!(expected, actual);
    }

    #[rstest]
    #[case("100_ns", 100)]
    #[case("10_us", 10_000)]
    #[case("1500_ms", 1_500_000_000)]
    #[case("15_s", 15_000_000_000)]
    #[case("1_min", 60_000_000_000)]
    #[case("1_h", 3_600_000_000_000)]
    #[case("1_d", 86_400_000_000_000)]
    fn can_parse_unit_strings(#[case] unit_string: &str, #[case] expected_nanos: i64) {
        let sample_period = SamplePeriod::from_unit_string(unit_string).unwrap();

        assert_eq!(sample_period.as_nanos(), expected_nanos);
        assert_eq!(sample_period.to_unit_string(), unit_string);
    }

    #[rstest]
    #[case("1")]
    #[case("_s")]
    #[case("1_weeks")]
    #[case("0_s")]
    #[case("-1_s")]
    fn rejects_invalid_unit_strings(#[case] unit_string: &str) {
        assert!(SamplePeriod::from_unit_string(unit_string).is_err());
    }

    #[rstest]
    #[case(RepresentationKind::Original, "1_s")]
    #[case(RepresentationKind::Resampled, "1_s")]
    #[case(RepresentationKind::Mean, "1_s_mean")]
    #[case(RepresentationKind::MeanPolarDeg, "1_s_mean_polar_deg")]
    #[case(RepresentationKind::MinBitwise, "1_s_min_bitwise")]
    fn representation_ids_carry_the_kind_token(
        #[case] kind: RepresentationKind,
        #[case] expected: &str,
    ) {
        let representation = Representation {
            data_type: NexusDataType::FLOAT64,
            sample_period: SamplePeriod::from_unit_string("1_s").unwrap(),
            kind,
            parameters: None,
        };

        assert_eq!(representation.id(), expected);
    }

    #[rstest]
    #[case(NexusDataType::UINT8, 1)]
    #[case(NexusDataType::INT16, 2)]
    #[case(NexusDataType::FLOAT32, 4)]
    #[case(NexusDataType::FLOAT64, 8)]
    fn element_sizes_derive_from_the_type_code(
        #[case] data_type: NexusDataType,
        #[case] expected: usize,
    ) {
        assert_eq!(data_type.element_size(), expected);
    }

    #[test]
    fn representation_parameters_require_identifier_keys() {
        let valid = HashMap::from([("channel".to_string(), "2".to_string())]);
        assert!(RepresentationParameters::try_new(valid).is_ok());

        let invalid = HashMap::from([("not a key".to_string(), "2".to_string())]);
        assert!(RepresentationParameters::try_new(invalid).is_err());
    }

    #[test]
    fn catalog_items_render_fully_qualified_paths() {
        let catalog = ResourceCatalog::new(ResourceCatalogId::try_new("/A/B".to_string()).unwrap());

        let resource = ResourceBuilder::new(ResourceId::try_new("T1".to_string()).unwrap())
            .build()
            .unwrap();

        let item = CatalogItem {
            catalog,
            resource,
            representation: Representation::processed(
                SamplePeriod::from_unit_string("1_min").unwrap(),
                RepresentationKind::Mean,
            ),
            parameters: Some(HashMap::from([("channel".to_string(), "2".to_string())])),
        };

        assert_eq!(item.to_path(), "/A/B/T1/1_min_mean(channel=2)");
    }
}
